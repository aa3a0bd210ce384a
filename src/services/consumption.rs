use crate::{
    db::DbPool,
    entities::{
        ingredient, ingredient::Entity as IngredientEntity,
        recipe, recipe::Entity as RecipeEntity,
        recipe_ingredient, recipe_ingredient::Entity as RecipeIngredientEntity,
        stock_movement, stock_movement::MovementType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// One ingredient the stock cannot cover, and by how much
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortage {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub needed: Decimal,
    pub available: Decimal,
}

/// Result of a consumption attempt.
///
/// Insufficient stock is an outcome, not an error: the business policy is to
/// warn and let the sale proceed, so the caller decides what to do with a
/// `ShortStock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConsumptionOutcome {
    Consumed,
    ShortStock(Vec<Shortage>),
}

impl ConsumptionOutcome {
    pub fn is_consumed(&self) -> bool {
        matches!(self, ConsumptionOutcome::Consumed)
    }
}

/// Recipe consumption engine.
///
/// Two-pass check-then-commit: every required ingredient is verified against
/// current stock before any decrement, so a shortage discovered on the last
/// line cannot leave earlier lines half-consumed. Stock decrements and their
/// ledger entries commit as one unit of work.
#[derive(Clone)]
pub struct ConsumptionService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ConsumptionService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Consumes the recipe's ingredients scaled by `multiplier` (units sold).
    ///
    /// Returns `ShortStock` with the exact per-ingredient deficit when any
    /// line cannot be covered; in that case nothing was written. Stock may
    /// still go negative across concurrent callers; there is no
    /// cross-request locking.
    #[instrument(skip(self))]
    pub async fn consume(
        &self,
        recipe_id: i64,
        multiplier: Decimal,
    ) -> Result<ConsumptionOutcome, ServiceError> {
        if multiplier <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Consumption multiplier must be positive".to_string(),
            ));
        }

        let db = self.connection();
        let txn = db.begin().await?;

        let recipe = RecipeEntity::find_by_id(recipe_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", recipe_id)))?;

        let pairs = RecipeIngredientEntity::find()
            .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
            .order_by_asc(recipe_ingredient::Column::Id)
            .find_also_related(IngredientEntity)
            .all(&txn)
            .await?;

        let mut lines = Vec::with_capacity(pairs.len());
        for (line, loaded) in pairs {
            let loaded = loaded.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Recipe line {} references missing ingredient {}",
                    line.id, line.ingredient_id
                ))
            })?;
            lines.push((line, loaded));
        }

        // Pass 1: sufficiency check, no mutation.
        let shortages: Vec<Shortage> = lines
            .iter()
            .filter_map(|(line, loaded)| {
                let needed = line.quantity * multiplier;
                if loaded.current_stock < needed {
                    Some(Shortage {
                        ingredient_id: loaded.id,
                        ingredient_name: loaded.name.clone(),
                        needed,
                        available: loaded.current_stock,
                    })
                } else {
                    None
                }
            })
            .collect();

        if !shortages.is_empty() {
            txn.rollback().await?;
            self.event_sender
                .send_or_log(Event::ConsumptionShortage {
                    recipe_id,
                    short_ingredients: shortages.len(),
                })
                .await;
            return Ok(ConsumptionOutcome::ShortStock(shortages));
        }

        // Pass 2: decrement stock and append ledger entries.
        for (line, loaded) in lines {
            let needed = line.quantity * multiplier;
            let new_stock = loaded.current_stock - needed;
            let ingredient_name = loaded.name.clone();

            let mut active: ingredient::ActiveModel = loaded.into();
            active.current_stock = Set(new_stock);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;

            let movement = stock_movement::ActiveModel {
                id: Default::default(),
                ingredient_id: Set(line.ingredient_id),
                movement_type: Set(MovementType::Consumption.as_str().to_string()),
                quantity: Set(-needed),
                unit_cost: Set(None),
                reference_type: Set(Some("recipe".to_string())),
                reference_id: Set(Some(recipe_id)),
                notes: Set(Some(format!("Recipe consumption: {}", ingredient_name))),
                created_at: Default::default(),
            };
            movement.insert(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::RecipeConsumed {
                recipe_id: recipe.id,
                multiplier,
            })
            .await;

        Ok(ConsumptionOutcome::Consumed)
    }

    /// Order-subsystem hook: consumes the product's active recipe, if it has
    /// one. Returns `None` for recipe-less products (nothing to do).
    #[instrument(skip(self))]
    pub async fn consume_for_product(
        &self,
        product_id: i64,
        quantity: Decimal,
    ) -> Result<Option<ConsumptionOutcome>, ServiceError> {
        let found = RecipeEntity::find()
            .filter(recipe::Column::ProductId.eq(product_id))
            .filter(recipe::Column::Active.eq(true))
            .order_by_asc(recipe::Column::Id)
            .one(self.connection())
            .await?;

        match found {
            Some(recipe) => Ok(Some(self.consume(recipe.id, quantity).await?)),
            None => Ok(None),
        }
    }

    fn connection(&self) -> &DatabaseConnection {
        self.db_pool.as_ref()
    }
}
