use crate::{
    db::DbPool,
    entities::{
        ingredient::Entity as IngredientEntity,
        stock_movement, stock_movement::Entity as StockMovementEntity,
        stock_movement::MovementType,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Ledger entry joined with its ingredient's display name, for dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementView {
    pub id: i64,
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub movement_type: String,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated consumption for one ingredient over a reporting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumedTotal {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub total_consumed: Decimal,
}

/// Append-only stock movement ledger.
///
/// This is the single source of truth for stock history; entries are never
/// updated or deleted, and `ingredients.current_stock` must always equal the
/// per-ingredient sum of `quantity`.
#[derive(Clone)]
pub struct MovementService {
    db_pool: Arc<DbPool>,
}

impl MovementService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Appends one ledger entry. Fails only when the ingredient is unknown.
    ///
    /// This records history without touching the materialized stock total;
    /// callers that move stock do both inside one transaction.
    #[instrument(skip(self))]
    pub async fn append(
        &self,
        ingredient_id: i64,
        movement_type: MovementType,
        quantity: Decimal,
        unit_cost: Option<Decimal>,
        reference_type: Option<String>,
        reference_id: Option<i64>,
        notes: Option<String>,
    ) -> Result<stock_movement::Model, ServiceError> {
        let db = self.connection();

        let exists = IngredientEntity::find_by_id(ingredient_id).one(db).await?;
        if exists.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Ingredient {} not found",
                ingredient_id
            )));
        }

        let model = stock_movement::ActiveModel {
            id: Default::default(),
            ingredient_id: Set(ingredient_id),
            movement_type: Set(movement_type.as_str().to_string()),
            quantity: Set(quantity),
            unit_cost: Set(unit_cost),
            reference_type: Set(reference_type),
            reference_id: Set(reference_id),
            notes: Set(notes),
            created_at: Default::default(),
        };

        Ok(model.insert(db).await?)
    }

    /// Most-recent-first movements for one ingredient, bounded by `limit`.
    #[instrument(skip(self))]
    pub async fn list_for_ingredient(
        &self,
        ingredient_id: i64,
        limit: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let rows = StockMovementEntity::find()
            .filter(stock_movement::Column::IngredientId.eq(ingredient_id))
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .limit(limit)
            .all(self.connection())
            .await?;
        Ok(rows)
    }

    /// Most-recent-first movements across all ingredients, joined with the
    /// ingredient display name.
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: u64) -> Result<Vec<MovementView>, ServiceError> {
        let pairs = StockMovementEntity::find()
            .find_also_related(IngredientEntity)
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .limit(limit)
            .all(self.connection())
            .await?;

        let mut views = Vec::with_capacity(pairs.len());
        for (movement, ingredient) in pairs {
            let name = ingredient.map(|i| i.name).unwrap_or_default();
            views.push(MovementView {
                id: movement.id,
                ingredient_id: movement.ingredient_id,
                ingredient_name: name,
                movement_type: movement.movement_type,
                quantity: movement.quantity,
                unit_cost: movement.unit_cost,
                reference_type: movement.reference_type,
                reference_id: movement.reference_id,
                notes: movement.notes,
                created_at: movement.created_at,
            });
        }
        Ok(views)
    }

    /// Total consumed quantity (absolute value of `consumption` movements)
    /// per ingredient since `since`, most consumed first. Pass an ingredient
    /// id to restrict the aggregation to a single ingredient.
    #[instrument(skip(self))]
    pub async fn total_consumed_since(
        &self,
        ingredient_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> Result<Vec<ConsumedTotal>, ServiceError> {
        let mut query = StockMovementEntity::find()
            .filter(
                stock_movement::Column::MovementType.eq(MovementType::Consumption.as_str()),
            )
            .filter(stock_movement::Column::CreatedAt.gte(since));
        if let Some(id) = ingredient_id {
            query = query.filter(stock_movement::Column::IngredientId.eq(id));
        }

        let pairs = query
            .find_also_related(IngredientEntity)
            .all(self.connection())
            .await?;

        let mut totals: HashMap<i64, ConsumedTotal> = HashMap::new();
        for (movement, ingredient) in pairs {
            let entry = totals
                .entry(movement.ingredient_id)
                .or_insert_with(|| ConsumedTotal {
                    ingredient_id: movement.ingredient_id,
                    ingredient_name: ingredient.map(|i| i.name).unwrap_or_default(),
                    total_consumed: Decimal::ZERO,
                });
            entry.total_consumed += movement.quantity.abs();
        }

        let mut result: Vec<ConsumedTotal> = totals.into_values().collect();
        result.sort_by(|a, b| b.total_consumed.cmp(&a.total_consumed));
        Ok(result)
    }

    fn connection(&self) -> &DatabaseConnection {
        self.db_pool.as_ref()
    }
}
