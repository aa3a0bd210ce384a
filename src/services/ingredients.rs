use crate::{
    db::DbPool,
    entities::{
        ingredient, ingredient::Entity as IngredientEntity, stock_movement,
        stock_movement::MovementType, supplier::Entity as SupplierEntity,
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
use sea_orm::sea_query::Expr;
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

/// Input payload for creating an ingredient
#[derive(Debug, Clone, Validate)]
pub struct CreateIngredientInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub min_stock: Decimal,
    pub max_stock: Decimal,
    pub unit_cost: Decimal,
    pub preferred_supplier_id: Option<i64>,
}

/// Input payload for updating an ingredient. Fields replace the stored
/// values wholesale; stock is only ever changed through `adjust_stock`,
/// purchase receipt, or recipe consumption.
#[derive(Debug, Clone, Validate)]
pub struct UpdateIngredientInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub min_stock: Decimal,
    pub max_stock: Decimal,
    pub unit_cost: Decimal,
    pub preferred_supplier_id: Option<i64>,
    pub active: bool,
}

/// Ingredient store: definitions, stock levels and manual adjustments
#[derive(Clone)]
pub struct IngredientService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl IngredientService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<ingredient::Model, ServiceError> {
        IngredientEntity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ingredient {} not found", id)))
    }

    /// Lists ingredients ordered by name.
    #[instrument(skip(self))]
    pub async fn list(&self, active_only: bool) -> Result<Vec<ingredient::Model>, ServiceError> {
        let mut query = IngredientEntity::find().order_by_asc(ingredient::Column::Name);
        if active_only {
            query = query.filter(ingredient::Column::Active.eq(true));
        }
        Ok(query.all(self.connection()).await?)
    }

    /// Active ingredients at or below their minimum stock threshold.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<ingredient::Model>, ServiceError> {
        let rows = IngredientEntity::find()
            .filter(ingredient::Column::Active.eq(true))
            .filter(
                Expr::col(ingredient::Column::CurrentStock)
                    .lte(Expr::col(ingredient::Column::MinStock)),
            )
            .order_by_asc(ingredient::Column::Name)
            .all(self.connection())
            .await?;
        Ok(rows)
    }

    /// Creates an ingredient with zero starting stock.
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: CreateIngredientInput,
    ) -> Result<ingredient::Model, ServiceError> {
        input.validate()?;
        let db = self.connection();

        if let Some(supplier_id) = input.preferred_supplier_id {
            let exists = SupplierEntity::find_by_id(supplier_id).one(db).await?;
            if exists.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Preferred supplier {} does not exist",
                    supplier_id
                )));
            }
        }

        let now = Utc::now();
        let model = ingredient::ActiveModel {
            id: Default::default(),
            name: Set(input.name),
            description: Set(input.description),
            unit: Set(input.unit),
            current_stock: Set(Decimal::ZERO),
            min_stock: Set(input.min_stock),
            max_stock: Set(input.max_stock),
            unit_cost: Set(input.unit_cost),
            preferred_supplier_id: Set(input.preferred_supplier_id),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(db).await?;

        self.event_sender
            .send_or_log(Event::IngredientCreated(created.id))
            .await;

        Ok(created)
    }

    /// Replaces the ingredient's definition fields.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: UpdateIngredientInput,
    ) -> Result<ingredient::Model, ServiceError> {
        input.validate()?;
        let db = self.connection();

        let existing = IngredientEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ingredient {} not found", id)))?;

        let mut active: ingredient::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.description = Set(input.description);
        active.unit = Set(input.unit);
        active.min_stock = Set(input.min_stock);
        active.max_stock = Set(input.max_stock);
        active.unit_cost = Set(input.unit_cost);
        active.preferred_supplier_id = Set(input.preferred_supplier_id);
        active.active = Set(input.active);
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;

        self.event_sender
            .send_or_log(Event::IngredientUpdated(updated.id))
            .await;

        Ok(updated)
    }

    /// Applies a signed manual stock adjustment and records it in the ledger.
    ///
    /// The resulting stock may be negative; no floor is enforced.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        id: i64,
        delta: Decimal,
        notes: impl Into<String> + std::fmt::Debug,
    ) -> Result<ingredient::Model, ServiceError> {
        let db = self.connection();
        let txn = db.begin().await?;

        let existing = IngredientEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ingredient {} not found", id)))?;

        let unit_cost = existing.unit_cost;
        let new_stock = existing.current_stock + delta;

        let mut active: ingredient::ActiveModel = existing.into();
        active.current_stock = Set(new_stock);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        let movement = stock_movement::ActiveModel {
            id: Default::default(),
            ingredient_id: Set(id),
            movement_type: Set(MovementType::Adjustment.as_str().to_string()),
            quantity: Set(delta),
            unit_cost: Set(Some(unit_cost)),
            reference_type: Set(None),
            reference_id: Set(None),
            notes: Set(Some(notes.into())),
            created_at: Default::default(),
        };
        movement.insert(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::StockAdjusted {
                ingredient_id: id,
                delta,
                new_stock,
            })
            .await;

        Ok(updated)
    }

    fn connection(&self) -> &DatabaseConnection {
        self.db_pool.as_ref()
    }
}
