use crate::{
    db::DbPool,
    entities::{
        ingredient, ingredient::Entity as IngredientEntity,
        product::Entity as ProductEntity,
        purchase, purchase::Entity as PurchaseEntity, purchase::PurchaseStatus,
        recipe, recipe::Entity as RecipeEntity,
        supplier, supplier::Entity as SupplierEntity,
    },
    errors::ServiceError,
    services::movements::{ConsumedTotal, MovementService, MovementView},
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::instrument;

/// One ingredient at or below its reorder threshold, most severe first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowStockEntry {
    pub ingredient: ingredient::Model,
    /// current_stock / min_stock, None when min_stock is not positive
    pub stock_ratio: Option<Decimal>,
}

/// Headline counts for an operations dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub ingredient_count: u64,
    pub low_stock_count: u64,
    pub supplier_count: u64,
    pub recipe_count: u64,
    pub product_count: u64,
    pub pending_purchase_count: u64,
    pub inventory_value: Decimal,
}

/// An ingredient ranked by consumption over a trailing window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopConsumedEntry {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub total_consumed: Decimal,
}

/// Read-only reporting over the inventory tables. All aggregates are
/// computed from the same rows the services write; nothing here mutates.
#[derive(Clone)]
pub struct ReportingService {
    db_pool: Arc<DbPool>,
    movements: MovementService,
}

impl ReportingService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        let movements = MovementService::new(db_pool.clone());
        Self { db_pool, movements }
    }

    /// Total value of stock on hand: sum of current_stock * unit_cost over
    /// active ingredients.
    #[instrument(skip(self))]
    pub async fn inventory_value(&self) -> Result<Decimal, ServiceError> {
        let ingredients = IngredientEntity::find()
            .filter(ingredient::Column::Active.eq(true))
            .all(self.db_pool.as_ref())
            .await?;

        Ok(ingredients
            .iter()
            .map(|i| i.current_stock * i.unit_cost)
            .sum())
    }

    /// Active ingredients at or below their reorder threshold, ordered most
    /// severe first. An ingredient with a non-positive min_stock but zero or
    /// negative stock sorts ahead of everything with a computable ratio.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<LowStockEntry>, ServiceError> {
        let ingredients = IngredientEntity::find()
            .filter(ingredient::Column::Active.eq(true))
            .all(self.db_pool.as_ref())
            .await?;

        let mut entries: Vec<LowStockEntry> = ingredients
            .into_iter()
            .filter(|i| i.current_stock <= i.min_stock)
            .map(|i| {
                let stock_ratio = if i.min_stock > Decimal::ZERO {
                    Some(i.current_stock / i.min_stock)
                } else {
                    None
                };
                LowStockEntry {
                    ingredient: i,
                    stock_ratio,
                }
            })
            .collect();

        entries.sort_by(|a, b| match (&a.stock_ratio, &b.stock_ratio) {
            (None, None) => a.ingredient.name.cmp(&b.ingredient.name),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(y).then_with(|| a.ingredient.name.cmp(&b.ingredient.name)),
        });

        Ok(entries)
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardSummary, ServiceError> {
        let db = self.db_pool.as_ref();

        let ingredient_count = IngredientEntity::find()
            .filter(ingredient::Column::Active.eq(true))
            .count(db)
            .await?;
        let supplier_count = SupplierEntity::find()
            .filter(supplier::Column::Active.eq(true))
            .count(db)
            .await?;
        let recipe_count = RecipeEntity::find()
            .filter(recipe::Column::Active.eq(true))
            .count(db)
            .await?;
        let product_count = ProductEntity::find().count(db).await?;
        let pending_purchase_count = PurchaseEntity::find()
            .filter(purchase::Column::Status.eq(PurchaseStatus::Pending.as_str()))
            .count(db)
            .await?;

        let low_stock_count = self.low_stock().await?.len() as u64;
        let inventory_value = self.inventory_value().await?;

        Ok(DashboardSummary {
            ingredient_count,
            low_stock_count,
            supplier_count,
            recipe_count,
            product_count,
            pending_purchase_count,
            inventory_value,
        })
    }

    /// Ingredients ranked by quantity consumed over the trailing window,
    /// largest first.
    #[instrument(skip(self))]
    pub async fn top_consumed(
        &self,
        days: i64,
        limit: usize,
    ) -> Result<Vec<TopConsumedEntry>, ServiceError> {
        let since = Utc::now() - Duration::days(days);
        let totals: Vec<ConsumedTotal> =
            self.movements.total_consumed_since(None, since).await?;

        Ok(totals
            .into_iter()
            .take(limit)
            .map(|t| TopConsumedEntry {
                ingredient_id: t.ingredient_id,
                ingredient_name: t.ingredient_name,
                total_consumed: t.total_consumed,
            })
            .collect())
    }

    /// Most recent ledger entries across all ingredients.
    #[instrument(skip(self))]
    pub async fn recent_movements(&self, limit: u64) -> Result<Vec<MovementView>, ServiceError> {
        self.movements.recent(limit).await
    }
}
