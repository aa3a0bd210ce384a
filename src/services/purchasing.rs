use crate::{
    db::DbPool,
    entities::{
        ingredient, ingredient::Entity as IngredientEntity,
        purchase, purchase::Entity as PurchaseEntity, purchase::PurchaseStatus,
        purchase_item, purchase_item::Entity as PurchaseItemEntity,
        stock_movement, stock_movement::MovementType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// One ordered line of a new purchase
#[derive(Debug, Clone)]
pub struct PurchaseLineInput {
    pub ingredient_id: i64,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
}

/// Raw line fields as the purchase UI/CLI submits them. Must be parsed
/// before anything touches the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPurchaseLine {
    pub ingredient_id: String,
    pub quantity: String,
    pub unit: String,
    pub unit_price: String,
}

/// Parses raw UI line items, rejecting malformed numerics before any
/// persistence happens.
pub fn parse_raw_lines(raw: &[RawPurchaseLine]) -> Result<Vec<PurchaseLineInput>, ServiceError> {
    raw.iter()
        .map(|line| {
            let ingredient_id = line.ingredient_id.trim().parse::<i64>().map_err(|_| {
                ServiceError::ValidationError(format!(
                    "Invalid ingredient id: {:?}",
                    line.ingredient_id
                ))
            })?;
            let quantity = Decimal::from_str(line.quantity.trim()).map_err(|_| {
                ServiceError::ValidationError(format!("Invalid quantity: {:?}", line.quantity))
            })?;
            let unit_price = Decimal::from_str(line.unit_price.trim()).map_err(|_| {
                ServiceError::ValidationError(format!("Invalid unit price: {:?}", line.unit_price))
            })?;
            Ok(PurchaseLineInput {
                ingredient_id,
                quantity,
                unit: line.unit.trim().to_string(),
                unit_price,
            })
        })
        .collect()
}

/// Input payload for creating a purchase
#[derive(Debug, Clone)]
pub struct CreatePurchaseInput {
    pub supplier_id: i64,
    pub purchase_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<PurchaseLineInput>,
}

/// Purchase with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseDetail {
    pub purchase: purchase::Model,
    pub items: Vec<purchase_item::Model>,
}

/// Purchase workflow: ordering from suppliers and receiving stock.
///
/// The state machine is `pending -> received`, one-way and terminal.
#[derive(Clone)]
pub struct PurchaseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PurchaseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a purchase and its line items in one unit of work.
    ///
    /// The purchase number carries a human-readable timestamp prefix and a
    /// uuid suffix so two purchases created within the same second cannot
    /// collide. `total_amount` is the sum of the lines' totals.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreatePurchaseInput) -> Result<purchase::Model, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Purchase must have at least one line item".to_string(),
            ));
        }
        for line in &input.lines {
            if line.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Purchase line for ingredient {} has non-positive quantity",
                    line.ingredient_id
                )));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Purchase line for ingredient {} has negative unit price",
                    line.ingredient_id
                )));
            }
        }

        let db = self.connection();
        let txn = db.begin().await?;

        let supplier = crate::entities::supplier::Entity::find_by_id(input.supplier_id)
            .one(&txn)
            .await?;
        if supplier.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Supplier {} not found",
                input.supplier_id
            )));
        }

        for line in &input.lines {
            let exists = IngredientEntity::find_by_id(line.ingredient_id)
                .one(&txn)
                .await?;
            if exists.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Ingredient {} does not exist",
                    line.ingredient_id
                )));
            }
        }

        let now = Utc::now();
        let purchase_number = format!(
            "PUR-{}-{}",
            now.format("%Y%m%d%H%M%S"),
            Uuid::new_v4().simple()
        );
        let total_amount: Decimal = input
            .lines
            .iter()
            .map(|line| line.quantity * line.unit_price)
            .sum();

        let model = purchase::ActiveModel {
            id: Default::default(),
            purchase_number: Set(purchase_number.clone()),
            supplier_id: Set(input.supplier_id),
            total_amount: Set(total_amount),
            status: Set(PurchaseStatus::Pending.as_str().to_string()),
            purchase_date: Set(input.purchase_date),
            expected_date: Set(input.expected_date),
            received_date: Set(None),
            notes: Set(input.notes),
            created_at: Set(now),
        };
        let created = model.insert(&txn).await?;

        for line in &input.lines {
            let item = purchase_item::ActiveModel {
                id: Default::default(),
                purchase_id: Set(created.id),
                ingredient_id: Set(line.ingredient_id),
                quantity: Set(line.quantity),
                unit: Set(line.unit.clone()),
                unit_price: Set(line.unit_price),
                total_price: Set(line.quantity * line.unit_price),
                received_quantity: Set(Decimal::ZERO),
            };
            item.insert(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PurchaseCreated {
                purchase_id: created.id,
                purchase_number,
                total_amount,
            })
            .await;

        Ok(created)
    }

    /// Receives a pending purchase: records received quantities, restocks
    /// each ingredient, overwrites its unit cost with this purchase's line
    /// price (last price wins), and appends ledger entries, all in one unit
    /// of work. Items missing from `received` default to their full ordered
    /// quantity.
    #[instrument(skip(self, received))]
    pub async fn receive(
        &self,
        purchase_id: i64,
        received: HashMap<i64, Decimal>,
    ) -> Result<(), ServiceError> {
        for (item_id, qty) in &received {
            if *qty < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Received quantity for item {} is negative",
                    item_id
                )));
            }
        }

        let db = self.connection();
        let txn = db.begin().await?;

        let header = PurchaseEntity::find_by_id(purchase_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase {} not found", purchase_id)))?;

        if header.status() != Some(PurchaseStatus::Pending) {
            return Err(ServiceError::InvalidOperation(format!(
                "Purchase {} is not pending (status: {})",
                header.purchase_number, header.status
            )));
        }

        let items = PurchaseItemEntity::find()
            .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
            .order_by_asc(purchase_item::Column::Id)
            .all(&txn)
            .await?;

        for item in items {
            let received_qty = received.get(&item.id).copied().unwrap_or(item.quantity);
            let unit_price = item.unit_price;
            let ingredient_id = item.ingredient_id;

            let mut item_active: purchase_item::ActiveModel = item.into();
            item_active.received_quantity = Set(received_qty);
            item_active.update(&txn).await?;

            let ingredient = IngredientEntity::find_by_id(ingredient_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Ingredient {} not found", ingredient_id))
                })?;
            let ingredient_name = ingredient.name.clone();
            let new_stock = ingredient.current_stock + received_qty;

            let mut ingredient_active: ingredient::ActiveModel = ingredient.into();
            ingredient_active.current_stock = Set(new_stock);
            ingredient_active.unit_cost = Set(unit_price);
            ingredient_active.updated_at = Set(Utc::now());
            ingredient_active.update(&txn).await?;

            let movement = stock_movement::ActiveModel {
                id: Default::default(),
                ingredient_id: Set(ingredient_id),
                movement_type: Set(MovementType::Purchase.as_str().to_string()),
                quantity: Set(received_qty),
                unit_cost: Set(Some(unit_price)),
                reference_type: Set(Some("purchase".to_string())),
                reference_id: Set(Some(purchase_id)),
                notes: Set(Some(format!("Purchase received: {}", ingredient_name))),
                created_at: Default::default(),
            };
            movement.insert(&txn).await?;
        }

        let mut header_active: purchase::ActiveModel = header.into();
        header_active.status = Set(PurchaseStatus::Received.as_str().to_string());
        header_active.received_date = Set(Some(Utc::now().date_naive()));
        header_active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PurchaseReceived { purchase_id })
            .await;

        Ok(())
    }

    /// Fetches a purchase with its line items.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<PurchaseDetail, ServiceError> {
        let db = self.connection();
        let header = PurchaseEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase {} not found", id)))?;

        let items = PurchaseItemEntity::find()
            .filter(purchase_item::Column::PurchaseId.eq(id))
            .order_by_asc(purchase_item::Column::Id)
            .all(db)
            .await?;

        Ok(PurchaseDetail {
            purchase: header,
            items,
        })
    }

    /// Newest-first purchase listing.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<purchase::Model>, ServiceError> {
        let rows = PurchaseEntity::find()
            .order_by_desc(purchase::Column::CreatedAt)
            .order_by_desc(purchase::Column::Id)
            .all(self.connection())
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn list_by_status(
        &self,
        status: PurchaseStatus,
    ) -> Result<Vec<purchase::Model>, ServiceError> {
        let rows = PurchaseEntity::find()
            .filter(purchase::Column::Status.eq(status.as_str()))
            .order_by_desc(purchase::Column::CreatedAt)
            .all(self.connection())
            .await?;
        Ok(rows)
    }

    fn connection(&self) -> &DatabaseConnection {
        self.db_pool.as_ref()
    }
}
