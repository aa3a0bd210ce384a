use crate::{
    db::DbPool,
    entities::{supplier, supplier::Entity as SupplierEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

/// Input payload for creating or replacing a supplier record
#[derive(Debug, Clone, Validate)]
pub struct SupplierInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
}

/// Supplier directory: plain CRUD with soft-deactivation
#[derive(Clone)]
pub struct SupplierService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SupplierService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<supplier::Model, ServiceError> {
        SupplierEntity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, active_only: bool) -> Result<Vec<supplier::Model>, ServiceError> {
        let mut query = SupplierEntity::find().order_by_asc(supplier::Column::Name);
        if active_only {
            query = query.filter(supplier::Column::Active.eq(true));
        }
        Ok(query.all(self.connection()).await?)
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: SupplierInput) -> Result<supplier::Model, ServiceError> {
        input.validate()?;

        let model = supplier::ActiveModel {
            id: Default::default(),
            name: Set(input.name),
            contact_person: Set(input.contact_person),
            phone: Set(input.phone),
            email: Set(input.email),
            address: Set(input.address),
            tax_id: Set(input.tax_id),
            active: Set(true),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(self.connection()).await?;

        self.event_sender
            .send_or_log(Event::SupplierCreated(created.id))
            .await;

        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: SupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        input.validate()?;
        let db = self.connection();

        let existing = SupplierEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", id)))?;

        let mut active: supplier::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.contact_person = Set(input.contact_person);
        active.phone = Set(input.phone);
        active.email = Set(input.email);
        active.address = Set(input.address);
        active.tax_id = Set(input.tax_id);

        let updated = active.update(db).await?;

        self.event_sender
            .send_or_log(Event::SupplierUpdated(updated.id))
            .await;

        Ok(updated)
    }

    /// Soft-deactivates a supplier; referencing ingredients and purchases
    /// keep their history intact.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: i64) -> Result<(), ServiceError> {
        let db = self.connection();

        let existing = SupplierEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", id)))?;

        let mut active: supplier::ActiveModel = existing.into();
        active.active = Set(false);
        active.update(db).await?;

        self.event_sender
            .send_or_log(Event::SupplierDeactivated(id))
            .await;

        Ok(())
    }

    fn connection(&self) -> &DatabaseConnection {
        self.db_pool.as_ref()
    }
}
