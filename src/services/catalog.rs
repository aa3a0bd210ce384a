use crate::{
    db::DbPool,
    entities::{
        product, product::Entity as ProductEntity,
        product_variation, product_variation::Entity as ProductVariationEntity,
        variation_group, variation_group::Entity as VariationGroupEntity,
        variation_option, variation_option::Entity as VariationOptionEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

/// Input payload for creating a product
#[derive(Debug, Clone, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
}

/// Input payload for replacing a product's fields
#[derive(Debug, Clone, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
    pub available: bool,
}

/// Input payload for creating a variation group
#[derive(Debug, Clone, Validate)]
pub struct CreateVariationGroupInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub required: bool,
    pub multiple_selection: bool,
    pub min_selections: i32,
    pub max_selections: i32,
}

/// Input payload for adding an option to a group
#[derive(Debug, Clone, Validate)]
pub struct CreateVariationOptionInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub display_name: String,
    pub price_modifier: Decimal,
    pub sort_order: i32,
}

/// Variation group with its ordered options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationGroupDetail {
    pub group: variation_group::Model,
    pub options: Vec<variation_option::Model>,
}

/// A group as attached to one product, with the per-product link row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedGroup {
    pub link: product_variation::Model,
    pub group: variation_group::Model,
    pub options: Vec<variation_option::Model>,
}

/// Product and variation catalog.
///
/// Variation options carry price modifiers only; they are deliberately not
/// wired to ingredient consumption.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    // --- products ---

    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let model = product::ActiveModel {
            id: Default::default(),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            category: Set(input.category),
            available: Set(true),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(self.connection()).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;

        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: i64,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let db = self.connection();

        let existing = ProductEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let mut active: product::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.description = Set(input.description);
        active.price = Set(input.price);
        active.category = Set(input.category);
        active.available = Set(input.available);
        let updated = active.update(db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(updated.id))
            .await;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i64) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        available_only: bool,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = ProductEntity::find().order_by_asc(product::Column::Name);
        if available_only {
            query = query.filter(product::Column::Available.eq(true));
        }
        Ok(query.all(self.connection()).await?)
    }

    // --- variation groups and options ---

    #[instrument(skip(self, input))]
    pub async fn create_group(
        &self,
        input: CreateVariationGroupInput,
    ) -> Result<variation_group::Model, ServiceError> {
        input.validate()?;
        let db = self.connection();

        let duplicate = VariationGroupEntity::find()
            .filter(variation_group::Column::Name.eq(input.name.clone()))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Variation group {:?} already exists",
                input.name
            )));
        }

        let model = variation_group::ActiveModel {
            id: Default::default(),
            name: Set(input.name),
            display_name: Set(input.display_name),
            description: Set(input.description),
            required: Set(input.required),
            multiple_selection: Set(input.multiple_selection),
            min_selections: Set(input.min_selections),
            max_selections: Set(input.max_selections),
            active: Set(true),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(db).await?;

        self.event_sender
            .send_or_log(Event::VariationGroupCreated(created.id))
            .await;

        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn add_option(
        &self,
        group_id: i64,
        input: CreateVariationOptionInput,
    ) -> Result<variation_option::Model, ServiceError> {
        input.validate()?;
        let db = self.connection();

        let group = VariationGroupEntity::find_by_id(group_id).one(db).await?;
        if group.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Variation group {} not found",
                group_id
            )));
        }

        let model = variation_option::ActiveModel {
            id: Default::default(),
            variation_group_id: Set(group_id),
            name: Set(input.name),
            display_name: Set(input.display_name),
            price_modifier: Set(input.price_modifier),
            active: Set(true),
            sort_order: Set(input.sort_order),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(db).await?;

        self.event_sender
            .send_or_log(Event::VariationOptionAdded {
                group_id,
                option_id: created.id,
            })
            .await;

        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_group(&self, id: i64) -> Result<VariationGroupDetail, ServiceError> {
        let db = self.connection();
        let group = VariationGroupEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variation group {} not found", id)))?;

        let options = VariationOptionEntity::find()
            .filter(variation_option::Column::VariationGroupId.eq(id))
            .order_by_asc(variation_option::Column::SortOrder)
            .order_by_asc(variation_option::Column::Id)
            .all(db)
            .await?;

        Ok(VariationGroupDetail { group, options })
    }

    #[instrument(skip(self))]
    pub async fn list_groups(
        &self,
        active_only: bool,
    ) -> Result<Vec<variation_group::Model>, ServiceError> {
        let mut query = VariationGroupEntity::find().order_by_asc(variation_group::Column::Name);
        if active_only {
            query = query.filter(variation_group::Column::Active.eq(true));
        }
        Ok(query.all(self.connection()).await?)
    }

    /// Attaches a variation group to a product. The pair is unique.
    #[instrument(skip(self))]
    pub async fn attach_group(
        &self,
        product_id: i64,
        group_id: i64,
        required: bool,
        sort_order: i32,
    ) -> Result<product_variation::Model, ServiceError> {
        let db = self.connection();

        let product = ProductEntity::find_by_id(product_id).one(db).await?;
        if product.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }
        let group = VariationGroupEntity::find_by_id(group_id).one(db).await?;
        if group.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Variation group {} not found",
                group_id
            )));
        }

        let duplicate = ProductVariationEntity::find()
            .filter(product_variation::Column::ProductId.eq(product_id))
            .filter(product_variation::Column::VariationGroupId.eq(group_id))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::InvalidOperation(format!(
                "Variation group {} is already attached to product {}",
                group_id, product_id
            )));
        }

        let model = product_variation::ActiveModel {
            id: Default::default(),
            product_id: Set(product_id),
            variation_group_id: Set(group_id),
            required: Set(required),
            sort_order: Set(sort_order),
        };
        Ok(model.insert(db).await?)
    }

    /// Variation groups attached to a product, in attachment order, each
    /// with its ordered options.
    #[instrument(skip(self))]
    pub async fn groups_for_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<AttachedGroup>, ServiceError> {
        let db = self.connection();

        let links = ProductVariationEntity::find()
            .filter(product_variation::Column::ProductId.eq(product_id))
            .order_by_asc(product_variation::Column::SortOrder)
            .order_by_asc(product_variation::Column::Id)
            .all(db)
            .await?;

        let mut attached = Vec::with_capacity(links.len());
        for link in links {
            let group = VariationGroupEntity::find_by_id(link.variation_group_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Product variation {} references missing group {}",
                        link.id, link.variation_group_id
                    ))
                })?;
            let options = VariationOptionEntity::find()
                .filter(variation_option::Column::VariationGroupId.eq(group.id))
                .order_by_asc(variation_option::Column::SortOrder)
                .order_by_asc(variation_option::Column::Id)
                .all(db)
                .await?;
            attached.push(AttachedGroup {
                link,
                group,
                options,
            });
        }
        Ok(attached)
    }

    /// Line price for a product with the given selected option ids: base
    /// price plus the sum of the options' price modifiers.
    ///
    /// Enforces each attached group's selection rules: required groups need
    /// a pick, single-select groups allow at most one, and multi-select
    /// groups are bounded by min/max selections.
    #[instrument(skip(self))]
    pub async fn price_with_options(
        &self,
        product_id: i64,
        selected_option_ids: &[i64],
    ) -> Result<Decimal, ServiceError> {
        let product = self.get_product(product_id).await?;
        let attached = self.groups_for_product(product_id).await?;

        // Index every selectable option by id; remember its group.
        let mut option_group: HashMap<i64, (i64, Decimal, bool)> = HashMap::new();
        for entry in &attached {
            for option in &entry.options {
                option_group.insert(
                    option.id,
                    (entry.group.id, option.price_modifier, option.active),
                );
            }
        }

        let mut per_group_counts: HashMap<i64, usize> = HashMap::new();
        let mut price = product.price;
        for option_id in selected_option_ids {
            let (group_id, modifier, active) =
                option_group.get(option_id).copied().ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Option {} is not available for product {}",
                        option_id, product_id
                    ))
                })?;
            if !active {
                return Err(ServiceError::ValidationError(format!(
                    "Option {} is not active",
                    option_id
                )));
            }
            *per_group_counts.entry(group_id).or_insert(0) += 1;
            price += modifier;
        }

        for entry in &attached {
            let group = &entry.group;
            let count = per_group_counts.get(&group.id).copied().unwrap_or(0);
            let required = entry.link.required || group.required;

            if required && count == 0 {
                return Err(ServiceError::ValidationError(format!(
                    "A selection from {:?} is required",
                    group.display_name
                )));
            }
            if !group.multiple_selection && count > 1 {
                return Err(ServiceError::ValidationError(format!(
                    "{:?} allows only one selection",
                    group.display_name
                )));
            }
            if count > 0 && group.multiple_selection {
                if count < group.min_selections.max(0) as usize {
                    return Err(ServiceError::ValidationError(format!(
                        "{:?} requires at least {} selections",
                        group.display_name, group.min_selections
                    )));
                }
                if group.max_selections > 0 && count > group.max_selections as usize {
                    return Err(ServiceError::ValidationError(format!(
                        "{:?} allows at most {} selections",
                        group.display_name, group.max_selections
                    )));
                }
            }
        }

        Ok(price)
    }

    fn connection(&self) -> &DatabaseConnection {
        self.db_pool.as_ref()
    }
}
