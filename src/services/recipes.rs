use crate::{
    db::DbPool,
    entities::{
        ingredient::Entity as IngredientEntity,
        recipe, recipe::Entity as RecipeEntity,
        recipe_ingredient, recipe_ingredient::Entity as RecipeIngredientEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

/// One ingredient requirement supplied when creating or updating a recipe
#[derive(Debug, Clone)]
pub struct RecipeLineInput {
    pub ingredient_id: i64,
    pub quantity: Decimal,
    pub unit: String,
    pub notes: Option<String>,
}

/// Input payload for creating a recipe with its full line set
#[derive(Debug, Clone, Validate)]
pub struct CreateRecipeInput {
    pub product_id: Option<i64>,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub category: Option<String>,
    pub instructions: Option<String>,
    pub servings: Decimal,
    pub yield_unit: String,
    pub prep_time_minutes: i32,
    pub cook_time_minutes: i32,
    pub lines: Vec<RecipeLineInput>,
}

/// Input payload for updating a recipe. The line set is replaced wholesale.
#[derive(Debug, Clone, Validate)]
pub struct UpdateRecipeInput {
    pub product_id: Option<i64>,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub category: Option<String>,
    pub instructions: Option<String>,
    pub servings: Decimal,
    pub yield_unit: String,
    pub prep_time_minutes: i32,
    pub cook_time_minutes: i32,
    pub active: bool,
    pub lines: Vec<RecipeLineInput>,
}

/// Recipe line joined with its ingredient's name and live stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeLineView {
    pub id: i64,
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub notes: Option<String>,
    pub current_stock: Decimal,
}

/// Detailed recipe view including its line set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub product_id: Option<i64>,
    pub name: String,
    pub category: Option<String>,
    pub instructions: Option<String>,
    pub servings: Decimal,
    pub yield_unit: String,
    pub prep_time_minutes: i32,
    pub cook_time_minutes: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<RecipeLineView>,
}

/// Per-ingredient slice of a recipe cost rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLine {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    pub line_cost: Decimal,
}

/// Result of `compute_cost`: derived, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeCost {
    pub total_cost: Decimal,
    pub cost_per_serving: Decimal,
    pub lines: Vec<CostLine>,
}

/// Recipe catalog: bill-of-materials records and cost rollups
#[derive(Clone)]
pub struct RecipeService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl RecipeService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a recipe with its full line set in one unit of work.
    ///
    /// A non-positive line quantity or a dangling ingredient id fails the
    /// whole creation; no partial recipe is ever persisted.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateRecipeInput) -> Result<i64, ServiceError> {
        input.validate()?;
        let db = self.connection();
        let txn = db.begin().await?;

        Self::check_lines(&txn, &input.lines).await?;

        let model = recipe::ActiveModel {
            id: Default::default(),
            product_id: Set(input.product_id),
            name: Set(input.name),
            category: Set(input.category),
            instructions: Set(input.instructions),
            servings: Set(input.servings),
            yield_unit: Set(input.yield_unit),
            prep_time_minutes: Set(input.prep_time_minutes),
            cook_time_minutes: Set(input.cook_time_minutes),
            active: Set(true),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(&txn).await?;

        Self::insert_lines(&txn, created.id, &input.lines).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::RecipeCreated(created.id))
            .await;

        Ok(created.id)
    }

    /// Replaces the recipe's fields and its entire line set
    /// (delete-then-reinsert, not incremental diffing).
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i64, input: UpdateRecipeInput) -> Result<(), ServiceError> {
        input.validate()?;
        let db = self.connection();
        let txn = db.begin().await?;

        let existing = RecipeEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", id)))?;

        Self::check_lines(&txn, &input.lines).await?;

        let mut active: recipe::ActiveModel = existing.into();
        active.product_id = Set(input.product_id);
        active.name = Set(input.name);
        active.category = Set(input.category);
        active.instructions = Set(input.instructions);
        active.servings = Set(input.servings);
        active.yield_unit = Set(input.yield_unit);
        active.prep_time_minutes = Set(input.prep_time_minutes);
        active.cook_time_minutes = Set(input.cook_time_minutes);
        active.active = Set(input.active);
        active.update(&txn).await?;

        RecipeIngredientEntity::delete_many()
            .filter(recipe_ingredient::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        Self::insert_lines(&txn, id, &input.lines).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::RecipeUpdated(id))
            .await;

        Ok(())
    }

    /// Fetches a recipe and its lines joined with ingredient names and stock.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<RecipeDetail, ServiceError> {
        let db = self.connection();
        let model = RecipeEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", id)))?;

        let lines = Self::load_line_views(db, id).await?;

        Ok(RecipeDetail {
            id: model.id,
            product_id: model.product_id,
            name: model.name,
            category: model.category,
            instructions: model.instructions,
            servings: model.servings,
            yield_unit: model.yield_unit,
            prep_time_minutes: model.prep_time_minutes,
            cook_time_minutes: model.cook_time_minutes,
            active: model.active,
            created_at: model.created_at,
            lines,
        })
    }

    #[instrument(skip(self))]
    pub async fn list(&self, active_only: bool) -> Result<Vec<recipe::Model>, ServiceError> {
        let mut query = RecipeEntity::find().order_by_asc(recipe::Column::Name);
        if active_only {
            query = query.filter(recipe::Column::Active.eq(true));
        }
        Ok(query.all(self.connection()).await?)
    }

    /// First active recipe attached to a product, if any. This is the lookup
    /// the order subsystem performs per sold line item.
    #[instrument(skip(self))]
    pub async fn find_active_for_product(
        &self,
        product_id: i64,
    ) -> Result<Option<recipe::Model>, ServiceError> {
        let found = RecipeEntity::find()
            .filter(recipe::Column::ProductId.eq(product_id))
            .filter(recipe::Column::Active.eq(true))
            .order_by_asc(recipe::Column::Id)
            .one(self.connection())
            .await?;
        Ok(found)
    }

    /// Rolls up the recipe's ingredient cost. Pure read; calling it twice
    /// with no intervening writes returns identical results.
    ///
    /// `cost_per_serving` is defined as 0 when servings is not positive.
    #[instrument(skip(self))]
    pub async fn compute_cost(&self, id: i64) -> Result<RecipeCost, ServiceError> {
        let db = self.connection();
        let model = RecipeEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", id)))?;

        let pairs = RecipeIngredientEntity::find()
            .filter(recipe_ingredient::Column::RecipeId.eq(id))
            .find_also_related(IngredientEntity)
            .all(db)
            .await?;

        let mut total_cost = Decimal::ZERO;
        let mut lines = Vec::with_capacity(pairs.len());
        for (line, ingredient) in pairs {
            let ingredient = ingredient.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Recipe line {} references missing ingredient {}",
                    line.id, line.ingredient_id
                ))
            })?;
            let line_cost = line.quantity * ingredient.unit_cost;
            total_cost += line_cost;
            lines.push(CostLine {
                ingredient_id: ingredient.id,
                ingredient_name: ingredient.name,
                quantity: line.quantity,
                unit: line.unit,
                unit_cost: ingredient.unit_cost,
                line_cost,
            });
        }

        let cost_per_serving = if model.servings > Decimal::ZERO {
            total_cost / model.servings
        } else {
            Decimal::ZERO
        };

        Ok(RecipeCost {
            total_cost,
            cost_per_serving,
            lines,
        })
    }

    /// Creates a copy of the recipe with an identical line set; returns the
    /// new recipe id.
    #[instrument(skip(self))]
    pub async fn duplicate(&self, id: i64) -> Result<i64, ServiceError> {
        let db = self.connection();
        let txn = db.begin().await?;

        let source = RecipeEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", id)))?;

        let lines = RecipeIngredientEntity::find()
            .filter(recipe_ingredient::Column::RecipeId.eq(id))
            .order_by_asc(recipe_ingredient::Column::Id)
            .all(&txn)
            .await?;

        let copy = recipe::ActiveModel {
            id: Default::default(),
            product_id: Set(source.product_id),
            name: Set(format!("Copy of {}", source.name)),
            category: Set(source.category.clone()),
            instructions: Set(source.instructions.clone()),
            servings: Set(source.servings),
            yield_unit: Set(source.yield_unit.clone()),
            prep_time_minutes: Set(source.prep_time_minutes),
            cook_time_minutes: Set(source.cook_time_minutes),
            active: Set(source.active),
            created_at: Set(Utc::now()),
        };
        let created = copy.insert(&txn).await?;

        for line in lines {
            let line_copy = recipe_ingredient::ActiveModel {
                id: Default::default(),
                recipe_id: Set(created.id),
                ingredient_id: Set(line.ingredient_id),
                quantity: Set(line.quantity),
                unit: Set(line.unit),
                notes: Set(line.notes),
            };
            line_copy.insert(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::RecipeDuplicated {
                source_id: id,
                new_id: created.id,
            })
            .await;

        Ok(created.id)
    }

    /// Removes the recipe and its lines. Whether any product still points at
    /// it is the caller's responsibility to check.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let db = self.connection();
        let txn = db.begin().await?;

        let existing = RecipeEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe {} not found", id)))?;

        RecipeIngredientEntity::delete_many()
            .filter(recipe_ingredient::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        let active: recipe::ActiveModel = existing.into();
        active.delete(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::RecipeDeleted(id))
            .await;

        Ok(())
    }

    async fn check_lines<C: ConnectionTrait>(
        conn: &C,
        lines: &[RecipeLineInput],
    ) -> Result<(), ServiceError> {
        for line in lines {
            if line.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Recipe line for ingredient {} has non-positive quantity",
                    line.ingredient_id
                )));
            }
            let exists = IngredientEntity::find_by_id(line.ingredient_id)
                .one(conn)
                .await?;
            if exists.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Ingredient {} does not exist",
                    line.ingredient_id
                )));
            }
        }
        Ok(())
    }

    async fn insert_lines<C: ConnectionTrait>(
        conn: &C,
        recipe_id: i64,
        lines: &[RecipeLineInput],
    ) -> Result<(), ServiceError> {
        for line in lines {
            let model = recipe_ingredient::ActiveModel {
                id: Default::default(),
                recipe_id: Set(recipe_id),
                ingredient_id: Set(line.ingredient_id),
                quantity: Set(line.quantity),
                unit: Set(line.unit.clone()),
                notes: Set(line.notes.clone()),
            };
            model.insert(conn).await?;
        }
        Ok(())
    }

    async fn load_line_views(
        db: &DatabaseConnection,
        recipe_id: i64,
    ) -> Result<Vec<RecipeLineView>, ServiceError> {
        let pairs = RecipeIngredientEntity::find()
            .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
            .find_also_related(IngredientEntity)
            .all(db)
            .await?;

        let mut views = Vec::with_capacity(pairs.len());
        for (line, ingredient) in pairs {
            let ingredient = ingredient.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Recipe line {} references missing ingredient {}",
                    line.id, line.ingredient_id
                ))
            })?;
            views.push(RecipeLineView {
                id: line.id,
                ingredient_id: ingredient.id,
                ingredient_name: ingredient.name,
                quantity: line.quantity,
                unit: line.unit,
                notes: line.notes,
                current_stock: ingredient.current_stock,
            });
        }
        Ok(views)
    }

    fn connection(&self) -> &DatabaseConnection {
        self.db_pool.as_ref()
    }
}
