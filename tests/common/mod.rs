use std::sync::Arc;

use larder::db::{establish_connection_with_config, DbConfig, DbPool};
use larder::entities::ingredient;
use larder::events::{self, EventSender};
use larder::migrator::Migrator;
use larder::services::ingredients::CreateIngredientInput;
use larder::services::recipes::{CreateRecipeInput, RecipeLineInput};
use larder::services::suppliers::SupplierInput;
use larder::AppServices;
use rust_decimal::Decimal;
use sea_orm_migration::MigratorTrait;

/// Test harness wiring all services over an in-memory SQLite database.
pub struct TestApp {
    #[allow(dead_code)]
    pub db: Arc<DbPool>,
    pub services: AppServices,
    #[allow(dead_code)]
    pub event_sender: Arc<EventSender>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh database state with migrations applied.
    pub async fn new() -> Self {
        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            // An in-memory database needs every query on one connection.
            max_connections: 1,
            min_connections: 1,
            ..DbConfig::default()
        };
        let pool = establish_connection_with_config(&config)
            .await
            .expect("connect to in-memory sqlite");
        Migrator::up(&pool, None).await.expect("run migrations");

        let db = Arc::new(pool);
        let (event_sender, event_rx) = events::channel(64);
        let event_sender = Arc::new(event_sender);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db.clone(), event_sender.clone());

        Self {
            db,
            services,
            event_sender,
            _event_task: event_task,
        }
    }

    /// Inserts a supplier and returns its id.
    pub async fn seed_supplier(&self, name: &str) -> i64 {
        self.services
            .suppliers
            .create(SupplierInput {
                name: name.to_string(),
                contact_person: None,
                phone: None,
                email: None,
                address: None,
                tax_id: None,
            })
            .await
            .expect("create supplier")
            .id
    }

    /// Inserts an ingredient and returns the stored row. Stock starts at
    /// zero; use `set_stock` to raise it.
    pub async fn seed_ingredient(&self, name: &str, unit_cost: Decimal) -> ingredient::Model {
        self.services
            .ingredients
            .create(CreateIngredientInput {
                name: name.to_string(),
                description: None,
                unit: "kg".to_string(),
                min_stock: Decimal::ZERO,
                max_stock: Decimal::new(1000, 0),
                unit_cost,
                preferred_supplier_id: None,
            })
            .await
            .expect("create ingredient")
    }

    /// Raises an ingredient's stock by `quantity` through a manual
    /// adjustment, so the ledger stays consistent with the stored total.
    pub async fn set_stock(&self, ingredient_id: i64, quantity: Decimal) -> ingredient::Model {
        self.services
            .ingredients
            .adjust_stock(ingredient_id, quantity, "test seed")
            .await
            .expect("adjust stock")
    }

    /// Creates a recipe from (ingredient_id, quantity) pairs, returns its id.
    pub async fn seed_recipe(
        &self,
        name: &str,
        product_id: Option<i64>,
        lines: Vec<(i64, Decimal)>,
        servings: Decimal,
    ) -> i64 {
        self.services
            .recipes
            .create(CreateRecipeInput {
                product_id,
                name: name.to_string(),
                category: None,
                instructions: None,
                servings,
                yield_unit: "portion".to_string(),
                prep_time_minutes: 5,
                cook_time_minutes: 10,
                lines: lines
                    .into_iter()
                    .map(|(ingredient_id, quantity)| RecipeLineInput {
                        ingredient_id,
                        quantity,
                        unit: "kg".to_string(),
                        notes: None,
                    })
                    .collect(),
            })
            .await
            .expect("create recipe")
    }
}
