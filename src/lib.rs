//! Larder
//!
//! Inventory core for a restaurant point of sale: ingredient stock,
//! suppliers, recipes, purchasing, and an append-only movement ledger.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    catalog::CatalogService, consumption::ConsumptionService, ingredients::IngredientService,
    movements::MovementService, purchasing::PurchaseService, recipes::RecipeService,
    reporting::ReportingService, suppliers::SupplierService,
};

/// All services wired over one connection pool and one event channel.
#[derive(Clone)]
pub struct AppServices {
    pub ingredients: IngredientService,
    pub suppliers: SupplierService,
    pub recipes: RecipeService,
    pub movements: MovementService,
    pub purchasing: PurchaseService,
    pub consumption: ConsumptionService,
    pub catalog: CatalogService,
    pub reporting: ReportingService,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            ingredients: IngredientService::new(db_pool.clone(), event_sender.clone()),
            suppliers: SupplierService::new(db_pool.clone(), event_sender.clone()),
            recipes: RecipeService::new(db_pool.clone(), event_sender.clone()),
            movements: MovementService::new(db_pool.clone()),
            purchasing: PurchaseService::new(db_pool.clone(), event_sender.clone()),
            consumption: ConsumptionService::new(db_pool.clone(), event_sender.clone()),
            catalog: CatalogService::new(db_pool.clone(), event_sender),
            reporting: ReportingService::new(db_pool),
        }
    }
}
