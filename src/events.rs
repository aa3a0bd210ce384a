use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Domain events emitted by the services after a unit of work commits.
///
/// A rolled-back transaction never produces an event, so consumers can treat
/// every event as a durable fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Ingredient events
    IngredientCreated(i64),
    IngredientUpdated(i64),
    StockAdjusted {
        ingredient_id: i64,
        delta: Decimal,
        new_stock: Decimal,
    },

    // Supplier events
    SupplierCreated(i64),
    SupplierUpdated(i64),
    SupplierDeactivated(i64),

    // Recipe events
    RecipeCreated(i64),
    RecipeUpdated(i64),
    RecipeDeleted(i64),
    RecipeDuplicated {
        source_id: i64,
        new_id: i64,
    },

    // Purchase events
    PurchaseCreated {
        purchase_id: i64,
        purchase_number: String,
        total_amount: Decimal,
    },
    PurchaseReceived {
        purchase_id: i64,
    },

    // Consumption events
    RecipeConsumed {
        recipe_id: i64,
        multiplier: Decimal,
    },
    ConsumptionShortage {
        recipe_id: i64,
        short_ingredients: usize,
    },

    // Catalog events
    ProductCreated(i64),
    ProductUpdated(i64),
    VariationGroupCreated(i64),
    VariationOptionAdded {
        group_id: i64,
        option_id: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the receiver is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event delivery failed: {}", e);
        }
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Default event consumer: logs everything it receives.
///
/// Spawn this on the runtime; it exits when all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::ConsumptionShortage {
                recipe_id,
                short_ingredients,
            } => {
                warn!(
                    "Insufficient stock consuming recipe {}: {} ingredient(s) short",
                    recipe_id, short_ingredients
                );
            }
            other => {
                info!("Event: {:?}", other);
            }
        }
    }
}
