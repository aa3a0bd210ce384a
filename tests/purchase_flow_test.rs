//! Purchase lifecycle: create pending, receive into stock.

mod common;

use std::collections::HashMap;

use chrono::Utc;
use common::TestApp;
use larder::entities::purchase::PurchaseStatus;
use larder::entities::stock_movement::MovementType;
use larder::errors::ServiceError;
use larder::services::purchasing::{CreatePurchaseInput, PurchaseLineInput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn purchase_input(supplier_id: i64, lines: Vec<PurchaseLineInput>) -> CreatePurchaseInput {
    CreatePurchaseInput {
        supplier_id,
        purchase_date: Utc::now().date_naive(),
        expected_date: None,
        notes: None,
        lines,
    }
}

fn line(ingredient_id: i64, quantity: Decimal, unit_price: Decimal) -> PurchaseLineInput {
    PurchaseLineInput {
        ingredient_id,
        quantity,
        unit: "kg".to_string(),
        unit_price,
    }
}

#[tokio::test]
async fn create_purchase_is_pending_with_computed_total() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;
    let butter = app.seed_ingredient("Butter", dec!(6.00)).await;

    let purchase = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![
                line(flour.id, dec!(25), dec!(1.40)),
                line(butter.id, dec!(5), dec!(5.80)),
            ],
        ))
        .await
        .expect("create purchase");

    assert_eq!(purchase.status, PurchaseStatus::Pending.as_str());
    assert!(purchase.purchase_number.starts_with("PUR-"));
    assert_eq!(purchase.total_amount, dec!(64)); // 25*1.40 + 5*5.80

    // Creating a purchase must not move stock.
    let flour_after = app.services.ingredients.get(flour.id).await.expect("get");
    assert_eq!(flour_after.current_stock, Decimal::ZERO);
}

#[tokio::test]
async fn purchase_numbers_are_unique() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;

    let first = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(1), dec!(1.40))],
        ))
        .await
        .expect("create purchase");
    let second = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(1), dec!(1.40))],
        ))
        .await
        .expect("create purchase");

    assert_ne!(first.purchase_number, second.purchase_number);
}

#[tokio::test]
async fn receiving_adds_stock_and_adopts_purchase_price() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;
    app.set_stock(flour.id, dec!(3)).await;

    let purchase = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(25), dec!(1.40))],
        ))
        .await
        .expect("create purchase");

    app.services
        .purchasing
        .receive(purchase.id, HashMap::new())
        .await
        .expect("receive purchase");

    let flour_after = app.services.ingredients.get(flour.id).await.expect("get");
    // Receipt with no explicit quantities falls back to the ordered amount.
    assert_eq!(flour_after.current_stock, dec!(28));
    // Last purchase price wins.
    assert_eq!(flour_after.unit_cost, dec!(1.40));

    let detail = app
        .services
        .purchasing
        .get(purchase.id)
        .await
        .expect("get purchase");
    assert_eq!(detail.purchase.status, PurchaseStatus::Received.as_str());
    assert!(detail.purchase.received_date.is_some());
    assert_eq!(detail.items[0].received_quantity, dec!(25));

    let movements = app
        .services
        .movements
        .list_for_ingredient(flour.id, 10)
        .await
        .expect("list movements");
    let receipt = movements
        .iter()
        .find(|m| m.movement_type == MovementType::Purchase.as_str())
        .expect("purchase entry");
    assert_eq!(receipt.quantity, dec!(25));
    assert_eq!(receipt.unit_cost, Some(dec!(1.40)));
    assert_eq!(receipt.reference_type.as_deref(), Some("purchase"));
    assert_eq!(receipt.reference_id, Some(purchase.id));
}

#[tokio::test]
async fn partial_receipt_uses_explicit_quantities() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;

    let purchase = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(25), dec!(1.40))],
        ))
        .await
        .expect("create purchase");
    let detail = app
        .services
        .purchasing
        .get(purchase.id)
        .await
        .expect("get purchase");
    let item_id = detail.items[0].id;

    let mut received = HashMap::new();
    received.insert(item_id, dec!(18));
    app.services
        .purchasing
        .receive(purchase.id, received)
        .await
        .expect("receive purchase");

    let flour_after = app.services.ingredients.get(flour.id).await.expect("get");
    assert_eq!(flour_after.current_stock, dec!(18));
}

#[tokio::test]
async fn receiving_twice_is_rejected() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;

    let purchase = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(10), dec!(1.40))],
        ))
        .await
        .expect("create purchase");

    app.services
        .purchasing
        .receive(purchase.id, HashMap::new())
        .await
        .expect("first receipt");

    let second = app
        .services
        .purchasing
        .receive(purchase.id, HashMap::new())
        .await;
    assert!(matches!(second, Err(ServiceError::InvalidOperation(_))));

    // Stock must not have been credited twice.
    let flour_after = app.services.ingredients.get(flour.id).await.expect("get");
    assert_eq!(flour_after.current_stock, dec!(10));
}

#[tokio::test]
async fn negative_received_quantity_is_rejected() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;

    let purchase = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(10), dec!(1.40))],
        ))
        .await
        .expect("create purchase");
    let detail = app
        .services
        .purchasing
        .get(purchase.id)
        .await
        .expect("get purchase");

    let mut received = HashMap::new();
    received.insert(detail.items[0].id, dec!(-1));
    let result = app.services.purchasing.receive(purchase.id, received).await;

    assert!(matches!(result, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn create_rejects_empty_and_invalid_lines() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;

    let empty = app
        .services
        .purchasing
        .create(purchase_input(supplier_id, vec![]))
        .await;
    assert!(matches!(empty, Err(ServiceError::ValidationError(_))));

    let zero_qty = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, Decimal::ZERO, dec!(1.40))],
        ))
        .await;
    assert!(matches!(zero_qty, Err(ServiceError::ValidationError(_))));

    let negative_price = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(1), dec!(-0.10))],
        ))
        .await;
    assert!(matches!(
        negative_price,
        Err(ServiceError::ValidationError(_))
    ));
}

#[tokio::test]
async fn create_rejects_unknown_supplier_and_ingredient() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;

    let bad_supplier = app
        .services
        .purchasing
        .create(purchase_input(9999, vec![line(flour.id, dec!(1), dec!(1))]))
        .await;
    assert!(matches!(bad_supplier, Err(ServiceError::NotFound(_))));

    let bad_ingredient = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(9999, dec!(1), dec!(1))],
        ))
        .await;
    assert!(matches!(
        bad_ingredient,
        Err(ServiceError::ValidationError(_))
    ));
}

#[tokio::test]
async fn list_by_status_filters_pending_purchases() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier("Acme Foods").await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;

    let first = app
        .services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(5), dec!(1.40))],
        ))
        .await
        .expect("create purchase");
    app.services
        .purchasing
        .create(purchase_input(
            supplier_id,
            vec![line(flour.id, dec!(5), dec!(1.40))],
        ))
        .await
        .expect("create purchase");

    app.services
        .purchasing
        .receive(first.id, HashMap::new())
        .await
        .expect("receive");

    let pending = app
        .services
        .purchasing
        .list_by_status(PurchaseStatus::Pending)
        .await
        .expect("list pending");
    assert_eq!(pending.len(), 1);

    let received = app
        .services
        .purchasing
        .list_by_status(PurchaseStatus::Received)
        .await
        .expect("list received");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].id, first.id);
}
