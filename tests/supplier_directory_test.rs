//! Supplier directory CRUD and the movement ledger surface.

mod common;

use common::TestApp;
use larder::entities::stock_movement::MovementType;
use larder::errors::ServiceError;
use larder::services::suppliers::SupplierInput;
use rust_decimal_macros::dec;

fn input(name: &str) -> SupplierInput {
    SupplierInput {
        name: name.to_string(),
        contact_person: Some("Sam Doe".to_string()),
        phone: Some("555-0142".to_string()),
        email: Some("orders@example.com".to_string()),
        address: None,
        tax_id: None,
    }
}

#[tokio::test]
async fn create_update_and_fetch_supplier() {
    let app = TestApp::new().await;

    let created = app
        .services
        .suppliers
        .create(input("Acme Foods"))
        .await
        .expect("create supplier");
    assert!(created.active);

    let mut changed = input("Acme Foods Ltd");
    changed.phone = Some("555-0199".to_string());
    let updated = app
        .services
        .suppliers
        .update(created.id, changed)
        .await
        .expect("update supplier");
    assert_eq!(updated.name, "Acme Foods Ltd");
    assert_eq!(updated.phone.as_deref(), Some("555-0199"));

    let fetched = app
        .services
        .suppliers
        .get(created.id)
        .await
        .expect("get supplier");
    assert_eq!(fetched.name, "Acme Foods Ltd");
}

#[tokio::test]
async fn deactivation_is_soft_and_filters_active_listing() {
    let app = TestApp::new().await;
    let keep = app.seed_supplier("Keeper").await;
    let drop = app.seed_supplier("Dropped").await;

    app.services
        .suppliers
        .deactivate(drop)
        .await
        .expect("deactivate supplier");

    // The row survives; only the active flag flips.
    let row = app.services.suppliers.get(drop).await.expect("get");
    assert!(!row.active);

    let active = app.services.suppliers.list(true).await.expect("list active");
    let ids: Vec<i64> = active.iter().map(|s| s.id).collect();
    assert!(ids.contains(&keep));
    assert!(!ids.contains(&drop));

    let all = app.services.suppliers.list(false).await.expect("list all");
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn unknown_supplier_is_not_found() {
    let app = TestApp::new().await;

    let get = app.services.suppliers.get(9999).await;
    assert!(matches!(get, Err(ServiceError::NotFound(_))));

    let deactivate = app.services.suppliers.deactivate(9999).await;
    assert!(matches!(deactivate, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn ledger_append_requires_a_known_ingredient() {
    let app = TestApp::new().await;

    let result = app
        .services
        .movements
        .append(
            9999,
            MovementType::Adjustment,
            dec!(1),
            None,
            None,
            None,
            Some("orphan".to_string()),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn ledger_listing_is_most_recent_first_and_bounded() {
    let app = TestApp::new().await;
    let flour = app.seed_ingredient("Flour", dec!(2.00)).await;

    for note in ["first", "second", "third"] {
        app.services
            .ingredients
            .adjust_stock(flour.id, dec!(1), note)
            .await
            .expect("adjust");
    }

    let bounded = app
        .services
        .movements
        .list_for_ingredient(flour.id, 2)
        .await
        .expect("list movements");
    assert_eq!(bounded.len(), 2);
    assert_eq!(bounded[0].notes.as_deref(), Some("third"));
    assert_eq!(bounded[1].notes.as_deref(), Some("second"));
}
