//! Recipe consumption: two-pass check-then-commit semantics.

mod common;

use common::TestApp;
use larder::entities::stock_movement::MovementType;
use larder::errors::ServiceError;
use larder::services::catalog::CreateProductInput;
use larder::services::consumption::ConsumptionOutcome;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn consuming_with_sufficient_stock_decrements_every_line() {
    let app = TestApp::new().await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;
    let butter = app.seed_ingredient("Butter", dec!(6.00)).await;
    app.set_stock(flour.id, dec!(10)).await;
    app.set_stock(butter.id, dec!(4)).await;

    let recipe_id = app
        .seed_recipe(
            "Croissant",
            None,
            vec![(flour.id, dec!(0.5)), (butter.id, dec!(0.25))],
            dec!(4),
        )
        .await;

    let outcome = app
        .services
        .consumption
        .consume(recipe_id, dec!(2))
        .await
        .expect("consume");
    assert!(outcome.is_consumed());

    let flour_after = app.services.ingredients.get(flour.id).await.expect("get");
    let butter_after = app.services.ingredients.get(butter.id).await.expect("get");
    assert_eq!(flour_after.current_stock, dec!(9)); // 10 - 0.5 * 2
    assert_eq!(butter_after.current_stock, dec!(3.5)); // 4 - 0.25 * 2

    let movements = app
        .services
        .movements
        .list_for_ingredient(flour.id, 10)
        .await
        .expect("list movements");
    let consumption = movements
        .iter()
        .find(|m| m.movement_type == MovementType::Consumption.as_str())
        .expect("consumption entry");
    assert_eq!(consumption.quantity, dec!(-1));
    assert_eq!(consumption.reference_type.as_deref(), Some("recipe"));
    assert_eq!(consumption.reference_id, Some(recipe_id));
    // The ledger note names the consumed ingredient.
    assert_eq!(
        consumption.notes.as_deref(),
        Some("Recipe consumption: Flour")
    );
}

#[tokio::test]
async fn shortage_on_any_line_leaves_all_stock_untouched() {
    let app = TestApp::new().await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;
    let butter = app.seed_ingredient("Butter", dec!(6.00)).await;
    app.set_stock(flour.id, dec!(10)).await;
    app.set_stock(butter.id, dec!(0.1)).await;

    let recipe_id = app
        .seed_recipe(
            "Croissant",
            None,
            vec![(flour.id, dec!(0.5)), (butter.id, dec!(0.25))],
            dec!(4),
        )
        .await;

    let outcome = app
        .services
        .consumption
        .consume(recipe_id, dec!(2))
        .await
        .expect("consume");

    let shortages = match outcome {
        ConsumptionOutcome::ShortStock(s) => s,
        ConsumptionOutcome::Consumed => panic!("expected a shortage"),
    };
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].ingredient_id, butter.id);
    assert_eq!(shortages[0].needed, dec!(0.5));
    assert_eq!(shortages[0].available, dec!(0.1));

    // First-pass check failed, so nothing was written: flour is untouched
    // even though its own line could have been satisfied.
    let flour_after = app.services.ingredients.get(flour.id).await.expect("get");
    assert_eq!(flour_after.current_stock, dec!(10));

    let movements = app
        .services
        .movements
        .list_for_ingredient(flour.id, 10)
        .await
        .expect("list movements");
    assert!(movements
        .iter()
        .all(|m| m.movement_type != MovementType::Consumption.as_str()));
}

#[tokio::test]
async fn shortage_reports_every_deficient_line() {
    let app = TestApp::new().await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;
    let butter = app.seed_ingredient("Butter", dec!(6.00)).await;

    let recipe_id = app
        .seed_recipe(
            "Croissant",
            None,
            vec![(flour.id, dec!(0.5)), (butter.id, dec!(0.25))],
            dec!(4),
        )
        .await;

    let outcome = app
        .services
        .consumption
        .consume(recipe_id, Decimal::ONE)
        .await
        .expect("consume");

    match outcome {
        ConsumptionOutcome::ShortStock(s) => assert_eq!(s.len(), 2),
        ConsumptionOutcome::Consumed => panic!("expected a shortage"),
    }
}

#[tokio::test]
async fn non_positive_multiplier_is_rejected() {
    let app = TestApp::new().await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;
    let recipe_id = app
        .seed_recipe("Bread", None, vec![(flour.id, dec!(1))], dec!(1))
        .await;

    let zero = app.services.consumption.consume(recipe_id, Decimal::ZERO).await;
    assert!(matches!(zero, Err(ServiceError::ValidationError(_))));

    let negative = app.services.consumption.consume(recipe_id, dec!(-1)).await;
    assert!(matches!(negative, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn consuming_unknown_recipe_is_not_found() {
    let app = TestApp::new().await;

    let result = app.services.consumption.consume(31337, Decimal::ONE).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn consume_for_product_uses_the_active_recipe() {
    let app = TestApp::new().await;
    let flour = app.seed_ingredient("Flour", dec!(1.50)).await;
    app.set_stock(flour.id, dec!(10)).await;

    let product = app
        .services
        .catalog
        .create_product(CreateProductInput {
            name: "Sourdough Loaf".to_string(),
            description: None,
            price: dec!(7.50),
            category: Some("Bakery".to_string()),
        })
        .await
        .expect("create product");

    app.seed_recipe(
        "Sourdough",
        Some(product.id),
        vec![(flour.id, dec!(0.8))],
        dec!(1),
    )
    .await;

    let outcome = app
        .services
        .consumption
        .consume_for_product(product.id, dec!(3))
        .await
        .expect("consume for product");
    assert!(matches!(outcome, Some(ConsumptionOutcome::Consumed)));

    let flour_after = app.services.ingredients.get(flour.id).await.expect("get");
    assert_eq!(flour_after.current_stock, dec!(7.6)); // 10 - 0.8 * 3
}

#[tokio::test]
async fn consume_for_product_without_recipe_is_a_no_op() {
    let app = TestApp::new().await;

    let product = app
        .services
        .catalog
        .create_product(CreateProductInput {
            name: "Bottled Water".to_string(),
            description: None,
            price: dec!(2.00),
            category: None,
        })
        .await
        .expect("create product");

    let outcome = app
        .services
        .consumption
        .consume_for_product(product.id, Decimal::ONE)
        .await
        .expect("consume for product");
    assert!(outcome.is_none());
}
