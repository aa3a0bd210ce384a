//! Product and variation catalog behavior.

mod common;

use common::TestApp;
use larder::errors::ServiceError;
use larder::services::catalog::{
    CreateProductInput, CreateVariationGroupInput, CreateVariationOptionInput, UpdateProductInput,
};
use rust_decimal_macros::dec;

async fn seed_product(app: &TestApp, name: &str, price: rust_decimal::Decimal) -> i64 {
    app.services
        .catalog
        .create_product(CreateProductInput {
            name: name.to_string(),
            description: None,
            price,
            category: None,
        })
        .await
        .expect("create product")
        .id
}

fn group_input(name: &str) -> CreateVariationGroupInput {
    CreateVariationGroupInput {
        name: name.to_string(),
        display_name: name.to_string(),
        description: None,
        required: false,
        multiple_selection: false,
        min_selections: 0,
        max_selections: 1,
    }
}

fn option_input(name: &str, modifier: rust_decimal::Decimal) -> CreateVariationOptionInput {
    CreateVariationOptionInput {
        name: name.to_string(),
        display_name: name.to_string(),
        price_modifier: modifier,
        sort_order: 0,
    }
}

#[tokio::test]
async fn product_crud_round_trip() {
    let app = TestApp::new().await;
    let id = seed_product(&app, "Latte", dec!(4.50)).await;

    let updated = app
        .services
        .catalog
        .update_product(
            id,
            UpdateProductInput {
                name: "Oat Latte".to_string(),
                description: Some("Oat milk only".to_string()),
                price: dec!(5.00),
                category: Some("Drinks".to_string()),
                available: false,
            },
        )
        .await
        .expect("update product");
    assert_eq!(updated.price, dec!(5.00));
    assert!(!updated.available);

    let available = app
        .services
        .catalog
        .list_products(true)
        .await
        .expect("list products");
    assert!(available.iter().all(|p| p.id != id));
}

#[tokio::test]
async fn duplicate_group_name_is_rejected() {
    let app = TestApp::new().await;

    app.services
        .catalog
        .create_group(group_input("size"))
        .await
        .expect("create group");
    let duplicate = app.services.catalog.create_group(group_input("size")).await;

    assert!(matches!(duplicate, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn attach_group_twice_is_rejected() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Latte", dec!(4.50)).await;
    let group = app
        .services
        .catalog
        .create_group(group_input("size"))
        .await
        .expect("create group");

    app.services
        .catalog
        .attach_group(product_id, group.id, false, 0)
        .await
        .expect("attach group");
    let again = app
        .services
        .catalog
        .attach_group(product_id, group.id, false, 1)
        .await;

    assert!(matches!(again, Err(ServiceError::InvalidOperation(_))));
}

#[tokio::test]
async fn groups_for_product_orders_by_attachment_sort_order() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Latte", dec!(4.50)).await;
    let size = app
        .services
        .catalog
        .create_group(group_input("size"))
        .await
        .expect("create group");
    let milk = app
        .services
        .catalog
        .create_group(group_input("milk"))
        .await
        .expect("create group");

    app.services
        .catalog
        .attach_group(product_id, milk.id, false, 2)
        .await
        .expect("attach milk");
    app.services
        .catalog
        .attach_group(product_id, size.id, false, 1)
        .await
        .expect("attach size");

    let attached = app
        .services
        .catalog
        .groups_for_product(product_id)
        .await
        .expect("groups for product");
    assert_eq!(attached.len(), 2);
    assert_eq!(attached[0].group.id, size.id);
    assert_eq!(attached[1].group.id, milk.id);
}

#[tokio::test]
async fn price_with_options_sums_modifiers_over_base_price() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Latte", dec!(4.50)).await;
    let size = app
        .services
        .catalog
        .create_group(group_input("size"))
        .await
        .expect("create group");
    let large = app
        .services
        .catalog
        .add_option(size.id, option_input("large", dec!(0.75)))
        .await
        .expect("add option");
    app.services
        .catalog
        .attach_group(product_id, size.id, false, 0)
        .await
        .expect("attach group");

    let base = app
        .services
        .catalog
        .price_with_options(product_id, &[])
        .await
        .expect("price without options");
    assert_eq!(base, dec!(4.50));

    let priced = app
        .services
        .catalog
        .price_with_options(product_id, &[large.id])
        .await
        .expect("price with option");
    assert_eq!(priced, dec!(5.25));
}

#[tokio::test]
async fn required_group_demands_a_selection() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Latte", dec!(4.50)).await;
    let mut input = group_input("size");
    input.required = true;
    let size = app
        .services
        .catalog
        .create_group(input)
        .await
        .expect("create group");
    let small = app
        .services
        .catalog
        .add_option(size.id, option_input("small", dec!(0)))
        .await
        .expect("add option");
    app.services
        .catalog
        .attach_group(product_id, size.id, true, 0)
        .await
        .expect("attach group");

    let missing = app.services.catalog.price_with_options(product_id, &[]).await;
    assert!(matches!(missing, Err(ServiceError::ValidationError(_))));

    let priced = app
        .services
        .catalog
        .price_with_options(product_id, &[small.id])
        .await
        .expect("price with required selection");
    assert_eq!(priced, dec!(4.50));
}

#[tokio::test]
async fn single_select_group_rejects_two_picks() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Latte", dec!(4.50)).await;
    let size = app
        .services
        .catalog
        .create_group(group_input("size"))
        .await
        .expect("create group");
    let small = app
        .services
        .catalog
        .add_option(size.id, option_input("small", dec!(0)))
        .await
        .expect("add option");
    let large = app
        .services
        .catalog
        .add_option(size.id, option_input("large", dec!(0.75)))
        .await
        .expect("add option");
    app.services
        .catalog
        .attach_group(product_id, size.id, false, 0)
        .await
        .expect("attach group");

    let both = app
        .services
        .catalog
        .price_with_options(product_id, &[small.id, large.id])
        .await;
    assert!(matches!(both, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn multi_select_group_enforces_min_and_max() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Pizza", dec!(12.00)).await;
    let toppings = app
        .services
        .catalog
        .create_group(CreateVariationGroupInput {
            name: "toppings".to_string(),
            display_name: "Toppings".to_string(),
            description: None,
            required: false,
            multiple_selection: true,
            min_selections: 2,
            max_selections: 3,
        })
        .await
        .expect("create group");

    let mut option_ids = Vec::new();
    for name in ["olives", "ham", "basil", "chili"] {
        let option = app
            .services
            .catalog
            .add_option(toppings.id, option_input(name, dec!(1.00)))
            .await
            .expect("add option");
        option_ids.push(option.id);
    }
    app.services
        .catalog
        .attach_group(product_id, toppings.id, false, 0)
        .await
        .expect("attach group");

    // One pick is below the minimum once the group is engaged.
    let too_few = app
        .services
        .catalog
        .price_with_options(product_id, &option_ids[..1])
        .await;
    assert!(matches!(too_few, Err(ServiceError::ValidationError(_))));

    let too_many = app
        .services
        .catalog
        .price_with_options(product_id, &option_ids[..])
        .await;
    assert!(matches!(too_many, Err(ServiceError::ValidationError(_))));

    let priced = app
        .services
        .catalog
        .price_with_options(product_id, &option_ids[..2])
        .await
        .expect("price inside bounds");
    assert_eq!(priced, dec!(14.00));

    // Optional multi-select group with nothing picked stays at base price.
    let base = app
        .services
        .catalog
        .price_with_options(product_id, &[])
        .await
        .expect("base price");
    assert_eq!(base, dec!(12.00));
}

#[tokio::test]
async fn option_from_an_unattached_group_is_rejected() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Latte", dec!(4.50)).await;
    let other = app
        .services
        .catalog
        .create_group(group_input("size"))
        .await
        .expect("create group");
    let stray = app
        .services
        .catalog
        .add_option(other.id, option_input("large", dec!(0.75)))
        .await
        .expect("add option");

    let result = app
        .services
        .catalog
        .price_with_options(product_id, &[stray.id])
        .await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn add_option_to_unknown_group_is_not_found() {
    let app = TestApp::new().await;

    let result = app
        .services
        .catalog
        .add_option(9999, option_input("large", dec!(0.75)))
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}
