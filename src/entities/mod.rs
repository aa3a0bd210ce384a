pub mod ingredient;
pub mod product;
pub mod product_variation;
pub mod purchase;
pub mod purchase_item;
pub mod recipe;
pub mod recipe_ingredient;
pub mod stock_movement;
pub mod supplier;
pub mod variation_group;
pub mod variation_option;
