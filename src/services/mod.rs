pub mod catalog;
pub mod consumption;
pub mod ingredients;
pub mod movements;
pub mod purchasing;
pub mod recipes;
pub mod reporting;
pub mod suppliers;
