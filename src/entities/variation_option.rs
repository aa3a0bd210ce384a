use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One pickable option in a variation group.
///
/// `price_modifier` is a signed adjustment to the line price. Options are not
/// wired to ingredient consumption.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "variation_options")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub variation_group_id: i64,
    pub name: String,
    pub display_name: String,
    pub price_modifier: Decimal,
    pub active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::variation_group::Entity",
        from = "Column::VariationGroupId",
        to = "super::variation_group::Column::Id"
    )]
    Group,
}

impl Related<super::variation_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
