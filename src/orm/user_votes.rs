//! SeaORM Entity for user_votes table
//!
//! A unique index on (user_id, content_id) enforces one vote per user per item.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_votes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub content_id: i32,
    pub option_id: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::content::Entity",
        from = "Column::ContentId",
        to = "super::content::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Content,
    #[sea_orm(
        belongs_to = "super::content_options::Entity",
        from = "Column::OptionId",
        to = "super::content_options::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ContentOption,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::content::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Content.def()
    }
}

impl Related<super::content_options::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContentOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
