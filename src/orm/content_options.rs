//! SeaORM Entity for content_options table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "content_options")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub content_id: i32,
    pub option_text: String,
    pub image_url: Option<String>,
    pub display_order: i32,
    pub vote_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::content::Entity",
        from = "Column::ContentId",
        to = "super::content::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Content,
    #[sea_orm(has_many = "super::user_votes::Entity")]
    UserVotes,
}

impl Related<super::content::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Content.def()
    }
}

impl Related<super::user_votes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserVotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
