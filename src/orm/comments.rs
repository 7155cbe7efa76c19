//! SeaORM Entity for comments table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub content_id: i32,
    pub author_id: i32,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub text: String,
    pub upvotes: i32,
    pub downvotes: i32,
    pub created_at: DateTime,
}

impl Model {
    pub fn net_score(&self) -> i32 {
        self.upvotes - self.downvotes
    }
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
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AuthorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(has_many = "super::comment_votes::Entity")]
    CommentVotes,
}

impl Related<super::content::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Content.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::comment_votes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommentVotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
