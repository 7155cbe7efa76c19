//! SeaORM Entity for users table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    /// Materialized balance, only changed by the points ledger.
    pub points: i64,
    pub last_daily_challenge_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_votes::Entity")]
    UserVotes,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
    #[sea_orm(has_many = "super::point_transactions::Entity")]
    PointTransactions,
}

impl Related<super::user_votes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserVotes.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::point_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PointTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Name shown next to comments and on the leaderboard.
    pub fn display_name(&self) -> String {
        if !self.first_name.trim().is_empty() {
            self.first_name.clone()
        } else if let Some(username) = self.username.as_ref().filter(|u| !u.is_empty()) {
            username.clone()
        } else {
            crate::constants::FALLBACK_AUTHOR_NAME.to_owned()
        }
    }
}
