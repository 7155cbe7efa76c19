//! SeaORM Entity for content table (polls, challenges and predictions)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "content_type")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[sea_orm(string_value = "poll")]
    Poll,
    #[sea_orm(string_value = "challenge")]
    Challenge,
    #[sea_orm(string_value = "prediction")]
    Prediction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "content_category")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[sea_orm(string_value = "sports")]
    Sports,
    #[sea_orm(string_value = "games")]
    Games,
    #[sea_orm(string_value = "math")]
    Math,
    #[sea_orm(string_value = "puzzles")]
    Puzzles,
    #[sea_orm(string_value = "islamic")]
    Islamic,
    #[sea_orm(string_value = "tech")]
    Tech,
    #[sea_orm(string_value = "general")]
    General,
    #[sea_orm(string_value = "science")]
    Science,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sports => "sports",
            Category::Games => "games",
            Category::Math => "math",
            Category::Puzzles => "puzzles",
            Category::Islamic => "islamic",
            Category::Tech => "tech",
            Category::General => "general",
            Category::Science => "science",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        use sea_orm::Iterable;
        Self::iter().find(|c| c.as_str() == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "content_difficulty")]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[sea_orm(string_value = "easy")]
    Easy,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "hard")]
    Hard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "prediction_timeframe")]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[sea_orm(string_value = "week")]
    Week,
    #[sea_orm(string_value = "month")]
    Month,
    #[sea_orm(string_value = "year")]
    Year,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "content")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub content_type: ContentType,
    pub category: Category,
    pub question: String,
    /// Set for quizzes; points at one of this item's options.
    pub correct_option_id: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub timeframe: Option<Timeframe>,
    pub ends_at: Option<DateTime>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::content_options::Entity")]
    ContentOptions,
    #[sea_orm(has_many = "super::user_votes::Entity")]
    UserVotes,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::content_options::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContentOptions.def()
    }
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

impl ActiveModelBehavior for ActiveModel {}
