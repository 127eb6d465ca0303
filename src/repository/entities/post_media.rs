//! Post media database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::MediaType;

/// Media kind column. Stored as text and checked by the schema.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MediaKind {
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "video")]
    Video,
}

impl From<MediaType> for MediaKind {
    fn from(t: MediaType) -> Self {
        match t {
            MediaType::Image => MediaKind::Image,
            MediaType::Video => MediaKind::Video,
        }
    }
}

impl From<MediaKind> for MediaType {
    fn from(k: MediaKind) -> Self {
        match k {
            MediaKind::Image => MediaType::Image,
            MediaKind::Video => MediaType::Video,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "post_media")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub post_id: i64,
    pub url: String,
    #[sea_orm(column_name = "type")]
    pub media_type: MediaKind,
    pub position: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl From<Model> for domain::PostMedia {
    fn from(model: Model) -> Self {
        domain::PostMedia {
            id: model.id,
            post_id: model.post_id,
            url: model.url,
            media_type: model.media_type.into(),
            position: model.position,
            created_at: Some(model.created_at),
        }
    }
}
