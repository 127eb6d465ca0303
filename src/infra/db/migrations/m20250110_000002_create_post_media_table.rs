//! Migration: Create the post_media table.

use sea_orm_migration::prelude::*;

use super::m20250110_000001_create_posts_table::Posts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostMedia::Table)
                    .col(
                        ColumnDef::new(PostMedia::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostMedia::PostId).big_integer().not_null())
                    .col(ColumnDef::new(PostMedia::Url).text().not_null())
                    .col(ColumnDef::new(PostMedia::Type).string_len(16).not_null())
                    .col(
                        ColumnDef::new(PostMedia::Position)
                            .integer()
                            .not_null()
                            .check(Expr::col(PostMedia::Position).between(1, 9)),
                    )
                    .col(
                        ColumnDef::new(PostMedia::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_media_post_id")
                            .from(PostMedia::Table, PostMedia::PostId)
                            .to(Posts::Table, Posts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_media_post_id_position")
                    .table(PostMedia::Table)
                    .col(PostMedia::PostId)
                    .col(PostMedia::Position)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostMedia::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PostMedia {
    Table,
    Id,
    PostId,
    Url,
    Type,
    Position,
    CreatedAt,
}
