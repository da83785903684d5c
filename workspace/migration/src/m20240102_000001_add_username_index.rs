use crate::entity_iden::EntityIden;
use model::entities::prelude::*;
use model::entities::user;
use sea_orm_migration::prelude::*;

const INDEX_NAME: &str = "idx_users_username";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Listing sorts and filters by username
        manager
            .create_index(
                Index::create()
                    .name(INDEX_NAME)
                    .table(User::table())
                    .col(User::column(user::Column::Username))
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name(INDEX_NAME).table(User::table()).to_owned())
            .await
    }
}
