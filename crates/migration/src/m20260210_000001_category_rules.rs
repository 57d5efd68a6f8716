use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum CategorizationRules {
    Table,
    Id,
    NamePattern,
    TargetCategory,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
enum CategoryMappings {
    Table,
    SourceCategory,
    TargetCategory,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CategorizationRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CategorizationRules::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CategorizationRules::NamePattern)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CategorizationRules::TargetCategory)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CategorizationRules::IsActive)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CategorizationRules::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CategoryMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CategoryMappings::SourceCategory)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CategoryMappings::TargetCategory)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CategoryMappings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CategorizationRules::Table).to_owned())
            .await?;
        Ok(())
    }
}
