use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum VendorCredentials {
    Table,
    Id,
    Vendor,
    Nickname,
    Username,
    Password,
    IdNumber,
    UserCode,
    Card6Digits,
    BankAccountNumber,
    LastSyncedAt,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Identifier,
    Vendor,
    Date,
    ProcessedDate,
    Name,
    NameNorm,
    PriceMinor,
    Category,
    CategorySource,
    AccountNumber,
    InstallmentsNumber,
    InstallmentsTotal,
    OriginalAmountMinor,
    OriginalCurrency,
    ChargedCurrency,
    Status,
    Kind,
    Channel,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CardOwnership {
    Table,
    Id,
    Vendor,
    AccountNumber,
    CredentialId,
    LinkedBankAccountId,
    CustomBankAccountNumber,
    CustomBankAccountNickname,
    CreatedAt,
}

#[derive(Iden)]
enum ScrapeEvents {
    Table,
    Id,
    TriggeredBy,
    Vendor,
    StartDate,
    Status,
    Message,
    ReportJson,
    DurationSeconds,
    RetryCount,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VendorCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VendorCredentials::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VendorCredentials::Vendor)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VendorCredentials::Nickname)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VendorCredentials::Username).string())
                    .col(ColumnDef::new(VendorCredentials::Password).string())
                    .col(ColumnDef::new(VendorCredentials::IdNumber).string())
                    .col(ColumnDef::new(VendorCredentials::UserCode).string())
                    .col(ColumnDef::new(VendorCredentials::Card6Digits).string())
                    .col(ColumnDef::new(VendorCredentials::BankAccountNumber).string())
                    .col(ColumnDef::new(VendorCredentials::LastSyncedAt).timestamp())
                    .col(
                        ColumnDef::new(VendorCredentials::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Identifier).string().not_null())
                    .col(ColumnDef::new(Transactions::Vendor).string().not_null())
                    .col(ColumnDef::new(Transactions::Date).date().not_null())
                    .col(
                        ColumnDef::new(Transactions::ProcessedDate)
                            .date()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Name).string().not_null())
                    .col(ColumnDef::new(Transactions::NameNorm).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::PriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Category).string())
                    .col(ColumnDef::new(Transactions::CategorySource).string())
                    .col(
                        ColumnDef::new(Transactions::AccountNumber)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::InstallmentsNumber).integer())
                    .col(ColumnDef::new(Transactions::InstallmentsTotal).integer())
                    .col(ColumnDef::new(Transactions::OriginalAmountMinor).big_integer())
                    .col(ColumnDef::new(Transactions::OriginalCurrency).string())
                    .col(ColumnDef::new(Transactions::ChargedCurrency).string())
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Channel).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Transactions::Identifier)
                            .col(Transactions::Vendor),
                    )
                    .to_owned(),
            )
            .await?;

        // Category memo lookups go through the normalized name.
        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-name_norm")
                    .table(Transactions::Table)
                    .col(Transactions::NameNorm)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CardOwnership::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardOwnership::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CardOwnership::Vendor).string().not_null())
                    .col(
                        ColumnDef::new(CardOwnership::AccountNumber)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardOwnership::CredentialId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CardOwnership::LinkedBankAccountId).string())
                    .col(ColumnDef::new(CardOwnership::CustomBankAccountNumber).string())
                    .col(ColumnDef::new(CardOwnership::CustomBankAccountNickname).string())
                    .col(
                        ColumnDef::new(CardOwnership::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-card_ownership-credential_id")
                            .from(CardOwnership::Table, CardOwnership::CredentialId)
                            .to(VendorCredentials::Table, VendorCredentials::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-card_ownership-vendor-account_number")
                    .table(CardOwnership::Table)
                    .col(CardOwnership::Vendor)
                    .col(CardOwnership::AccountNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScrapeEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScrapeEvents::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScrapeEvents::TriggeredBy).string().not_null())
                    .col(ColumnDef::new(ScrapeEvents::Vendor).string().not_null())
                    .col(ColumnDef::new(ScrapeEvents::StartDate).date().not_null())
                    .col(ColumnDef::new(ScrapeEvents::Status).string().not_null())
                    .col(ColumnDef::new(ScrapeEvents::Message).string())
                    .col(ColumnDef::new(ScrapeEvents::ReportJson).string())
                    .col(ColumnDef::new(ScrapeEvents::DurationSeconds).double())
                    .col(
                        ColumnDef::new(ScrapeEvents::RetryCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScrapeEvents::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The concurrency guard scans for recent `started` rows.
        manager
            .create_index(
                Index::create()
                    .name("idx-scrape_events-status-created_at")
                    .table(ScrapeEvents::Table)
                    .col(ScrapeEvents::Status)
                    .col(ScrapeEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScrapeEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CardOwnership::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VendorCredentials::Table).to_owned())
            .await?;
        Ok(())
    }
}
