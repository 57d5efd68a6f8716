pub use sea_orm_migration::prelude::*;

mod m20260210_000000_ingest_tables;
mod m20260210_000001_category_rules;
mod m20260210_000002_app_settings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260210_000000_ingest_tables::Migration),
            Box::new(m20260210_000001_category_rules::Migration),
            Box::new(m20260210_000002_app_settings::Migration),
        ]
    }
}
