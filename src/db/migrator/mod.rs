use sea_orm_migration::prelude::*;

mod m20250101_initial;
mod m20250102_seed_defaults;

pub use m20250102_seed_defaults::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_initial::Migration),
            Box::new(m20250102_seed_defaults::Migration),
        ]
    }
}
