use crate::entities::{plans, users};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Bootstrap administrator. The password should be changed after first login.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "password";
const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";

/// (name, duration in days, price in cents)
const DEFAULT_PLANS: [(&str, i32, i32); 4] = [
    ("free", 0, 0),
    ("1_month", 30, 999),
    ("6_month", 180, 4999),
    ("12_month", 365, 8999),
];

fn hash_default_password() -> Result<String, DbErr> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(DEFAULT_ADMIN_PASSWORD.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbErr::Custom(format!("Failed to hash default password: {e}")))
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let now = chrono::Utc::now().to_rfc3339();

        let insert_admin = Query::insert()
            .into_table(users::Entity)
            .columns([
                users::Column::Username,
                users::Column::PasswordHash,
                users::Column::Email,
                users::Column::IsAdmin,
                users::Column::IsStaff,
                users::Column::CreatedAt,
                users::Column::UpdatedAt,
            ])
            .values_panic([
                DEFAULT_ADMIN_USERNAME.into(),
                hash_default_password()?.into(),
                DEFAULT_ADMIN_EMAIL.into(),
                true.into(),
                true.into(),
                now.clone().into(),
                now.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert_admin).await?;

        let mut insert_plans = Query::insert()
            .into_table(plans::Entity)
            .columns([
                plans::Column::Name,
                plans::Column::DurationDays,
                plans::Column::Price,
            ])
            .to_owned();

        for (name, duration_days, price) in DEFAULT_PLANS {
            insert_plans.values_panic([name.into(), duration_days.into(), price.into()]);
        }

        manager.exec_stmt(insert_plans).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(users::Entity)
                    .and_where(Expr::col(users::Column::Username).eq(DEFAULT_ADMIN_USERNAME))
                    .to_owned(),
            )
            .await?;

        manager
            .exec_stmt(Query::delete().from_table(plans::Entity).to_owned())
            .await?;

        Ok(())
    }
}
