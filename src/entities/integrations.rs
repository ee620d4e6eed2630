use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "integrations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub integration_id: i32,

    #[sea_orm(unique)]
    pub integration_key: String,

    pub user_id: i32,

    pub account_id: i32,

    /// Opaque credential blob. Absent for bulk-imported rows.
    #[sea_orm(column_type = "Text", nullable)]
    pub private_key_file: Option<String>,

    pub email: String,

    /// One of active, inactive, pending, failed
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::UserId",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
