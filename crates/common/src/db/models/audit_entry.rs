//! Platform audit log entity
//!
//! Records administrative and authentication events in the public schema.
//! Tenant-scoped GRC records are not written here.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub tenant_id: Option<Uuid>,

    pub actor_id: Option<Uuid>,

    /// Event name, e.g. `tenant.activated`, `login.failed`
    #[sea_orm(column_type = "Text")]
    pub action: String,

    /// Affected entity, e.g. `tenant:<uuid>`
    #[sea_orm(column_type = "Text")]
    pub target: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub detail: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
