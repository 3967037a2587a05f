//! Per-tenant AI provider settings
//!
//! The API key is stored AES-encrypted; the plaintext never reaches this
//! entity. Handlers decrypt through `auth::secrets::SecretBox` on use.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ai_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub provider: String,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub api_key_encrypted: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub api_base: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub chat_model: String,

    #[sea_orm(column_type = "Text")]
    pub embedding_model: String,

    pub enabled: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
