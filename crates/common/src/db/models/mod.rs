//! SeaORM entity models
//!
//! Shared (public schema) entities; per-tenant GRC tables are reached
//! through the generic resource store, not through entities here.

mod ai_settings;
mod audit_entry;
mod subscription;
mod tenant;
mod user;

pub use tenant::{
    Entity as TenantEntity,
    Model as Tenant,
    ActiveModel as TenantActiveModel,
    Column as TenantColumn,
    TenantStatus,
};

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    UserStatus,
};

pub use subscription::{
    Entity as SubscriptionEntity,
    Model as Subscription,
    ActiveModel as SubscriptionActiveModel,
    Column as SubscriptionColumn,
    BillingCycle,
    SubscriptionStatus,
};

pub use ai_settings::{
    Entity as AiSettingsEntity,
    Model as AiSettings,
    ActiveModel as AiSettingsActiveModel,
    Column as AiSettingsColumn,
};

pub use audit_entry::{
    Entity as AuditEntryEntity,
    Model as AuditEntry,
    ActiveModel as AuditEntryActiveModel,
    Column as AuditEntryColumn,
};
