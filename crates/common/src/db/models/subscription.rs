//! Subscription entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
    Expired,
}

impl From<String> for SubscriptionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => SubscriptionStatus::Pending,
            "active" => SubscriptionStatus::Active,
            "cancelled" => SubscriptionStatus::Cancelled,
            "expired" => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::Pending,
        }
    }
}

impl From<SubscriptionStatus> for String {
    fn from(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::Pending => "pending".to_string(),
            SubscriptionStatus::Active => "active".to_string(),
            SubscriptionStatus::Cancelled => "cancelled".to_string(),
            SubscriptionStatus::Expired => "expired".to_string(),
        }
    }
}

/// Billing cycle; drives the subscription end date set on activation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

impl BillingCycle {
    /// Subscription term length in days
    pub fn term_days(&self) -> i64 {
        match self {
            BillingCycle::Monthly => 30,
            BillingCycle::Annual => 365,
        }
    }
}

impl From<String> for BillingCycle {
    fn from(s: String) -> Self {
        match s.as_str() {
            "annual" => BillingCycle::Annual,
            _ => BillingCycle::Monthly,
        }
    }
}

impl From<BillingCycle> for String {
    fn from(cycle: BillingCycle) -> Self {
        match cycle {
            BillingCycle::Monthly => "monthly".to_string(),
            BillingCycle::Annual => "annual".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub plan: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text")]
    pub billing_cycle: String,

    /// Integer cents; avoids floating-point money
    pub price_cents: i64,

    #[sea_orm(column_type = "Text")]
    pub currency: String,

    pub start_date: DateTimeWithTimeZone,

    /// Null until the tenant is activated
    pub end_date: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the subscription status as an enum
    pub fn subscription_status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from(self.status.clone())
    }

    pub fn cycle(&self) -> BillingCycle {
        BillingCycle::from(self.billing_cycle.clone())
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Active,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            let s: String = status.clone().into();
            assert_eq!(SubscriptionStatus::from(s), status);
        }
    }

    #[test]
    fn test_billing_cycle_terms() {
        assert_eq!(BillingCycle::Monthly.term_days(), 30);
        assert_eq!(BillingCycle::Annual.term_days(), 365);
        assert_eq!(BillingCycle::from("annual".to_string()), BillingCycle::Annual);
        assert_eq!(BillingCycle::from("monthly".to_string()), BillingCycle::Monthly);
    }
}
