//! Login lifecycle evaluation
//!
//! Pure decision logic for whether a credentialed user may start a session.
//! Callers load the user, tenant, and subscription rows and pass them in;
//! nothing here touches the database. Checks run in a fixed order so the
//! denial a client sees is always the earliest failing gate:
//!
//! 1. user account status
//! 2. super-admin bypass (platform accounts skip tenant checks)
//! 3. tenant status
//! 4. subscription status and term

use crate::db::models::{SubscriptionStatus, TenantStatus, UserStatus};
use crate::errors::AppError;
use chrono::{DateTime, Utc};

/// Reason a login was refused after the password check passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginDenial {
    UserInactive,
    TenantPending,
    TenantSuspended,
    TenantDeleted,
    TenantNotActive,
    SubscriptionExpired,
    SubscriptionCancelled,
}

impl LoginDenial {
    pub fn message(&self) -> &'static str {
        match self {
            Self::UserInactive => "Account is disabled",
            Self::TenantPending => "Tenant account is pending activation",
            Self::TenantSuspended => "Tenant account is suspended",
            Self::TenantDeleted => "Tenant account has been deleted",
            Self::TenantNotActive => "Tenant account is not active",
            Self::SubscriptionExpired => "Subscription expired",
            Self::SubscriptionCancelled => "Subscription cancelled",
        }
    }
}

impl From<LoginDenial> for AppError {
    fn from(denial: LoginDenial) -> Self {
        AppError::Unauthorized {
            message: denial.message().to_string(),
        }
    }
}

/// Subscription facts needed for the login decision
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionState {
    pub status: SubscriptionStatus,
    pub end_date: Option<DateTime<Utc>>,
}

/// Decide whether a user whose password already verified may log in.
///
/// `tenant` is `None` when the user row has no tenant or the tenant row is
/// missing; for non-platform accounts that is a denial, not an error.
/// `subscription` is `None` when the tenant has no subscription row, which
/// permits login (the tenant was activated through a path that never created
/// one).
pub fn evaluate_login(
    user_status: UserStatus,
    is_super_admin: bool,
    tenant: Option<TenantStatus>,
    subscription: Option<SubscriptionState>,
    now: DateTime<Utc>,
) -> Result<(), LoginDenial> {
    if user_status != UserStatus::Active {
        return Err(LoginDenial::UserInactive);
    }

    if is_super_admin {
        return Ok(());
    }

    match tenant {
        Some(TenantStatus::Active) => {}
        Some(TenantStatus::Pending) => return Err(LoginDenial::TenantPending),
        Some(TenantStatus::Suspended) => return Err(LoginDenial::TenantSuspended),
        Some(TenantStatus::Deleted) => return Err(LoginDenial::TenantDeleted),
        None => return Err(LoginDenial::TenantNotActive),
    }

    if let Some(sub) = subscription {
        match sub.status {
            SubscriptionStatus::Cancelled => return Err(LoginDenial::SubscriptionCancelled),
            SubscriptionStatus::Expired => return Err(LoginDenial::SubscriptionExpired),
            SubscriptionStatus::Active | SubscriptionStatus::Pending => {
                if let Some(end) = sub.end_date {
                    if end < now {
                        return Err(LoginDenial::SubscriptionExpired);
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn active_sub(now: DateTime<Utc>) -> Option<SubscriptionState> {
        Some(SubscriptionState {
            status: SubscriptionStatus::Active,
            end_date: Some(now + Duration::days(30)),
        })
    }

    #[test]
    fn test_active_everything_permits() {
        let now = Utc::now();
        assert_eq!(
            evaluate_login(
                UserStatus::Active,
                false,
                Some(TenantStatus::Active),
                active_sub(now),
                now
            ),
            Ok(())
        );
    }

    #[test]
    fn test_inactive_user_denied_first() {
        let now = Utc::now();
        // User status outranks every tenant and subscription state.
        assert_eq!(
            evaluate_login(
                UserStatus::Suspended,
                false,
                Some(TenantStatus::Deleted),
                None,
                now
            ),
            Err(LoginDenial::UserInactive)
        );
        assert_eq!(
            evaluate_login(UserStatus::Deleted, true, None, None, now),
            Err(LoginDenial::UserInactive)
        );
    }

    #[test]
    fn test_super_admin_skips_tenant_checks() {
        let now = Utc::now();
        assert_eq!(
            evaluate_login(UserStatus::Active, true, None, None, now),
            Ok(())
        );
        assert_eq!(
            evaluate_login(
                UserStatus::Active,
                true,
                Some(TenantStatus::Suspended),
                Some(SubscriptionState {
                    status: SubscriptionStatus::Expired,
                    end_date: None
                }),
                now
            ),
            Ok(())
        );
    }

    #[test]
    fn test_tenant_states_map_to_denials() {
        let now = Utc::now();
        let cases = [
            (TenantStatus::Pending, LoginDenial::TenantPending),
            (TenantStatus::Suspended, LoginDenial::TenantSuspended),
            (TenantStatus::Deleted, LoginDenial::TenantDeleted),
        ];
        for (status, denial) in cases {
            assert_eq!(
                evaluate_login(UserStatus::Active, false, Some(status), active_sub(now), now),
                Err(denial)
            );
        }
    }

    #[test]
    fn test_missing_tenant_denied() {
        let now = Utc::now();
        assert_eq!(
            evaluate_login(UserStatus::Active, false, None, None, now),
            Err(LoginDenial::TenantNotActive)
        );
    }

    #[test]
    fn test_subscription_denials() {
        let now = Utc::now();
        assert_eq!(
            evaluate_login(
                UserStatus::Active,
                false,
                Some(TenantStatus::Active),
                Some(SubscriptionState {
                    status: SubscriptionStatus::Cancelled,
                    end_date: None
                }),
                now
            ),
            Err(LoginDenial::SubscriptionCancelled)
        );
        assert_eq!(
            evaluate_login(
                UserStatus::Active,
                false,
                Some(TenantStatus::Active),
                Some(SubscriptionState {
                    status: SubscriptionStatus::Expired,
                    end_date: Some(now + Duration::days(30))
                }),
                now
            ),
            Err(LoginDenial::SubscriptionExpired)
        );
    }

    #[test]
    fn test_lapsed_term_expires_active_subscription() {
        let now = Utc::now();
        assert_eq!(
            evaluate_login(
                UserStatus::Active,
                false,
                Some(TenantStatus::Active),
                Some(SubscriptionState {
                    status: SubscriptionStatus::Active,
                    end_date: Some(now - Duration::seconds(1))
                }),
                now
            ),
            Err(LoginDenial::SubscriptionExpired)
        );
    }

    #[test]
    fn test_open_ended_subscription_permits() {
        let now = Utc::now();
        assert_eq!(
            evaluate_login(
                UserStatus::Active,
                false,
                Some(TenantStatus::Active),
                Some(SubscriptionState {
                    status: SubscriptionStatus::Active,
                    end_date: None
                }),
                now
            ),
            Ok(())
        );
    }

    #[test]
    fn test_no_subscription_row_permits() {
        let now = Utc::now();
        assert_eq!(
            evaluate_login(
                UserStatus::Active,
                false,
                Some(TenantStatus::Active),
                None,
                now
            ),
            Ok(())
        );
    }

    #[test]
    fn test_denial_messages() {
        assert_eq!(
            LoginDenial::TenantPending.message(),
            "Tenant account is pending activation"
        );
        assert_eq!(LoginDenial::SubscriptionExpired.message(), "Subscription expired");
    }

    #[test]
    fn test_denial_converts_to_unauthorized() {
        let err: AppError = LoginDenial::TenantSuspended.into();
        match err {
            AppError::Unauthorized { message } => {
                assert_eq!(message, "Tenant account is suspended")
            }
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }
}
