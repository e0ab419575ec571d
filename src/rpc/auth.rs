//! Authorization guard evaluated before any handler runs.

use serde::Serialize;

use super::error::ProcedureError;
use crate::db::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    Public,
    Authenticated,
    Admin,
}

pub fn allowed(level: AuthLevel, caller: Option<&User>) -> bool {
    match level {
        AuthLevel::Public => true,
        AuthLevel::Authenticated => caller.is_some(),
        AuthLevel::Admin => caller.is_some_and(User::is_admin),
    }
}

/// Anonymous callers get `Unauthorized`; signed-in callers without the
/// admin role get `Forbidden`.
pub fn authorize(level: AuthLevel, caller: Option<&User>) -> Result<(), ProcedureError> {
    if allowed(level, caller) {
        return Ok(());
    }
    match caller {
        None => Err(ProcedureError::Unauthorized),
        Some(_) => Err(ProcedureError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            open_id: "oid".to_string(),
            name: None,
            email: None,
            login_method: None,
            role,
            created_at: now,
            updated_at: now,
            last_signed_in: now,
        }
    }

    #[test]
    fn test_allowed_matrix() {
        let member = user(Role::User);
        let admin = user(Role::Admin);

        assert!(allowed(AuthLevel::Public, None));
        assert!(!allowed(AuthLevel::Authenticated, None));
        assert!(allowed(AuthLevel::Authenticated, Some(&member)));
        assert!(!allowed(AuthLevel::Admin, None));
        assert!(!allowed(AuthLevel::Admin, Some(&member)));
        assert!(allowed(AuthLevel::Admin, Some(&admin)));
    }

    #[test]
    fn test_authorize_error_kinds() {
        let member = user(Role::User);
        assert_eq!(
            authorize(AuthLevel::Admin, None),
            Err(ProcedureError::Unauthorized)
        );
        assert_eq!(
            authorize(AuthLevel::Admin, Some(&member)),
            Err(ProcedureError::Forbidden)
        );
        assert_eq!(
            authorize(AuthLevel::Authenticated, None),
            Err(ProcedureError::Unauthorized)
        );
        assert!(authorize(AuthLevel::Authenticated, Some(&member)).is_ok());
    }
}
