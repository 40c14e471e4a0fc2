//! API-key authentication.
//!
//! Callers present an opaque key in `x-api-key`; the middleware resolves
//! it to a caller id and role and attaches the context to the request.
//! Role-to-operation enforcement happens per handler.

use axum::extract::{Request, State};
use axum::http::header::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use coldspec_core::UserRole;

use crate::error::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Resolved caller identity carried through request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub caller_id: String,
    pub role: UserRole,
}

impl AuthContext {
    /// Role checks: admin covers everything, product managers cover
    /// sales-engineer operations.
    pub fn require(&self, minimum: UserRole) -> Result<(), ApiError> {
        let allowed = match minimum {
            UserRole::Customer => true,
            UserRole::SalesEngineer => !matches!(self.role, UserRole::Customer),
            UserRole::ProductManager => {
                matches!(self.role, UserRole::ProductManager | UserRole::Admin)
            }
            UserRole::Admin => matches!(self.role, UserRole::Admin),
        };
        if allowed {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "operation requires the {} role",
                minimum.as_str()
            )))
        }
    }
}

/// Caller ids derive from the key without echoing the secret back: the
/// first eight characters are enough to correlate audit entries.
fn caller_id_for(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("key-{prefix}")
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::forbidden("missing API key"))?;

    let role = state
        .api_keys
        .get(key)
        .copied()
        .ok_or_else(|| ApiError::forbidden("unknown API key"))?;

    request.extensions_mut().insert(AuthContext {
        caller_id: caller_id_for(key),
        role,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_id_truncates_key() {
        assert_eq!(caller_id_for("dev-key-001"), "key-dev-key-");
        assert_eq!(caller_id_for("ab"), "key-ab");
    }

    #[test]
    fn test_role_lattice() {
        let admin = AuthContext {
            caller_id: "key-a".into(),
            role: UserRole::Admin,
        };
        assert!(admin.require(UserRole::Admin).is_ok());
        assert!(admin.require(UserRole::Customer).is_ok());

        let customer = AuthContext {
            caller_id: "key-c".into(),
            role: UserRole::Customer,
        };
        assert!(customer.require(UserRole::Customer).is_ok());
        assert!(customer.require(UserRole::SalesEngineer).is_err());
        assert!(customer.require(UserRole::Admin).is_err());

        let pm = AuthContext {
            caller_id: "key-p".into(),
            role: UserRole::ProductManager,
        };
        assert!(pm.require(UserRole::ProductManager).is_ok());
        assert!(pm.require(UserRole::Admin).is_err());
    }
}
