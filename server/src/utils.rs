use axum::http::HeaderMap;
use dojo::accounts::Identity;
use dojo::model::StudentKey;
use dojo::roles::Role;

use crate::{error::AppError, state::AppState};

pub const IDENTITY_UID_HEADER: &str = "x-identity-uid";
pub const IDENTITY_EMAIL_HEADER: &str = "x-identity-email";

/// The frontend forwards the signed-in user as plain headers. They are
/// trusted as-is; see the root docs crate for why this is a flagged gap.
pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, AppError> {
    let uid = headers
        .get(IDENTITY_UID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthenticated)?;

    let email = headers
        .get(IDENTITY_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .filter(|v| !v.trim().is_empty());

    Ok(Identity::new(uid, email))
}

pub fn require_admin(headers: &HeaderMap) -> Result<Identity, AppError> {
    let identity = identity_from_headers(headers)?;

    if !Role::from_email(identity.email.as_deref()).is_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(identity)
}

pub fn require_known_student(state: &AppState, key: &StudentKey) -> Result<(), AppError> {
    if state.store.has_student(key) {
        Ok(())
    } else {
        Err(AppError::UnknownStudent)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(uid: Option<&str>, email: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(uid) = uid {
            map.insert(IDENTITY_UID_HEADER, HeaderValue::from_str(uid).unwrap());
        }
        if let Some(email) = email {
            map.insert(IDENTITY_EMAIL_HEADER, HeaderValue::from_str(email).unwrap());
        }
        map
    }

    #[test]
    fn test_identity_requires_uid() {
        assert!(identity_from_headers(&headers(None, Some("a@b.c"))).is_err());
        assert!(identity_from_headers(&headers(Some("  "), None)).is_err());

        let identity = identity_from_headers(&headers(Some("uid-1"), None)).unwrap();
        assert_eq!(identity.uid, "uid-1");
        assert_eq!(identity.email, None);
    }

    #[test]
    fn test_admin_gate() {
        assert!(require_admin(&headers(Some("uid-1"), Some("admin@school.example"))).is_ok());
        assert!(require_admin(&headers(Some("uid-1"), Some("parent@gmail.com"))).is_err());
        assert!(require_admin(&headers(Some("uid-1"), None)).is_err());
    }
}
