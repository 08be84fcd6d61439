//! Role derivation.
//!
//! The portal classifies an identity as administrator purely from its email
//! address: a mailbox name starting with `admin` is the school office.
//! There is no backend-issued claim behind this; it is a deliberately weak
//! signal kept for parity with the deployed portal and flagged in the crate
//! docs as a security gap, not a pattern to copy.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    /// Administrator iff the case-folded mailbox name (the part before the
    /// `@`) starts with `admin`. Anything malformed or missing is a member;
    /// this never fails.
    pub fn from_email(email: Option<&str>) -> Role {
        let Some(email) = email else {
            return Role::Member;
        };
        match email.split_once('@') {
            Some((mailbox, _)) if mailbox.trim().to_lowercase().starts_with("admin") => {
                Role::Admin
            }
            _ => Role::Member,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_mailbox_prefix() {
        assert_eq!(Role::from_email(Some("admin@school.example")), Role::Admin);
        assert_eq!(Role::from_email(Some("ADMIN@school.example")), Role::Admin);
        assert_eq!(
            Role::from_email(Some("administracao@school.example")),
            Role::Admin
        );
    }

    #[test]
    fn test_everyone_else_is_member() {
        assert_eq!(Role::from_email(Some("parent@gmail.com")), Role::Member);
        assert_eq!(Role::from_email(Some("sensei@admin.example")), Role::Member);
    }

    #[test]
    fn test_missing_or_malformed_email_is_member() {
        assert_eq!(Role::from_email(None), Role::Member);
        assert_eq!(Role::from_email(Some("")), Role::Member);
        assert_eq!(Role::from_email(Some("no-at-sign")), Role::Member);
        assert_eq!(Role::from_email(Some("@school.example")), Role::Member);
    }
}
