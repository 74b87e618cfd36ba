use fmauth_cognito::UserAttributes;
use fmauth_filemaker::LegacyUser;

/// A fully signed-in user: identity-provider attributes merged with the
/// legacy record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Legacy account identifier.
    pub id: String,
    /// Legacy record id.
    pub record_id: String,
    /// Identity-provider subject.
    pub subject: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company_id: String,
    pub user_type: String,
    pub username: String,
    pub store_name: String,
    pub customer_id: String,
    pub location_status: String,
}

impl User {
    /// The email comes from the identity provider; names prefer the legacy
    /// record and fall back to the token claims.
    pub fn merge(attributes: UserAttributes, legacy: LegacyUser) -> Self {
        let prefer = |primary: String, fallback: String| {
            if primary.is_empty() {
                fallback
            } else {
                primary
            }
        };

        Self {
            id: legacy.id,
            record_id: legacy.record_id,
            subject: attributes.record_id,
            email: prefer(attributes.email, legacy.email),
            first_name: prefer(legacy.first_name, attributes.first_name),
            last_name: prefer(legacy.last_name, attributes.last_name),
            company_id: legacy.company_id,
            user_type: legacy.user_type,
            username: legacy.username,
            store_name: attributes.store_name,
            customer_id: attributes.customer_id,
            location_status: attributes.location_status,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_prefers_identity_email_and_legacy_names() {
        let attributes = UserAttributes {
            email: "user@x.com".to_string(),
            first_name: "Token".to_string(),
            last_name: "Name".to_string(),
            location_status: "Active".to_string(),
            record_id: "sub-1".to_string(),
            ..UserAttributes::default()
        };
        let legacy = LegacyUser {
            id: "315".to_string(),
            record_id: "315".to_string(),
            first_name: "Ana".to_string(),
            last_name: String::new(),
            email: "USER@X.COM".to_string(),
            company_id: "42".to_string(),
            user_type: "Admin".to_string(),
            username: "alopez".to_string(),
        };

        let user = User::merge(attributes, legacy);
        assert_eq!(user.email, "user@x.com");
        assert_eq!(user.first_name, "Ana");
        assert_eq!(user.last_name, "Name");
        assert_eq!(user.company_id, "42");
        assert_eq!(user.subject, "sub-1");
        assert_eq!(user.display_name(), "Ana Name");
    }
}
