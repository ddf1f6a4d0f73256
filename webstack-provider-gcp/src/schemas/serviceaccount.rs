//! Service account schema definitions

use std::sync::LazyLock;

use regex::Regex;
use webstack_core::resource::Value;
use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

static ACCOUNT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])$").expect("account id pattern is valid")
});

/// Service account ID: 6-30 characters, lowercase letters, digits and hyphens
pub fn account_id() -> AttributeType {
    AttributeType::Custom {
        name: "ServiceAccountId".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                if (6..=30).contains(&s.len()) && ACCOUNT_ID.is_match(s) {
                    Ok(())
                } else {
                    Err(format!(
                        "Invalid service account id '{}': expected 6-30 lowercase letters, digits or hyphens",
                        s
                    ))
                }
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

pub fn account_schema() -> ResourceSchema {
    ResourceSchema::new("gcp:serviceaccount:Account")
        .with_description("A Google Cloud service account")
        .attribute(
            AttributeSchema::new("account_id", account_id())
                .required()
                .with_description("The account id used to generate the account email"),
        )
        .attribute(AttributeSchema::new("display_name", AttributeType::String))
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("project", AttributeType::String))
}

pub fn key_schema() -> ResourceSchema {
    ResourceSchema::new("gcp:serviceaccount:Key")
        .with_description("A key of a service account; `privateKey` is base64-encoded JSON")
        .attribute(
            AttributeSchema::new("service_account_id", AttributeType::String)
                .required()
                .with_description("The service account the key belongs to"),
        )
        .attribute(
            AttributeSchema::new(
                "private_key_type",
                AttributeType::Enum(vec![
                    "TYPE_GOOGLE_CREDENTIALS_FILE".to_string(),
                    "TYPE_PKCS12_FILE".to_string(),
                ]),
            ),
        )
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![account_schema(), key_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_rules() {
        let t = account_id();
        assert!(t.validate(&Value::string("submissions-lambda")).is_ok());
        assert!(t.validate(&Value::string("short")).is_err());
        assert!(t.validate(&Value::string("Upper-case-id")).is_err());
        assert!(t.validate(&Value::string("ends-with-hyphen-")).is_err());
        assert!(
            t.validate(&Value::string("a-very-long-service-account-identifier"))
                .is_err()
        );
    }
}
