//! AWS resource schema definitions

pub mod compute;
pub mod database;
pub mod edge;
pub mod iam;
pub mod messaging;
pub mod network;
pub mod security;
pub mod types;

use webstack_core::schema::ResourceSchema;

/// Returns all AWS schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(network::schemas());
    schemas.extend(security::schemas());
    schemas.extend(database::schemas());
    schemas.extend(iam::schemas());
    schemas.extend(compute::schemas());
    schemas.extend(edge::schemas());
    schemas.extend(messaging::schemas());
    schemas
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn type_tokens_are_unique_and_namespaced() {
        let schemas = all_schemas();
        let tokens: HashSet<_> = schemas.iter().map(|s| s.resource_type.as_str()).collect();
        assert_eq!(tokens.len(), schemas.len());
        assert!(tokens.iter().all(|t| t.starts_with("aws:")));
    }

    #[test]
    fn every_attribute_has_a_snake_case_name() {
        for schema in all_schemas() {
            for name in schema.attributes.keys() {
                assert!(
                    name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
                    "{}.{} is not snake_case",
                    schema.resource_type,
                    name
                );
            }
        }
    }
}
