//! Cloud Storage schema definitions

use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

pub fn bucket_schema() -> ResourceSchema {
    ResourceSchema::new("gcp:storage:Bucket")
        .with_description("A Cloud Storage bucket")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(
            AttributeSchema::new("location", AttributeType::String)
                .required()
                .with_description("Bucket location (e.g., US, EU, us-central1)"),
        )
        .attribute(AttributeSchema::new("project", AttributeType::String))
        .attribute(AttributeSchema::new("force_destroy", AttributeType::Bool))
        .attribute(AttributeSchema::new("uniform_bucket_level_access", AttributeType::Bool))
        .attribute(
            AttributeSchema::new("labels", AttributeType::Map(Box::new(AttributeType::String)))
                .with_description("Key/value labels"),
        )
}

pub fn bucket_iam_member_schema() -> ResourceSchema {
    ResourceSchema::new("gcp:storage:BucketIAMMember")
        .with_description("Grants a role on a bucket to one member")
        .attribute(AttributeSchema::new("bucket", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("role", AttributeType::String)
                .required()
                .with_description("Role to grant, e.g. roles/storage.objectAdmin"),
        )
        .attribute(
            AttributeSchema::new("member", AttributeType::String)
                .required()
                .with_description("Member, e.g. serviceAccount:<email>"),
        )
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![bucket_schema(), bucket_iam_member_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use webstack_core::resource::Value;

    #[test]
    fn iam_member_accepts_interpolated_member() {
        let mut attrs = HashMap::new();
        attrs.insert("bucket".to_string(), Value::reference("submissions", "name"));
        attrs.insert("role".to_string(), Value::string("roles/storage.objectAdmin"));
        attrs.insert(
            "member".to_string(),
            Value::interpolate(vec![
                Value::string("serviceAccount:"),
                Value::reference("lambda-sa", "email"),
            ]),
        );
        assert!(bucket_iam_member_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn bucket_requires_location() {
        let errors = bucket_schema().validate(&HashMap::new()).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
