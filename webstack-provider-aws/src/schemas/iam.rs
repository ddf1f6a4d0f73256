//! IAM resource schema definitions

use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types as aws_types;

pub fn role_schema() -> ResourceSchema {
    ResourceSchema::new("aws:iam:Role")
        .with_description("An IAM role")
        .attribute(
            AttributeSchema::new("assume_role_policy", AttributeType::String)
                .required()
                .with_description("Trust policy document (JSON)"),
        )
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn role_policy_schema() -> ResourceSchema {
    ResourceSchema::new("aws:iam:RolePolicy")
        .with_description("An inline policy embedded in a role")
        .attribute(AttributeSchema::new("role", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("policy", AttributeType::String)
                .required()
                .with_description("Policy document (JSON)"),
        )
        .attribute(AttributeSchema::new("name", AttributeType::String))
}

pub fn role_policy_attachment_schema() -> ResourceSchema {
    ResourceSchema::new("aws:iam:RolePolicyAttachment")
        .with_description("Attaches a managed policy to a role")
        .attribute(AttributeSchema::new("role", AttributeType::String).required())
        .attribute(AttributeSchema::new("policy_arn", aws_types::arn()).required())
}

pub fn instance_profile_schema() -> ResourceSchema {
    ResourceSchema::new("aws:iam:InstanceProfile")
        .with_description("Instance profile passing a role to EC2 instances")
        .attribute(AttributeSchema::new("role", AttributeType::String).required())
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        role_schema(),
        role_policy_schema(),
        role_policy_attachment_schema(),
        instance_profile_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use webstack_core::resource::Value;

    #[test]
    fn attachment_requires_valid_arn() {
        let mut attrs = HashMap::new();
        attrs.insert("role".to_string(), Value::reference("role", "name"));
        attrs.insert(
            "policy_arn".to_string(),
            Value::string("arn:aws:iam::aws:policy/CloudWatchAgentServerPolicy"),
        );
        assert!(role_policy_attachment_schema().validate(&attrs).is_ok());

        attrs.insert("policy_arn".to_string(), Value::string("CloudWatchAgentServerPolicy"));
        assert!(role_policy_attachment_schema().validate(&attrs).is_err());
    }
}
