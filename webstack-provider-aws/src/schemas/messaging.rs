//! SNS, Lambda, DynamoDB and Secrets Manager schema definitions

use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub fn topic_schema() -> ResourceSchema {
    ResourceSchema::new("aws:sns:Topic")
        .with_description("An SNS topic")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("display_name", AttributeType::String))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn topic_subscription_schema() -> ResourceSchema {
    ResourceSchema::new("aws:sns:TopicSubscription")
        .with_description("Subscribes an endpoint to an SNS topic")
        .attribute(AttributeSchema::new("topic", AttributeType::String).required())
        .attribute(
            AttributeSchema::new(
                "protocol",
                AttributeType::Enum(vec![
                    "lambda".to_string(),
                    "sqs".to_string(),
                    "email".to_string(),
                    "https".to_string(),
                ]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("endpoint", AttributeType::String).required())
}

pub fn function_schema() -> ResourceSchema {
    ResourceSchema::new("aws:lambda:Function")
        .with_description("A Lambda function")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(
            AttributeSchema::new("code", AttributeType::Archive)
                .required()
                .with_description("Packaged function code"),
        )
        .attribute(AttributeSchema::new("role", AttributeType::String).required())
        .attribute(AttributeSchema::new("runtime", AttributeType::String).required())
        .attribute(AttributeSchema::new("handler", AttributeType::String).required())
        .attribute(AttributeSchema::new("timeout", types::positive_int()))
        .attribute(AttributeSchema::new("memory_size", types::positive_int()))
        .attribute(
            AttributeSchema::new("environment", AttributeType::Object)
                .with_description("{ variables: { NAME: value } }"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn permission_schema() -> ResourceSchema {
    ResourceSchema::new("aws:lambda:Permission")
        .with_description("Allows a principal to invoke a Lambda function")
        .attribute(AttributeSchema::new("action", AttributeType::String).required())
        .attribute(AttributeSchema::new("function", AttributeType::String).required())
        .attribute(AttributeSchema::new("principal", AttributeType::String).required())
        .attribute(AttributeSchema::new("source_arn", AttributeType::String))
}

pub fn table_schema() -> ResourceSchema {
    ResourceSchema::new("aws:dynamodb:Table")
        .with_description("A DynamoDB table")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "billing_mode",
                AttributeType::Enum(vec![
                    "PAY_PER_REQUEST".to_string(),
                    "PROVISIONED".to_string(),
                ]),
            ),
        )
        .attribute(AttributeSchema::new("hash_key", AttributeType::String).required())
        .attribute(AttributeSchema::new("range_key", AttributeType::String))
        .attribute(
            AttributeSchema::new("attributes", aws_types::object_list())
                .required()
                .with_description("Key attribute definitions as { name, type } blocks"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn secret_schema() -> ResourceSchema {
    ResourceSchema::new("aws:secretsmanager:Secret")
        .with_description("A Secrets Manager secret")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("name_prefix", AttributeType::String))
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("recovery_window_in_days", AttributeType::Int))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn secret_version_schema() -> ResourceSchema {
    ResourceSchema::new("aws:secretsmanager:SecretVersion")
        .with_description("The value of a Secrets Manager secret")
        .attribute(AttributeSchema::new("secret_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("secret_string", AttributeType::String).required())
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        topic_schema(),
        topic_subscription_schema(),
        function_schema(),
        permission_schema(),
        table_schema(),
        secret_schema(),
        secret_version_schema(),
    ]
}
