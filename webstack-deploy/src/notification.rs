//! Notification - Topic, function and the cross-provider submission pipeline
//!
//! Instances publish to the topic; the function subscribed to it records each
//! event in the table and stores submissions in a GCS bucket using a service
//! account key kept in Secrets Manager.

use webstack_core::resource::{Resource, Value};
use webstack_core::stack::{Binding, Stack};

use crate::DeployError;
use crate::compute::{assume_role_policy, policy_document, statement};
use crate::settings::NotificationSettings;

const BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";
const BUCKET_ROLE: &str = "roles/storage.objectAdmin";
const KEY_TYPE: &str = "TYPE_GOOGLE_CREDENTIALS_FILE";
const FUNCTION_MEMORY_MB: i64 = 128;

/// Declared pipeline behind the topic
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub table: Binding,
    pub service_account: Binding,
    pub key: Binding,
    pub bucket: Binding,
    pub bucket_member: Binding,
    pub secret: Binding,
    pub secret_version: Binding,
    pub role: Binding,
    pub basic_execution: Binding,
    pub role_policy: Binding,
    pub function: Binding,
    pub subscription: Binding,
    pub permission: Binding,
}

/// Declare the topic instances publish to
pub fn build_topic(stack: &mut Stack) -> Result<Binding, DeployError> {
    Ok(stack.declare(
        Resource::new("aws:sns:Topic", "submission-topic")
            .with_attribute("display_name", "Submissions")
            .with_name_tag("submission-topic"),
    )?)
}

/// Service account id derived from the project name.
///
/// Lowercased, non-alphanumerics folded to `-`, cut to 30 characters and
/// padded to the 6-character minimum.
pub fn service_account_id(project: &str) -> String {
    let mut id: String = format!("{}-lambda", project)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    id = id.trim_start_matches(|c: char| !c.is_ascii_lowercase()).to_string();
    id.truncate(30);
    let mut id = id.trim_end_matches('-').to_string();
    if id.len() < 6 {
        id = format!("sa-{}", id);
        while id.len() < 6 {
            id.push('0');
        }
    }
    id
}

pub fn build(
    stack: &mut Stack,
    project: &str,
    settings: &NotificationSettings,
    topic: &Binding,
) -> Result<Pipeline, DeployError> {
    let table = stack.declare(
        Resource::new("aws:dynamodb:Table", "submission-events")
            .with_attribute("billing_mode", "PAY_PER_REQUEST")
            .with_attribute("hash_key", "id")
            .with_attribute(
                "attributes",
                Value::List(vec![Value::map([
                    ("name", Value::string("id")),
                    ("type", Value::string("S")),
                ])]),
            )
            .with_name_tag("submission-events"),
    )?;

    let service_account = stack.declare(
        Resource::new("gcp:serviceaccount:Account", "submission-service-account")
            .with_attribute("account_id", service_account_id(project))
            .with_attribute("display_name", format!("{} submission uploader", project))
            .with_attribute("project", settings.gcp_project.as_str()),
    )?;

    let key = stack.declare(
        Resource::new("gcp:serviceaccount:Key", "submission-service-account-key")
            .with_attribute("service_account_id", service_account.name_attr())
            .with_attribute("private_key_type", KEY_TYPE),
    )?;

    let bucket = stack.declare(
        Resource::new("gcp:storage:Bucket", "submission-bucket")
            .with_attribute("name", settings.gcp_bucket_name.as_str())
            .with_attribute("location", settings.gcp_bucket_location.as_str())
            .with_attribute("project", settings.gcp_project.as_str())
            .with_attribute("force_destroy", true)
            .with_attribute("uniform_bucket_level_access", true),
    )?;

    let bucket_member = stack.declare(
        Resource::new("gcp:storage:BucketIAMMember", "submission-bucket-writer")
            .with_attribute("bucket", bucket.name_attr())
            .with_attribute("role", BUCKET_ROLE)
            .with_attribute(
                "member",
                Value::interpolate(vec![
                    Value::string("serviceAccount:"),
                    service_account.attr("email"),
                ]),
            ),
    )?;

    let secret = stack.declare(
        Resource::new("aws:secretsmanager:Secret", "gcp-service-account-key")
            .with_attribute("name_prefix", "gcp-service-account-key-")
            .with_attribute("description", "GCP service account key used by the submission function")
            .with_attribute("recovery_window_in_days", 0_i64)
            .with_name_tag("gcp-service-account-key"),
    )?;

    let secret_version = stack.declare(
        Resource::new("aws:secretsmanager:SecretVersion", "gcp-service-account-key-version")
            .with_attribute("secret_id", secret.id())
            .with_attribute("secret_string", Value::secret(key.attr("privateKey"))),
    )?;

    let role = stack.declare(
        Resource::new("aws:iam:Role", "submission-function-role")
            .with_attribute("assume_role_policy", assume_role_policy("lambda.amazonaws.com"))
            .with_attribute("description", "Role assumed by the submission function")
            .with_name_tag("submission-function-role"),
    )?;

    let basic_execution = stack.declare(
        Resource::new("aws:iam:RolePolicyAttachment", "submission-function-logs")
            .with_attribute("role", role.name_attr())
            .with_attribute("policy_arn", BASIC_EXECUTION_POLICY),
    )?;

    let role_policy = stack.declare(
        Resource::new("aws:iam:RolePolicy", "submission-function-policy")
            .with_attribute("role", role.name_attr())
            .with_attribute(
                "policy",
                policy_document(vec![
                    statement("dynamodb:PutItem", vec![table.arn()]),
                    statement("secretsmanager:GetSecretValue", vec![secret.arn()]),
                ]),
            ),
    )?;

    let function = stack.declare(
        Resource::new("aws:lambda:Function", "submission-function")
            .with_attribute(
                "code",
                Value::FileArchive(settings.lambda_artifact_path.clone()),
            )
            .with_attribute("role", role.arn())
            .with_attribute("runtime", settings.lambda_runtime.as_str())
            .with_attribute("handler", settings.lambda_handler.as_str())
            .with_attribute("timeout", settings.lambda_timeout)
            .with_attribute("memory_size", FUNCTION_MEMORY_MB)
            .with_attribute(
                "environment",
                Value::map([(
                    "variables",
                    Value::map([
                        ("DYNAMODB_TABLE", table.name_attr()),
                        ("GCP_BUCKET_NAME", bucket.name_attr()),
                        ("GCP_PROJECT", Value::string(settings.gcp_project.as_str())),
                        ("GCP_KEY_SECRET_ARN", secret.arn()),
                    ]),
                )]),
            )
            .with_name_tag("submission-function")
            .with_depends_on(basic_execution.name())
            .with_depends_on(role_policy.name()),
    )?;

    let subscription = stack.declare(
        Resource::new("aws:sns:TopicSubscription", "submission-subscription")
            .with_attribute("topic", topic.arn())
            .with_attribute("protocol", "lambda")
            .with_attribute("endpoint", function.arn()),
    )?;

    let permission = stack.declare(
        Resource::new("aws:lambda:Permission", "submission-invoke-permission")
            .with_attribute("action", "lambda:InvokeFunction")
            .with_attribute("function", function.name_attr())
            .with_attribute("principal", "sns.amazonaws.com")
            .with_attribute("source_arn", topic.arn()),
    )?;

    log::info!(
        "notifications: {} -> {} (gs://{})",
        topic.name(),
        function.name(),
        settings.gcp_bucket_name
    );

    Ok(Pipeline {
        table,
        service_account,
        key,
        bucket,
        bucket_member,
        secret,
        secret_version,
        role,
        basic_execution,
        role_policy,
        function,
        subscription,
        permission,
    })
}
