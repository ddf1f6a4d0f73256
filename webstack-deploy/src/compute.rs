//! Compute - Instance role and the web tier
//!
//! The web tier is either one instance in the first public subnet or a launch
//! template behind an auto scaling group spanning every public subnet, scaled
//! on average CPU.

use webstack_core::resource::{Resource, Value};
use webstack_core::stack::{Binding, Stack};

use crate::DeployError;
use crate::network::Network;
use crate::settings::{ComputeMode, ComputeSettings, ScalingSettings};

/// Name tag of web tier instances
pub const INSTANCE_NAME_TAG: &str = "Cloud-WebApp-Instance";

const CLOUDWATCH_AGENT_POLICY: &str = "arn:aws:iam::aws:policy/CloudWatchAgentServerPolicy";
const ROOT_DEVICE: &str = "/dev/xvda";
const VOLUME_TYPE: &str = "gp2";

/// Declared compute tier
#[derive(Debug, Clone)]
pub struct Compute {
    pub role: Binding,
    pub agent_policy: Binding,
    pub publish_policy: Option<Binding>,
    pub instance_profile: Binding,
    pub web: WebTier,
}

#[derive(Debug, Clone)]
pub enum WebTier {
    Instance(Binding),
    AutoScaling(AutoScaling),
}

#[derive(Debug, Clone)]
pub struct AutoScaling {
    pub launch_template: Binding,
    pub group: Binding,
    pub scale_up: Binding,
    pub scale_down: Binding,
    pub high_cpu: Binding,
    pub low_cpu: Binding,
}

impl WebTier {
    pub fn instance(&self) -> Option<&Binding> {
        match self {
            WebTier::Instance(instance) => Some(instance),
            WebTier::AutoScaling(_) => None,
        }
    }

    pub fn auto_scaling(&self) -> Option<&AutoScaling> {
        match self {
            WebTier::Instance(_) => None,
            WebTier::AutoScaling(asg) => Some(asg),
        }
    }
}

/// Inputs shared by both web tier modes
pub struct WebTierInputs<'a> {
    pub network: &'a Network,
    pub security_group: &'a Binding,
    pub user_data: Value,
    pub topic: Option<&'a Binding>,
    pub target_group: Option<&'a Binding>,
}

pub fn build(
    stack: &mut Stack,
    settings: &ComputeSettings,
    inputs: WebTierInputs<'_>,
) -> Result<Compute, DeployError> {
    let role = stack.declare(
        Resource::new("aws:iam:Role", "instance-role")
            .with_attribute("assume_role_policy", assume_role_policy("ec2.amazonaws.com"))
            .with_attribute("description", "Role assumed by web tier instances")
            .with_name_tag("instance-role"),
    )?;

    let agent_policy = stack.declare(
        Resource::new("aws:iam:RolePolicyAttachment", "cloudwatch-agent-policy")
            .with_attribute("role", role.name_attr())
            .with_attribute("policy_arn", CLOUDWATCH_AGENT_POLICY),
    )?;

    let publish_policy = match inputs.topic {
        Some(topic) => {
            let policy = policy_document(vec![statement("sns:Publish", vec![topic.arn()])]);
            Some(stack.declare(
                Resource::new("aws:iam:RolePolicy", "sns-publish-policy")
                    .with_attribute("role", role.name_attr())
                    .with_attribute("policy", policy),
            )?)
        }
        None => None,
    };

    let instance_profile = stack.declare(
        Resource::new("aws:iam:InstanceProfile", "instance-profile")
            .with_attribute("role", role.name_attr()),
    )?;

    let web = match settings.mode {
        ComputeMode::Instance => {
            WebTier::Instance(declare_instance(stack, settings, &inputs, &instance_profile)?)
        }
        ComputeMode::AutoScaling => {
            WebTier::AutoScaling(declare_auto_scaling(stack, settings, &inputs, &instance_profile)?)
        }
    };

    log::info!(
        "compute: {} mode, {} on {}",
        settings.mode,
        settings.instance_type,
        settings.ami
    );

    Ok(Compute {
        role,
        agent_policy,
        publish_policy,
        instance_profile,
        web,
    })
}

/// Trust policy letting one AWS service assume a role
pub fn assume_role_policy(service: &str) -> Value {
    Value::json(Value::map([
        ("Version", Value::string("2012-10-17")),
        (
            "Statement",
            Value::List(vec![Value::map([
                ("Effect", Value::string("Allow")),
                ("Principal", Value::map([("Service", Value::string(service))])),
                ("Action", Value::string("sts:AssumeRole")),
            ])]),
        ),
    ]))
}

/// Allow statement for `actions` on `resources`
pub fn statement(action: &str, resources: Vec<Value>) -> Value {
    Value::map([
        ("Effect", Value::string("Allow")),
        ("Action", Value::string(action)),
        ("Resource", Value::List(resources)),
    ])
}

pub fn policy_document(statements: Vec<Value>) -> Value {
    Value::json(Value::map([
        ("Version", Value::string("2012-10-17")),
        ("Statement", Value::List(statements)),
    ]))
}

fn declare_instance(
    stack: &mut Stack,
    settings: &ComputeSettings,
    inputs: &WebTierInputs<'_>,
    profile: &Binding,
) -> Result<Binding, DeployError> {
    let subnet = inputs
        .network
        .public_subnets
        .first()
        .map(Binding::id)
        .ok_or(crate::addressing::AddressingError::NoZones)?;

    Ok(stack.declare(
        Resource::new("aws:ec2:Instance", "web")
            .with_attribute("ami", settings.ami.as_str())
            .with_attribute("instance_type", settings.instance_type.as_str())
            .with_attribute("key_name", settings.key_name.as_str())
            .with_attribute("subnet_id", subnet)
            .with_attribute(
                "vpc_security_group_ids",
                Value::List(vec![inputs.security_group.id()]),
            )
            .with_attribute("associate_public_ip_address", true)
            .with_attribute("iam_instance_profile", profile.name_attr())
            .with_attribute("user_data_base64", inputs.user_data.clone())
            .with_attribute(
                "root_block_device",
                Value::map([
                    ("volume_size", Value::Int(settings.root_volume_size)),
                    ("volume_type", Value::string(VOLUME_TYPE)),
                    ("delete_on_termination", Value::Bool(true)),
                ]),
            )
            .with_attribute("disable_api_termination", false)
            .with_name_tag(INSTANCE_NAME_TAG),
    )?)
}

fn declare_auto_scaling(
    stack: &mut Stack,
    settings: &ComputeSettings,
    inputs: &WebTierInputs<'_>,
    profile: &Binding,
) -> Result<AutoScaling, DeployError> {
    let launch_template = stack.declare(
        Resource::new("aws:ec2:LaunchTemplate", "web-launch-template")
            .with_attribute("name_prefix", "web-")
            .with_attribute("image_id", settings.ami.as_str())
            .with_attribute("instance_type", settings.instance_type.as_str())
            .with_attribute("key_name", settings.key_name.as_str())
            .with_attribute("user_data", inputs.user_data.clone())
            .with_attribute(
                "iam_instance_profile",
                Value::map([("name", profile.name_attr())]),
            )
            .with_attribute(
                "network_interfaces",
                Value::List(vec![Value::map([
                    ("associate_public_ip_address", Value::Bool(true)),
                    (
                        "security_groups",
                        Value::List(vec![inputs.security_group.id()]),
                    ),
                    ("delete_on_termination", Value::Bool(true)),
                ])]),
            )
            .with_attribute(
                "block_device_mappings",
                Value::List(vec![Value::map([
                    ("device_name", Value::string(ROOT_DEVICE)),
                    (
                        "ebs",
                        Value::map([
                            ("volume_size", Value::Int(settings.root_volume_size)),
                            ("volume_type", Value::string(VOLUME_TYPE)),
                            ("delete_on_termination", Value::Bool(true)),
                        ]),
                    ),
                ])]),
            )
            .with_attribute(
                "tag_specifications",
                Value::List(vec![Value::map([
                    ("resource_type", Value::string("instance")),
                    (
                        "tags",
                        Value::map([("Name", Value::string(INSTANCE_NAME_TAG))]),
                    ),
                ])]),
            )
            .with_name_tag("web-launch-template"),
    )?;

    let scaling = &settings.scaling;
    let mut group = Resource::new("aws:autoscaling:Group", "web-asg")
        .with_attribute("name", "web-asg")
        .with_attribute("min_size", scaling.min_size)
        .with_attribute("max_size", scaling.max_size)
        .with_attribute("desired_capacity", scaling.desired_capacity)
        .with_attribute("default_cooldown", scaling.cooldown)
        .with_attribute(
            "vpc_zone_identifiers",
            Value::List(inputs.network.public_subnets.iter().map(Binding::id).collect()),
        )
        .with_attribute(
            "launch_template",
            Value::map([
                ("id", launch_template.id()),
                ("version", launch_template.attr("latestVersion")),
            ]),
        )
        .with_attribute(
            "tags",
            Value::List(vec![Value::map([
                ("key", Value::string("Name")),
                ("value", Value::string(INSTANCE_NAME_TAG)),
                ("propagate_at_launch", Value::Bool(true)),
            ])]),
        );
    if let Some(target_group) = inputs.target_group {
        group = group
            .with_attribute("target_group_arns", Value::List(vec![target_group.arn()]))
            .with_attribute("health_check_type", "ELB")
            .with_attribute("health_check_grace_period", 300_i64);
    } else {
        group = group.with_attribute("health_check_type", "EC2");
    }
    let group = stack.declare(group)?;

    let scale_up = declare_policy(stack, &group, "scale-up", 1, scaling)?;
    let scale_down = declare_policy(stack, &group, "scale-down", -1, scaling)?;

    let high_cpu = declare_alarm(
        stack,
        &group,
        &scale_up,
        CpuAlarm {
            name: "cpu-high",
            comparison: "GreaterThanOrEqualToThreshold",
            threshold: scaling.scale_up_cpu,
            description: format!("Scale up when average CPU >= {}%", scaling.scale_up_cpu),
        },
        scaling,
    )?;
    let low_cpu = declare_alarm(
        stack,
        &group,
        &scale_down,
        CpuAlarm {
            name: "cpu-low",
            comparison: "LessThanOrEqualToThreshold",
            threshold: scaling.scale_down_cpu,
            description: format!("Scale down when average CPU <= {}%", scaling.scale_down_cpu),
        },
        scaling,
    )?;

    Ok(AutoScaling {
        launch_template,
        group,
        scale_up,
        scale_down,
        high_cpu,
        low_cpu,
    })
}

fn declare_policy(
    stack: &mut Stack,
    group: &Binding,
    name: &str,
    adjustment: i64,
    scaling: &ScalingSettings,
) -> Result<Binding, DeployError> {
    Ok(stack.declare(
        Resource::new("aws:autoscaling:Policy", name)
            .with_attribute("autoscaling_group_name", group.name_attr())
            .with_attribute("name", name)
            .with_attribute("policy_type", "SimpleScaling")
            .with_attribute("adjustment_type", "ChangeInCapacity")
            .with_attribute("scaling_adjustment", adjustment)
            .with_attribute("cooldown", scaling.cooldown),
    )?)
}

struct CpuAlarm {
    name: &'static str,
    comparison: &'static str,
    threshold: i64,
    description: String,
}

fn declare_alarm(
    stack: &mut Stack,
    group: &Binding,
    policy: &Binding,
    alarm: CpuAlarm,
    scaling: &ScalingSettings,
) -> Result<Binding, DeployError> {
    Ok(stack.declare(
        Resource::new("aws:cloudwatch:MetricAlarm", alarm.name)
            .with_attribute("name", alarm.name)
            .with_attribute("alarm_description", alarm.description)
            .with_attribute("comparison_operator", alarm.comparison)
            .with_attribute("evaluation_periods", scaling.evaluation_periods)
            .with_attribute("metric_name", "CPUUtilization")
            .with_attribute("namespace", "AWS/EC2")
            .with_attribute("period", scaling.alarm_period)
            .with_attribute("statistic", "Average")
            .with_attribute("threshold", alarm.threshold)
            .with_attribute("alarm_actions", Value::List(vec![policy.arn()]))
            .with_attribute(
                "dimensions",
                Value::map([("AutoScalingGroupName", group.name_attr())]),
            ),
    )?)
}
