//! EC2, Auto Scaling and CloudWatch schema definitions

use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub fn instance_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:Instance")
        .with_description("A single EC2 instance")
        .attribute(
            AttributeSchema::new("ami", AttributeType::String)
                .required()
                .with_description("AMI to launch"),
        )
        .attribute(AttributeSchema::new("instance_type", AttributeType::String).required())
        .attribute(AttributeSchema::new("key_name", AttributeType::String))
        .attribute(AttributeSchema::new("subnet_id", AttributeType::String))
        .attribute(AttributeSchema::new("vpc_security_group_ids", aws_types::string_list()))
        .attribute(AttributeSchema::new("associate_public_ip_address", AttributeType::Bool))
        .attribute(
            AttributeSchema::new("iam_instance_profile", AttributeType::String)
                .with_description("Instance profile name"),
        )
        .attribute(
            AttributeSchema::new("user_data_base64", AttributeType::String)
                .with_description("Base64-encoded user data"),
        )
        .attribute(
            AttributeSchema::new("root_block_device", AttributeType::Object)
                .with_description("{ volumeSize, volumeType, deleteOnTermination }"),
        )
        .attribute(AttributeSchema::new("disable_api_termination", AttributeType::Bool))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn launch_template_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:LaunchTemplate")
        .with_description("Launch template for auto scaling groups")
        .attribute(AttributeSchema::new("name_prefix", AttributeType::String))
        .attribute(AttributeSchema::new("image_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("instance_type", AttributeType::String).required())
        .attribute(AttributeSchema::new("key_name", AttributeType::String))
        .attribute(
            AttributeSchema::new("user_data", AttributeType::String)
                .with_description("Base64-encoded user data"),
        )
        .attribute(
            AttributeSchema::new("iam_instance_profile", AttributeType::Object)
                .with_description("{ name } or { arn } of the instance profile"),
        )
        .attribute(
            AttributeSchema::new("network_interfaces", aws_types::object_list())
                .with_description("{ associatePublicIpAddress, securityGroups, deleteOnTermination }"),
        )
        .attribute(
            AttributeSchema::new("block_device_mappings", aws_types::object_list())
                .with_description("{ deviceName, ebs: { volumeSize, volumeType } }"),
        )
        .attribute(AttributeSchema::new("tag_specifications", aws_types::object_list()))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn autoscaling_group_schema() -> ResourceSchema {
    ResourceSchema::new("aws:autoscaling:Group")
        .with_description("An auto scaling group")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("min_size", AttributeType::Int).required())
        .attribute(AttributeSchema::new("max_size", types::positive_int()).required())
        .attribute(AttributeSchema::new("desired_capacity", AttributeType::Int))
        .attribute(AttributeSchema::new("default_cooldown", AttributeType::Int))
        .attribute(
            AttributeSchema::new("vpc_zone_identifiers", aws_types::string_list())
                .required()
                .with_description("Subnets to launch instances in"),
        )
        .attribute(
            AttributeSchema::new("launch_template", AttributeType::Object)
                .required()
                .with_description("{ id, version }"),
        )
        .attribute(AttributeSchema::new("target_group_arns", aws_types::string_list()))
        .attribute(
            AttributeSchema::new(
                "health_check_type",
                AttributeType::Enum(vec!["EC2".to_string(), "ELB".to_string()]),
            ),
        )
        .attribute(AttributeSchema::new("health_check_grace_period", AttributeType::Int))
        .attribute(
            AttributeSchema::new("tags", aws_types::object_list())
                .with_description("{ key, value, propagateAtLaunch } blocks"),
        )
}

pub fn autoscaling_policy_schema() -> ResourceSchema {
    ResourceSchema::new("aws:autoscaling:Policy")
        .with_description("A scaling policy of an auto scaling group")
        .attribute(AttributeSchema::new("autoscaling_group_name", AttributeType::String).required())
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "policy_type",
                AttributeType::Enum(vec![
                    "SimpleScaling".to_string(),
                    "StepScaling".to_string(),
                    "TargetTrackingScaling".to_string(),
                ]),
            ),
        )
        .attribute(
            AttributeSchema::new(
                "adjustment_type",
                AttributeType::Enum(vec![
                    "ChangeInCapacity".to_string(),
                    "ExactCapacity".to_string(),
                    "PercentChangeInCapacity".to_string(),
                ]),
            ),
        )
        .attribute(AttributeSchema::new("scaling_adjustment", AttributeType::Int))
        .attribute(AttributeSchema::new("cooldown", AttributeType::Int))
}

pub fn metric_alarm_schema() -> ResourceSchema {
    ResourceSchema::new("aws:cloudwatch:MetricAlarm")
        .with_description("A CloudWatch metric alarm")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("alarm_description", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "comparison_operator",
                AttributeType::Enum(vec![
                    "GreaterThanOrEqualToThreshold".to_string(),
                    "GreaterThanThreshold".to_string(),
                    "LessThanThreshold".to_string(),
                    "LessThanOrEqualToThreshold".to_string(),
                ]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("evaluation_periods", types::positive_int()).required())
        .attribute(AttributeSchema::new("metric_name", AttributeType::String))
        .attribute(AttributeSchema::new("namespace", AttributeType::String))
        .attribute(AttributeSchema::new("period", types::positive_int()))
        .attribute(
            AttributeSchema::new(
                "statistic",
                AttributeType::Enum(vec![
                    "Average".to_string(),
                    "Maximum".to_string(),
                    "Minimum".to_string(),
                    "SampleCount".to_string(),
                    "Sum".to_string(),
                ]),
            ),
        )
        .attribute(AttributeSchema::new("threshold", AttributeType::Int))
        .attribute(AttributeSchema::new("alarm_actions", aws_types::string_list()))
        .attribute(
            AttributeSchema::new("dimensions", AttributeType::Map(Box::new(AttributeType::String)))
                .with_description("Metric dimensions, e.g. { AutoScalingGroupName }"),
        )
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        instance_schema(),
        launch_template_schema(),
        autoscaling_group_schema(),
        autoscaling_policy_schema(),
        metric_alarm_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use webstack_core::resource::Value;

    #[test]
    fn autoscaling_group_requires_launch_template_and_subnets() {
        let mut attrs = HashMap::new();
        attrs.insert("min_size".to_string(), Value::Int(1));
        attrs.insert("max_size".to_string(), Value::Int(3));
        let errors = autoscaling_group_schema().validate(&attrs).unwrap_err();
        let names: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].contains("launch_template"));
        assert!(names[1].contains("vpc_zone_identifiers"));
    }

    #[test]
    fn alarm_dimensions_are_free_form() {
        let schema = metric_alarm_schema();
        assert!(schema.attributes["dimensions"].attr_type.has_free_form_keys());
        assert!(!launch_template_schema().attributes["network_interfaces"]
            .attr_type
            .has_free_form_keys());
    }

    #[test]
    fn alarm_rejects_unknown_comparison() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "comparison_operator".to_string(),
            Value::string("AtLeast"),
        );
        attrs.insert("evaluation_periods".to_string(), Value::Int(1));
        assert!(metric_alarm_schema().validate(&attrs).is_err());
    }
}
