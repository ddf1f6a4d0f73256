//! Webstack Deploy
//!
//! Declares a three-tier web application stack: network, security groups,
//! database, web tier, load balancer, DNS record and the submission
//! notification pipeline. Builders run in dependency order so that every
//! reference points at an already declared resource.

pub mod addressing;
pub mod bootstrap;
pub mod compute;
pub mod database;
pub mod edge;
pub mod network;
pub mod notification;
pub mod outputs;
pub mod security;
pub mod settings;

use webstack_core::config::ConfigError;
use webstack_core::schema::SchemaRegistry;
use webstack_core::stack::{Stack, StackError};

use crate::addressing::AddressingError;
use crate::bootstrap::{BootstrapError, BootstrapScript};
use crate::compute::WebTierInputs;
use crate::edge::RecordTarget;
use crate::settings::DeploySettings;

/// Error type for building a deployment
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error(transparent)]
    Addressing(#[from] AddressingError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

/// Every resource schema a deployment may use
pub fn schemas() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.extend(webstack_provider_aws::all_schemas());
    registry.extend(webstack_provider_gcp::all_schemas());
    registry
}

/// A declared and validated deployment
#[derive(Debug, Clone)]
pub struct Deployment {
    pub stack: Stack,
    pub bootstrap: BootstrapScript,
}

/// Declare every enabled tier and validate the result
pub fn build(settings: &DeploySettings, stack_name: &str) -> Result<Deployment, DeployError> {
    log::info!("building {}", settings.summary());
    let mut stack = Stack::new(settings.project.as_str(), stack_name);

    let network = network::build(&mut stack, &settings.network)?;
    let groups = security::build(&mut stack, settings, &network.vpc)?;

    let database = match (&settings.database, &groups.database) {
        (Some(db), Some(group)) => Some(database::build(
            &mut stack,
            db,
            &network.private_subnets,
            group,
        )?),
        _ => None,
    };

    let topic = match settings.notifications {
        Some(_) => Some(notification::build_topic(&mut stack)?),
        None => None,
    };

    let load_balancer = match (&settings.load_balancer, &groups.load_balancer) {
        (Some(lb), Some(group)) => Some(edge::build_load_balancer(
            &mut stack,
            lb,
            settings.compute.app_port,
            &network.vpc,
            &network.public_subnets,
            group,
        )?),
        _ => None,
    };

    let bootstrap = BootstrapScript::for_deployment(
        settings,
        database.as_ref().map(|d| &d.instance),
        topic.as_ref(),
    )?;

    let compute = compute::build(
        &mut stack,
        &settings.compute,
        WebTierInputs {
            network: &network,
            security_group: &groups.application,
            user_data: bootstrap.user_data(),
            topic: topic.as_ref(),
            target_group: load_balancer.as_ref().map(|lb| &lb.target_group),
        },
    )?;

    if let (Some(lb), Some(instance)) = (&load_balancer, compute.web.instance()) {
        edge::attach_instance(&mut stack, lb, instance, settings.compute.app_port)?;
    }

    let dns = match &settings.dns {
        Some(dns) => {
            let target = match (&load_balancer, compute.web.instance()) {
                (Some(lb), _) => Some(RecordTarget::LoadBalancer(lb)),
                (None, Some(instance)) => Some(RecordTarget::Instance(instance)),
                (None, None) => None,
            };
            match target {
                Some(target) => Some(edge::build_dns(&mut stack, dns, target)?),
                None => {
                    log::warn!("no target for {}; skipping DNS record", dns.domain_name);
                    None
                }
            }
        }
        None => None,
    };

    let pipeline = match (&settings.notifications, &topic) {
        (Some(n), Some(topic)) => Some(notification::build(
            &mut stack,
            &settings.project,
            n,
            topic,
        )?),
        _ => None,
    };

    outputs::export(
        &mut stack,
        &outputs::Tiers {
            network: &network,
            compute: &compute,
            database: database.as_ref(),
            load_balancer: load_balancer.as_ref(),
            dns: dns.as_ref(),
            topic: topic.as_ref(),
            pipeline: pipeline.as_ref(),
        },
        settings.dns.as_ref().map(|d| d.domain_name.as_str()),
    )?;

    stack.validate(&schemas())?;
    log::info!(
        "declared {} resource(s) and {} output(s)",
        stack.len(),
        stack.outputs().len()
    );

    Ok(Deployment { stack, bootstrap })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::tests::full_config;
    use std::collections::HashSet;
    use webstack_core::config::StackConfig;
    use webstack_core::render::{RenderOptions, render};
    use webstack_core::resource::Value;

    fn deploy(config: StackConfig) -> Deployment {
        let settings = DeploySettings::from_config(&config).unwrap();
        build(&settings, "dev").unwrap()
    }

    fn output_names(stack: &Stack) -> Vec<&str> {
        stack.outputs().iter().map(|o| o.name.as_str()).collect()
    }

    #[test]
    fn full_stack_validates() {
        let deployment = deploy(full_config());
        assert!(deployment.stack.validate(&schemas()).is_ok());
        assert_eq!(deployment.stack.project(), "webapp");
        assert_eq!(deployment.stack.name(), "dev");
    }

    #[test]
    fn references_only_point_backwards() {
        let deployment = deploy(full_config());
        let mut declared = HashSet::new();
        for resource in deployment.stack.resources() {
            for target in resource.dependencies() {
                assert!(
                    declared.contains(&target),
                    "{} depends on later {}",
                    resource.id,
                    target
                );
            }
            declared.insert(resource.binding().to_string());
        }
        assert!(!deployment.stack.dependency_graph().has_cycle());
    }

    #[test]
    fn every_feature_combination_builds() {
        for mask in 0..16u8 {
            for mode in ["instance", "autoscaling"] {
                let flag = |bit: u8| if mask & bit != 0 { "true" } else { "false" };
                let config = full_config()
                    .with("enableDatabase", flag(1))
                    .with("enableLoadBalancer", flag(2))
                    .with("enableDns", flag(4))
                    .with("enableNotifications", flag(8))
                    .with("computeMode", mode);
                let Ok(settings) = DeploySettings::from_config(&config) else {
                    // DNS without a load balancer needs a single instance
                    assert!(mask & 4 != 0 && mask & 2 == 0 && mode == "autoscaling");
                    continue;
                };
                let deployment = build(&settings, "dev")
                    .unwrap_or_else(|e| panic!("mask {} mode {}: {}", mask, mode, e));
                let stack = &deployment.stack;
                assert_eq!(
                    stack.resources_of_type("aws:rds:Instance").count(),
                    usize::from(mask & 1 != 0)
                );
                assert_eq!(
                    stack.resources_of_type("aws:lb:LoadBalancer").count(),
                    usize::from(mask & 2 != 0)
                );
                assert_eq!(
                    stack.resources_of_type("aws:route53:Record").count(),
                    usize::from(mask & 4 != 0)
                );
                assert_eq!(
                    stack.resources_of_type("aws:lambda:Function").count(),
                    usize::from(mask & 8 != 0)
                );
            }
        }
    }

    #[test]
    fn outputs_follow_the_deployed_tiers() {
        let deployment = deploy(full_config());
        assert_eq!(
            output_names(&deployment.stack),
            vec![
                "vpcId",
                "privateSubnetIds",
                "publicSubnetIds",
                "publicRouteTableId",
                "privateRouteTableId",
                "internetGatewayId",
                "publicRouteId",
                "autoScalingGroupId",
                "autoScalingGroupName",
                "databaseHost",
                "loadBalancerDnsName",
                "domainName",
                "snsTopicArn",
                "submissionBucket",
                "submissionTable",
            ]
        );

        let deployment = deploy(
            full_config()
                .with("computeMode", "instance")
                .with("enableDatabase", "false")
                .with("enableLoadBalancer", "false")
                .with("enableNotifications", "false"),
        );
        assert_eq!(
            output_names(&deployment.stack),
            vec![
                "vpcId",
                "privateSubnetIds",
                "publicSubnetIds",
                "publicRouteTableId",
                "privateRouteTableId",
                "internetGatewayId",
                "publicRouteId",
                "instanceId",
                "instancePublicIp",
                "domainName",
            ]
        );
    }

    #[test]
    fn instance_behind_load_balancer_is_attached() {
        let deployment = deploy(full_config().with("computeMode", "instance"));
        let attachments: Vec<_> = deployment
            .stack
            .resources_of_type("aws:lb:TargetGroupAttachment")
            .collect();
        assert_eq!(attachments.len(), 1);
        assert_eq!(
            attachments[0].attributes["target_id"],
            Value::reference("web", "id")
        );
    }

    #[test]
    fn user_data_carries_database_and_topic_references() {
        let deployment = deploy(full_config());
        let template = deployment
            .stack
            .resources_of_type("aws:ec2:LaunchTemplate")
            .next()
            .unwrap();
        let targets: HashSet<String> = template.attributes["user_data"]
            .references()
            .into_iter()
            .map(|(binding, _)| binding)
            .collect();
        assert!(targets.contains("database"));
        assert!(targets.contains("submission-topic"));
    }

    #[test]
    fn rendered_document_hides_secrets_by_default() {
        let deployment = deploy(full_config());
        let document = render(&deployment.stack, &schemas(), RenderOptions::default()).unwrap();
        let yaml = document.to_yaml().unwrap();
        assert!(!yaml.contains("s3cr"));
        assert!(yaml.contains("[secret]"));

        let shown = render(
            &deployment.stack,
            &schemas(),
            RenderOptions { show_secrets: true },
        )
        .unwrap();
        assert!(shown.to_yaml().unwrap().contains("fn::secret"));
    }

    #[test]
    fn without_load_balancer_ports_become_rules() {
        let deployment = deploy(
            full_config()
                .with("computeMode", "instance")
                .with("enableLoadBalancer", "false"),
        );
        let rules: Vec<&str> = deployment
            .stack
            .resources_of_type("aws:ec2:SecurityGroupRule")
            .map(|r| r.binding())
            .filter(|name| name.starts_with("ingress-rule-") || name.starts_with("egress-rule-"))
            .collect();
        assert_eq!(rules.len(), 6);
    }
}
