//! Edge - Load balancer in front of the web tier and its DNS record

use webstack_core::resource::{Resource, Value};
use webstack_core::stack::{Binding, Stack};

use crate::DeployError;
use crate::settings::{DnsSettings, LoadBalancerSettings};

/// Logical name of the hosted-zone lookup
pub const ZONE_LOOKUP: &str = "hosted-zone";

const HEALTHY_THRESHOLD: i64 = 2;
const UNHEALTHY_THRESHOLD: i64 = 2;

/// Declared load balancer, target group and listener
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    pub load_balancer: Binding,
    pub target_group: Binding,
    pub listener: Binding,
}

impl LoadBalancer {
    pub fn dns_name(&self) -> Value {
        self.load_balancer.attr("dnsName")
    }
}

/// Where the DNS record points
#[derive(Debug, Clone, Copy)]
pub enum RecordTarget<'a> {
    LoadBalancer(&'a LoadBalancer),
    Instance(&'a Binding),
}

/// Declared hosted-zone lookup and record
#[derive(Debug, Clone)]
pub struct Dns {
    pub zone: Binding,
    pub record: Binding,
}

pub fn build_load_balancer(
    stack: &mut Stack,
    settings: &LoadBalancerSettings,
    app_port: u16,
    vpc: &Binding,
    public_subnets: &[Binding],
    security_group: &Binding,
) -> Result<LoadBalancer, DeployError> {
    let load_balancer = stack.declare(
        Resource::new("aws:lb:LoadBalancer", "web-load-balancer")
            .with_attribute("load_balancer_type", "application")
            .with_attribute("internal", false)
            .with_attribute("security_groups", Value::List(vec![security_group.id()]))
            .with_attribute(
                "subnets",
                Value::List(public_subnets.iter().map(Binding::id).collect()),
            )
            .with_attribute("enable_deletion_protection", false)
            .with_name_tag("web-load-balancer"),
    )?;

    let target_group = stack.declare(
        Resource::new("aws:lb:TargetGroup", "web-target-group")
            .with_attribute("port", i64::from(app_port))
            .with_attribute("protocol", "HTTP")
            .with_attribute("vpc_id", vpc.id())
            .with_attribute("target_type", "instance")
            .with_attribute(
                "health_check",
                Value::map([
                    ("enabled", Value::Bool(true)),
                    ("path", Value::string(settings.health_check_path.as_str())),
                    ("port", Value::string("traffic-port")),
                    ("protocol", Value::string("HTTP")),
                    ("interval", Value::Int(settings.health_check_interval)),
                    ("timeout", Value::Int(settings.health_check_timeout)),
                    ("healthy_threshold", Value::Int(HEALTHY_THRESHOLD)),
                    ("unhealthy_threshold", Value::Int(UNHEALTHY_THRESHOLD)),
                    ("matcher", Value::string("200")),
                ]),
            )
            .with_name_tag("web-target-group"),
    )?;

    let listener = stack.declare(
        Resource::new("aws:lb:Listener", "web-listener")
            .with_attribute("load_balancer_arn", load_balancer.arn())
            .with_attribute("port", i64::from(settings.port))
            .with_attribute("protocol", "HTTP")
            .with_attribute(
                "default_actions",
                Value::List(vec![Value::map([
                    ("type", Value::string("forward")),
                    ("target_group_arn", target_group.arn()),
                ])]),
            ),
    )?;

    log::info!(
        "load balancer: port {} -> {} (health check {})",
        settings.port,
        app_port,
        settings.health_check_path
    );

    Ok(LoadBalancer {
        load_balancer,
        target_group,
        listener,
    })
}

/// Register a single instance with the target group
pub fn attach_instance(
    stack: &mut Stack,
    load_balancer: &LoadBalancer,
    instance: &Binding,
    app_port: u16,
) -> Result<Binding, DeployError> {
    Ok(stack.declare(
        Resource::new("aws:lb:TargetGroupAttachment", "web-target-attachment")
            .with_attribute("target_group_arn", load_balancer.target_group.arn())
            .with_attribute("target_id", instance.id())
            .with_attribute("port", i64::from(app_port)),
    )?)
}

pub fn build_dns(
    stack: &mut Stack,
    settings: &DnsSettings,
    target: RecordTarget<'_>,
) -> Result<Dns, DeployError> {
    let zone = stack.declare(
        Resource::new("aws:route53:getZone", ZONE_LOOKUP)
            .with_attribute("name", settings.domain_name.as_str())
            .with_attribute("private_zone", false)
            .with_read_only(true),
    )?;

    let record = Resource::new("aws:route53:Record", "web-a-record")
        .with_attribute("zone_id", zone.attr("zoneId"))
        .with_attribute("name", settings.domain_name.as_str())
        .with_attribute("type", "A")
        .with_attribute("allow_overwrite", true);
    let record = match target {
        RecordTarget::LoadBalancer(lb) => record.with_attribute(
            "aliases",
            Value::List(vec![Value::map([
                ("name", lb.dns_name()),
                ("zone_id", lb.load_balancer.attr("zoneId")),
                ("evaluate_target_health", Value::Bool(true)),
            ])]),
        ),
        RecordTarget::Instance(instance) => record
            .with_attribute("ttl", settings.ttl)
            .with_attribute("records", Value::List(vec![instance.attr("publicIp")])),
    };
    let record = stack.declare(record)?;

    log::info!("dns: A record for {}", settings.domain_name);

    Ok(Dns { zone, record })
}
