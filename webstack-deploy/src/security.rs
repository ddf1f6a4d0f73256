//! Security - Security groups and their rules
//!
//! Groups are declared before any rule so that rules naming a sibling group
//! as their source always follow it.

use webstack_core::resource::{Resource, Value};
use webstack_core::stack::{Binding, Stack};

use crate::DeployError;
use crate::settings::{DeploySettings, EgressPolicy};

const ANYWHERE: &str = "0.0.0.0/0";
const SSH_PORT: u16 = 22;

/// Declared security groups
#[derive(Debug, Clone)]
pub struct SecurityGroups {
    pub load_balancer: Option<Binding>,
    pub application: Binding,
    pub database: Option<Binding>,
    pub rules: Vec<Binding>,
}

/// Source of the traffic a rule admits (or destination, for egress)
enum Peer<'a> {
    Cidrs {
        ipv4: &'a str,
        ipv6: Option<&'a str>,
    },
    Group(&'a Binding),
}

struct Rule<'a> {
    name: String,
    direction: &'static str,
    protocol: &'static str,
    from_port: u16,
    to_port: u16,
    peer: Peer<'a>,
    description: String,
}

impl Rule<'_> {
    fn declare(self, stack: &mut Stack, group: &Binding) -> Result<Binding, DeployError> {
        let mut resource = Resource::new("aws:ec2:SecurityGroupRule", self.name)
            .with_attribute("type", self.direction)
            .with_attribute("security_group_id", group.id())
            .with_attribute("protocol", self.protocol)
            .with_attribute("from_port", i64::from(self.from_port))
            .with_attribute("to_port", i64::from(self.to_port))
            .with_attribute("description", self.description);
        resource = match self.peer {
            Peer::Cidrs { ipv4, ipv6 } => resource
                .with_attribute("cidr_blocks", Value::strings([ipv4]))
                .with_optional_attribute(
                    "ipv6_cidr_blocks",
                    ipv6.map(|cidr| Value::strings([cidr])),
                ),
            Peer::Group(source) => resource.with_attribute("source_security_group_id", source.id()),
        };
        Ok(stack.declare(resource)?)
    }
}

fn declare_group(
    stack: &mut Stack,
    name: &str,
    description: &str,
    vpc: &Binding,
) -> Result<Binding, DeployError> {
    Ok(stack.declare(
        Resource::new("aws:ec2:SecurityGroup", name)
            .with_attribute("vpc_id", vpc.id())
            .with_attribute("description", description)
            .with_name_tag(name),
    )?)
}

/// The single outbound rule every group gets under the configured policy
fn egress_rule<'a>(prefix: &str, settings: &'a DeploySettings) -> Rule<'a> {
    let peer = egress_peer(settings);
    match &settings.security.egress {
        EgressPolicy::Open => Rule {
            name: format!("{}-egress", prefix),
            direction: "egress",
            protocol: "-1",
            from_port: 0,
            to_port: 0,
            peer,
            description: "Allow all outbound traffic".to_string(),
        },
        EgressPolicy::Restricted { cidr } => Rule {
            name: format!("{}-egress", prefix),
            direction: "egress",
            protocol: "tcp",
            from_port: 0,
            to_port: 65535,
            peer,
            description: format!("Allow outbound TCP to {}", cidr),
        },
    }
}

/// Egress destination under the configured policy
fn egress_peer<'a>(settings: &'a DeploySettings) -> Peer<'a> {
    match &settings.security.egress {
        EgressPolicy::Open => Peer::Cidrs {
            ipv4: ANYWHERE,
            ipv6: Some(settings.network.ipv6_cidr.as_str()),
        },
        EgressPolicy::Restricted { cidr } => Peer::Cidrs {
            ipv4: cidr,
            ipv6: None,
        },
    }
}

pub fn build(
    stack: &mut Stack,
    settings: &DeploySettings,
    vpc: &Binding,
) -> Result<SecurityGroups, DeployError> {
    let security = &settings.security;
    let app_port = settings.compute.app_port;

    let load_balancer = match &settings.load_balancer {
        Some(_) => Some(declare_group(
            stack,
            "load-balancer-security-group",
            "Security group for the application load balancer",
            vpc,
        )?),
        None => None,
    };
    let application = declare_group(
        stack,
        "app-security-group",
        "Security group for application",
        vpc,
    )?;
    let database = match &settings.database {
        Some(_) => Some(declare_group(
            stack,
            "db-security-group",
            "Security group for the database",
            vpc,
        )?),
        None => None,
    };

    let mut rules = Vec::new();

    if let (Some(lb_group), Some(lb)) = (&load_balancer, &settings.load_balancer) {
        let mut ports = vec![80, 443];
        if !ports.contains(&lb.port) {
            ports.push(lb.port);
        }
        for port in ports {
            let rule = Rule {
                name: format!("lb-ingress-{}", port),
                direction: "ingress",
                protocol: "tcp",
                from_port: port,
                to_port: port,
                peer: Peer::Cidrs {
                    ipv4: ANYWHERE,
                    ipv6: Some(settings.network.ipv6_cidr.as_str()),
                },
                description: format!("Allow TCP ingress on port {} from anywhere", port),
            };
            rules.push(rule.declare(stack, lb_group)?);
        }
        rules.push(egress_rule("lb", settings).declare(stack, lb_group)?);

        let rule = Rule {
            name: format!("app-ingress-{}", app_port),
            direction: "ingress",
            protocol: "tcp",
            from_port: app_port,
            to_port: app_port,
            peer: Peer::Group(lb_group),
            description: format!("Allow port {} from the load balancer", app_port),
        };
        rules.push(rule.declare(stack, &application)?);
        let rule = Rule {
            name: "app-ingress-ssh".to_string(),
            direction: "ingress",
            protocol: "tcp",
            from_port: SSH_PORT,
            to_port: SSH_PORT,
            peer: Peer::Cidrs {
                ipv4: &security.ssh_cidr,
                ipv6: None,
            },
            description: format!("Allow SSH from {}", security.ssh_cidr),
        };
        rules.push(rule.declare(stack, &application)?);
        rules.push(egress_rule("app", settings).declare(stack, &application)?);
    } else {
        for &port in &security.ports {
            // SSH is admitted from sshCidr only, as with a load balancer
            let (peer, description) = if port == SSH_PORT {
                (
                    Peer::Cidrs {
                        ipv4: &security.ssh_cidr,
                        ipv6: None,
                    },
                    format!("Allow SSH from {}", security.ssh_cidr),
                )
            } else {
                (
                    Peer::Cidrs {
                        ipv4: &settings.network.destination_cidr,
                        ipv6: Some(settings.network.ipv6_cidr.as_str()),
                    },
                    format!("Allow TCP ingress on port {}", port),
                )
            };
            let rule = Rule {
                name: format!("ingress-rule-{}", port),
                direction: "ingress",
                protocol: "tcp",
                from_port: port,
                to_port: port,
                peer,
                description,
            };
            rules.push(rule.declare(stack, &application)?);

            let rule = Rule {
                name: format!("egress-rule-{}", port),
                direction: "egress",
                protocol: "tcp",
                from_port: port,
                to_port: port,
                peer: egress_peer(settings),
                description: format!("Allow TCP egress on port {}", port),
            };
            rules.push(rule.declare(stack, &application)?);
        }
    }

    if let (Some(db_group), Some(db)) = (&database, &settings.database) {
        let rule = Rule {
            name: format!("db-ingress-{}", db.port),
            direction: "ingress",
            protocol: "tcp",
            from_port: db.port,
            to_port: db.port,
            peer: Peer::Group(&application),
            description: format!("Allow port {} from the application", db.port),
        };
        rules.push(rule.declare(stack, db_group)?);
        rules.push(egress_rule("db", settings).declare(stack, db_group)?);

        // Per-port egress alone would not let the application reach the database
        if settings.load_balancer.is_none() && !security.ports.contains(&db.port) {
            let rule = Rule {
                name: format!("app-egress-db-{}", db.port),
                direction: "egress",
                protocol: "tcp",
                from_port: db.port,
                to_port: db.port,
                peer: Peer::Group(db_group),
                description: format!("Allow port {} to the database", db.port),
            };
            rules.push(rule.declare(stack, &application)?);
        }
    }

    log::info!("security: {} group rule(s)", rules.len());
    Ok(SecurityGroups {
        load_balancer,
        application,
        database,
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::tests::full_config;

    fn settings_from(config: webstack_core::config::StackConfig) -> DeploySettings {
        DeploySettings::from_config(&config).unwrap()
    }

    fn declare(settings: &DeploySettings) -> (Stack, SecurityGroups) {
        let mut stack = Stack::new("webapp", "dev");
        let vpc = stack
            .declare(Resource::new("aws:ec2:Vpc", "vpc").with_attribute("cidr_block", "10.0.0.0/16"))
            .unwrap();
        let groups = build(&mut stack, settings, &vpc).unwrap();
        (stack, groups)
    }

    fn rules_of<'a>(stack: &'a Stack, group: &Binding, direction: &str) -> Vec<&'a Resource> {
        stack
            .resources_of_type("aws:ec2:SecurityGroupRule")
            .filter(|r| {
                r.attributes["security_group_id"] == group.id()
                    && r.attributes["type"] == Value::string(direction)
            })
            .collect()
    }

    #[test]
    fn ports_without_load_balancer_give_one_rule_each_way() {
        let settings = settings_from(
            full_config()
                .with("enableLoadBalancer", "false")
                .with("enableDatabase", "false")
                .with("computeMode", "instance")
                .with("ports", "22,80,443"),
        );
        let (stack, groups) = declare(&settings);
        assert!(groups.load_balancer.is_none());
        assert_eq!(rules_of(&stack, &groups.application, "ingress").len(), 3);
        assert_eq!(rules_of(&stack, &groups.application, "egress").len(), 3);

        let rule = stack.get("ingress-rule-443").unwrap();
        assert_eq!(rule.attributes["cidr_blocks"], Value::strings(["0.0.0.0/0"]));
        assert_eq!(rule.attributes["ipv6_cidr_blocks"], Value::strings(["::/0"]));
    }

    #[test]
    fn ssh_port_without_load_balancer_uses_ssh_cidr() {
        let settings = settings_from(
            full_config()
                .with("enableLoadBalancer", "false")
                .with("computeMode", "instance")
                .with("ports", "22,80")
                .with("sshCidr", "198.51.100.0/24"),
        );
        let (stack, _) = declare(&settings);
        let ssh = stack.get("ingress-rule-22").unwrap();
        assert_eq!(ssh.attributes["cidr_blocks"], Value::strings(["198.51.100.0/24"]));
        assert!(!ssh.attributes.contains_key("ipv6_cidr_blocks"));

        let http = stack.get("ingress-rule-80").unwrap();
        assert_eq!(http.attributes["cidr_blocks"], Value::strings(["0.0.0.0/0"]));
    }

    #[test]
    fn open_egress_uses_configured_ipv6_block() {
        let settings = settings_from(full_config().with("ipv6CIDR", "2001:db8::/32"));
        let (stack, groups) = declare(&settings);
        for group in [
            groups.load_balancer.as_ref().unwrap(),
            &groups.application,
            groups.database.as_ref().unwrap(),
        ] {
            let egress = rules_of(&stack, group, "egress");
            assert_eq!(
                egress[0].attributes["ipv6_cidr_blocks"],
                Value::strings(["2001:db8::/32"])
            );
        }

        let settings = settings_from(
            full_config()
                .with("enableLoadBalancer", "false")
                .with("computeMode", "instance")
                .with("ipv6CIDR", "2001:db8::/32"),
        );
        let (stack, _) = declare(&settings);
        let rule = stack.get("egress-rule-80").unwrap();
        assert_eq!(rule.attributes["ipv6_cidr_blocks"], Value::strings(["2001:db8::/32"]));
    }

    #[test]
    fn application_accepts_app_port_only_from_load_balancer() {
        let settings = settings_from(full_config());
        let (stack, groups) = declare(&settings);
        let lb_group = groups.load_balancer.as_ref().unwrap();

        let ingress = rules_of(&stack, &groups.application, "ingress");
        assert_eq!(ingress.len(), 2);
        let app = stack.get("app-ingress-8080").unwrap();
        assert_eq!(app.attributes["source_security_group_id"], lb_group.id());
        assert!(!app.attributes.contains_key("cidr_blocks"));
        let ssh = stack.get("app-ingress-ssh").unwrap();
        assert_eq!(ssh.attributes["cidr_blocks"], Value::strings(["203.0.113.0/24"]));

        let lb_ingress = rules_of(&stack, lb_group, "ingress");
        let ports: Vec<_> = lb_ingress.iter().map(|r| r.attributes["from_port"].clone()).collect();
        assert_eq!(ports, vec![Value::Int(80), Value::Int(443)]);
    }

    #[test]
    fn database_accepts_db_port_only_from_application() {
        let settings = settings_from(full_config());
        let (stack, groups) = declare(&settings);
        let db_group = groups.database.as_ref().unwrap();
        let ingress = rules_of(&stack, db_group, "ingress");
        assert_eq!(ingress.len(), 1);
        assert_eq!(ingress[0].attributes["from_port"], Value::Int(3306));
        assert_eq!(
            ingress[0].attributes["source_security_group_id"],
            groups.application.id()
        );
    }

    #[test]
    fn rules_follow_their_groups() {
        let settings = settings_from(full_config());
        let (stack, _) = declare(&settings);
        let position = |name: &str| stack.resources().iter().position(|r| r.id.name == name).unwrap();
        assert!(position("load-balancer-security-group") < position("app-ingress-8080"));
        assert!(position("app-security-group") < position("db-ingress-3306"));
    }

    #[test]
    fn egress_policy_is_applied_consistently() {
        let settings = settings_from(full_config());
        let (stack, groups) = declare(&settings);
        for group in [
            groups.load_balancer.as_ref().unwrap(),
            &groups.application,
            groups.database.as_ref().unwrap(),
        ] {
            let egress = rules_of(&stack, group, "egress");
            assert_eq!(egress.len(), 1);
            assert_eq!(egress[0].attributes["protocol"], Value::string("-1"));
        }

        let settings = settings_from(
            full_config()
                .with("egressPolicy", "restricted")
                .with("egressCidr", "10.0.0.0/16"),
        );
        let (stack, groups) = declare(&settings);
        let egress = rules_of(&stack, &groups.application, "egress");
        assert_eq!(egress[0].attributes["protocol"], Value::string("tcp"));
        assert_eq!(egress[0].attributes["cidr_blocks"], Value::strings(["10.0.0.0/16"]));
        assert!(!egress[0].attributes.contains_key("ipv6_cidr_blocks"));
    }

    #[test]
    fn app_can_reach_database_without_load_balancer() {
        let settings = settings_from(
            full_config()
                .with("enableLoadBalancer", "false")
                .with("computeMode", "instance"),
        );
        let (stack, groups) = declare(&settings);
        let egress = rules_of(&stack, &groups.application, "egress");
        assert_eq!(egress.len(), 4);
        let db_rule = stack.get("app-egress-db-3306").unwrap();
        assert_eq!(
            db_rule.attributes["source_security_group_id"],
            groups.database.as_ref().unwrap().id()
        );
    }
}
