//! Settings - Typed deployment settings read from stack configuration
//!
//! Every key is read up front. Missing and invalid keys are collected into a
//! single `ConfigError` so that nothing is declared from a partial config.

use std::fmt;
use std::str::FromStr;

use webstack_core::config::{ConfigError, ConfigReader, StackConfig};
use webstack_core::schema::{parse_cidr, validate_ipv6_cidr};
use webstack_provider_aws::schemas::types::{availability_zone_count, validate_region};

/// Largest supported number of availability zones
pub const MAX_ZONES: usize = 6;

/// Zones used when neither azCount nor availabilityZones is set
pub const DEFAULT_ZONES: usize = 3;

/// Scale-up thresholds below this are logged as suspicious
pub const LOW_SCALE_UP_WARNING: i64 = 20;

/// Which tiers are deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub database: bool,
    pub load_balancer: bool,
    pub dns: bool,
    pub notifications: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            database: true,
            load_balancer: true,
            dns: true,
            notifications: true,
        }
    }
}

/// Outbound traffic policy shared by every security group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EgressPolicy {
    /// All protocols to 0.0.0.0/0
    Open,
    /// TCP to one CIDR block
    Restricted { cidr: String },
}

/// How the web tier is run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeMode {
    /// One instance in the first public subnet
    Instance,
    /// Launch template and auto scaling group across the public subnets
    #[default]
    AutoScaling,
}

impl FromStr for ComputeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instance" => Ok(ComputeMode::Instance),
            "autoscaling" => Ok(ComputeMode::AutoScaling),
            _ => Err("expected 'instance' or 'autoscaling'".to_string()),
        }
    }
}

impl fmt::Display for ComputeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeMode::Instance => write!(f, "instance"),
            ComputeMode::AutoScaling => write!(f, "autoscaling"),
        }
    }
}

/// Name tags of the network resources
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNames {
    pub vpc: String,
    pub internet_gateway: String,
    pub public_route_table: String,
    pub private_route_table: String,
    pub public_route: String,
    pub public_subnet: String,
    pub private_subnet: String,
    pub public_association: String,
    pub private_association: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub vpc_cidr: String,
    /// Destination of the public default route
    pub destination_cidr: String,
    pub ipv6_cidr: String,
    pub zone_count: usize,
    /// Configured zone names; looked up from the region when absent
    pub availability_zones: Option<Vec<String>>,
    pub names: NetworkNames,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecuritySettings {
    /// Ports opened on the application group when there is no load balancer
    pub ports: Vec<u16>,
    pub ssh_cidr: String,
    pub egress: EgressPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSettings {
    pub port: u16,
    pub family: String,
    pub engine: String,
    pub engine_version: Option<String>,
    pub instance_class: String,
    pub allocated_storage: i64,
    pub username: String,
    pub password: String,
    pub name: String,
    pub dialect: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalingSettings {
    pub min_size: i64,
    pub desired_capacity: i64,
    pub max_size: i64,
    pub scale_up_cpu: i64,
    pub scale_down_cpu: i64,
    pub cooldown: i64,
    pub alarm_period: i64,
    pub evaluation_periods: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeSettings {
    pub ami: String,
    pub key_name: String,
    pub instance_type: String,
    pub app_port: u16,
    pub mode: ComputeMode,
    pub scaling: ScalingSettings,
    pub root_volume_size: i64,
}

/// Values written by the bootstrap script
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSettings {
    pub env_file_path: String,
    pub app_user: String,
    pub users_csv_path: String,
    pub statsd_host: String,
    pub statsd_port: u16,
    pub logs_file_path: String,
    pub cloudwatch_agent_config_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerSettings {
    pub port: u16,
    pub health_check_path: String,
    pub health_check_interval: i64,
    pub health_check_timeout: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DnsSettings {
    pub domain_name: String,
    pub ttl: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSettings {
    pub lambda_artifact_path: String,
    pub lambda_runtime: String,
    pub lambda_handler: String,
    pub lambda_timeout: i64,
    pub gcp_project: String,
    pub gcp_bucket_name: String,
    pub gcp_bucket_location: String,
}

/// Everything the builders need, validated
#[derive(Debug, Clone, PartialEq)]
pub struct DeploySettings {
    pub project: String,
    pub region: String,
    pub features: Features,
    pub network: NetworkSettings,
    pub security: SecuritySettings,
    pub database: Option<DatabaseSettings>,
    pub compute: ComputeSettings,
    pub bootstrap: BootstrapSettings,
    pub load_balancer: Option<LoadBalancerSettings>,
    pub dns: Option<DnsSettings>,
    pub notifications: Option<NotificationSettings>,
}

impl DeploySettings {
    /// Read and validate every setting
    pub fn from_config(config: &StackConfig) -> Result<Self, ConfigError> {
        let mut r = config.reader();

        let features = Features {
            database: r.parsed_or("enableDatabase", true),
            load_balancer: r.parsed_or("enableLoadBalancer", true),
            dns: r.parsed_or("enableDns", true),
            notifications: r.parsed_or("enableNotifications", true),
        };

        let region = r.require("aws:region");
        if !region.is_empty()
            && let Err(reason) = validate_region(&region)
        {
            r.invalid("aws:region", &region, reason);
        }

        let network = read_network(&mut r, &region);
        if network.zone_count == 1 && (features.load_balancer || features.database) {
            r.invalid(
                "azCount",
                "1",
                "the load balancer and the database subnet group need at least two zones",
            );
        }
        let security = read_security(&mut r, &network, features);
        let database = features.database.then(|| read_database(&mut r));
        let compute = read_compute(&mut r);
        let bootstrap = read_bootstrap(&mut r);
        let load_balancer = features.load_balancer.then(|| read_load_balancer(&mut r));
        let dns = features.dns.then(|| read_dns(&mut r));
        let notifications = features.notifications.then(|| read_notifications(&mut r));

        if dns.is_some() && load_balancer.is_none() && compute.mode == ComputeMode::AutoScaling {
            r.invalid(
                "enableDns",
                "true",
                "a DNS record needs the load balancer or computeMode 'instance'",
            );
        }

        r.finish()?;

        if compute.scaling.scale_up_cpu < LOW_SCALE_UP_WARNING {
            log::warn!(
                "scaleUpCpuThreshold is {}%; instances will be added under almost no load",
                compute.scaling.scale_up_cpu
            );
        }

        Ok(Self {
            project: config.project().to_string(),
            region,
            features,
            network,
            security,
            database,
            compute,
            bootstrap,
            load_balancer,
            dns,
            notifications,
        })
    }

    /// Short summary for logs and the CLI
    pub fn summary(&self) -> String {
        let mut tiers = vec!["network", "security", "compute"];
        if self.database.is_some() {
            tiers.push("database");
        }
        if self.load_balancer.is_some() {
            tiers.push("load-balancer");
        }
        if self.dns.is_some() {
            tiers.push("dns");
        }
        if self.notifications.is_some() {
            tiers.push("notifications");
        }
        format!(
            "{} in {} ({} zone(s), {} mode): {}",
            self.project,
            self.region,
            self.network.zone_count,
            self.compute.mode,
            tiers.join(", ")
        )
    }
}

fn require_cidr(r: &mut ConfigReader<'_>, key: &str) -> String {
    let value = r.require(key);
    if !value.is_empty()
        && let Err(reason) = parse_cidr(&value)
    {
        r.invalid(key, &value, reason);
    }
    value
}

fn positive(r: &mut ConfigReader<'_>, key: &str, default: i64) -> i64 {
    let value = r.parsed_or(key, default);
    if value <= 0 {
        r.invalid(key, value.to_string(), "must be positive");
    }
    value
}

fn read_network(r: &mut ConfigReader<'_>, region: &str) -> NetworkSettings {
    let vpc_cidr = require_cidr(r, "vpcCidrBlock");
    let destination_cidr = require_cidr(r, "destinationCidrBlock");
    let ipv6_cidr = r.require("ipv6CIDR");
    if !ipv6_cidr.is_empty()
        && let Err(reason) = validate_ipv6_cidr(&ipv6_cidr)
    {
        r.invalid("ipv6CIDR", &ipv6_cidr, reason);
    }

    let availability_zones = r.list("availabilityZones");
    // Zones come from a lookup in the region unless they are listed
    let region_zones = availability_zones
        .is_none()
        .then(|| availability_zone_count(region))
        .flatten();
    let default_count = match (&availability_zones, region_zones) {
        (Some(zones), _) => zones.len().min(DEFAULT_ZONES),
        (None, Some(available)) => available.min(DEFAULT_ZONES),
        (None, None) => DEFAULT_ZONES,
    };
    let zone_count: usize = r.parsed_or("azCount", default_count);
    if zone_count == 0 || zone_count > MAX_ZONES {
        r.invalid(
            "azCount",
            zone_count.to_string(),
            format!("must be between 1 and {}", MAX_ZONES),
        );
    } else if let Some(available) = region_zones
        && zone_count > available
    {
        r.invalid(
            "azCount",
            zone_count.to_string(),
            format!("{} has only {} availability zone(s)", region, available),
        );
    }
    let availability_zones = match availability_zones {
        Some(zones) if zones.len() < zone_count => {
            r.invalid(
                "availabilityZones",
                zones.join(","),
                format!("{} zone(s) configured but azCount is {}", zones.len(), zone_count),
            );
            Some(zones)
        }
        Some(zones) => Some(zones.into_iter().take(zone_count).collect()),
        None => None,
    };

    let names = NetworkNames {
        vpc: r.require("primaryVPCName"),
        internet_gateway: r.require("primaryIGWName"),
        public_route_table: r.require("primaryPbRTAName"),
        private_route_table: r.require("primaryPRTName"),
        public_route: r.require("primaryPublicRoute"),
        public_subnet: r.require("publicSubnetName"),
        private_subnet: r.require("privateSubnetName"),
        public_association: r.require("publicRTAName"),
        private_association: r.require("privateRTAName"),
    };

    NetworkSettings {
        vpc_cidr,
        destination_cidr,
        ipv6_cidr,
        zone_count,
        availability_zones,
        names,
    }
}

fn read_security(
    r: &mut ConfigReader<'_>,
    network: &NetworkSettings,
    features: Features,
) -> SecuritySettings {
    let ports = if features.load_balancer {
        r.parsed_list::<u16>("ports").unwrap_or_default()
    } else {
        match r.parsed_list::<u16>("ports") {
            Some(ports) if !ports.is_empty() => ports,
            Some(_) => {
                r.invalid("ports", "", "at least one port is required");
                Vec::new()
            }
            None => {
                r.missing("ports");
                Vec::new()
            }
        }
    };
    if ports.contains(&0) {
        r.invalid("ports", "0", "port 0 is not a valid service port");
    }
    let mut seen = Vec::with_capacity(ports.len());
    for &port in &ports {
        if seen.contains(&port) {
            r.invalid("ports", port.to_string(), "port is listed more than once");
        } else {
            seen.push(port);
        }
    }

    let ssh_cidr = r
        .get("sshCidr")
        .unwrap_or_else(|| network.destination_cidr.clone());
    if let Err(reason) = parse_cidr(&ssh_cidr)
        && !ssh_cidr.is_empty()
    {
        r.invalid("sshCidr", &ssh_cidr, reason);
    }

    let egress = match r.get_or("egressPolicy", "open").as_str() {
        "open" => EgressPolicy::Open,
        "restricted" => {
            let cidr = r
                .get("egressCidr")
                .unwrap_or_else(|| network.destination_cidr.clone());
            if let Err(reason) = parse_cidr(&cidr)
                && !cidr.is_empty()
            {
                r.invalid("egressCidr", &cidr, reason);
            }
            EgressPolicy::Restricted { cidr }
        }
        other => {
            r.invalid("egressPolicy", other, "expected 'open' or 'restricted'");
            EgressPolicy::Open
        }
    };

    SecuritySettings {
        ports,
        ssh_cidr,
        egress,
    }
}

fn read_database(r: &mut ConfigReader<'_>) -> DatabaseSettings {
    let engine = r.require("dbEngine");
    let dialect = r.get("dbDialect").unwrap_or_else(|| engine.clone());
    DatabaseSettings {
        port: r.require_parsed("dbPort"),
        family: r.require("dbFamily"),
        engine_version: r.get("dbEngineVersion"),
        instance_class: r.get_or("dbInstanceClass", "db.t3.micro"),
        allocated_storage: positive(r, "dbAllocatedStorage", 20),
        username: r.require("dbUsername"),
        password: r.require("dbPassword"),
        name: r.require("dbName"),
        engine,
        dialect,
    }
}

fn read_compute(r: &mut ConfigReader<'_>) -> ComputeSettings {
    let scaling = ScalingSettings {
        min_size: r.parsed_or("asgMinSize", 1),
        desired_capacity: r.parsed_or("asgDesiredCapacity", 1),
        max_size: r.parsed_or("asgMaxSize", 3),
        scale_up_cpu: r.parsed_or("scaleUpCpuThreshold", 5),
        scale_down_cpu: r.parsed_or("scaleDownCpuThreshold", 3),
        cooldown: positive(r, "scalingCooldown", 60),
        alarm_period: positive(r, "alarmPeriod", 60),
        evaluation_periods: positive(r, "alarmEvaluationPeriods", 1),
    };
    if scaling.min_size < 0 {
        r.invalid("asgMinSize", scaling.min_size.to_string(), "must not be negative");
    }
    if scaling.min_size > scaling.desired_capacity || scaling.desired_capacity > scaling.max_size {
        r.invalid(
            "asgDesiredCapacity",
            scaling.desired_capacity.to_string(),
            format!(
                "must satisfy asgMinSize ({}) <= asgDesiredCapacity <= asgMaxSize ({})",
                scaling.min_size, scaling.max_size
            ),
        );
    }
    for (key, value) in [
        ("scaleUpCpuThreshold", scaling.scale_up_cpu),
        ("scaleDownCpuThreshold", scaling.scale_down_cpu),
    ] {
        if !(0..=100).contains(&value) {
            r.invalid(key, value.to_string(), "must be a percentage between 0 and 100");
        }
    }
    if scaling.scale_down_cpu >= scaling.scale_up_cpu {
        r.invalid(
            "scaleDownCpuThreshold",
            scaling.scale_down_cpu.to_string(),
            format!(
                "must be below scaleUpCpuThreshold ({})",
                scaling.scale_up_cpu
            ),
        );
    }

    ComputeSettings {
        ami: r.require("ami-ID"),
        key_name: r.require("key-name"),
        instance_type: r.require("instance-type"),
        app_port: r.require_parsed("appPort"),
        mode: r.parsed_or("computeMode", ComputeMode::default()),
        scaling,
        root_volume_size: positive(r, "rootVolumeSize", 25),
    }
}

fn read_bootstrap(r: &mut ConfigReader<'_>) -> BootstrapSettings {
    BootstrapSettings {
        env_file_path: r.get_or("envFilePath", "/opt/webapp/.env"),
        app_user: r.get_or("appUser", "webapp"),
        users_csv_path: r.get_or("usersCsvPath", "/opt/webapp/users.csv"),
        statsd_host: r.get_or("statsdHost", "localhost"),
        statsd_port: r.parsed_or("statsdPort", 8125),
        logs_file_path: r.get_or("logsFilePath", "/var/log/webapp/webapp.log"),
        cloudwatch_agent_config_path: r.require("cloudwatchAgentConfigPath"),
    }
}

fn read_load_balancer(r: &mut ConfigReader<'_>) -> LoadBalancerSettings {
    let settings = LoadBalancerSettings {
        port: r.parsed_or("lbPort", 80),
        health_check_path: r.get_or("healthCheckPath", "/healthz"),
        health_check_interval: positive(r, "healthCheckInterval", 30),
        health_check_timeout: positive(r, "healthCheckTimeout", 5),
    };
    if !settings.health_check_path.starts_with('/') {
        r.invalid(
            "healthCheckPath",
            &settings.health_check_path,
            "must start with '/'",
        );
    }
    if settings.health_check_timeout >= settings.health_check_interval {
        r.invalid(
            "healthCheckTimeout",
            settings.health_check_timeout.to_string(),
            format!(
                "must be below healthCheckInterval ({})",
                settings.health_check_interval
            ),
        );
    }
    settings
}

fn read_dns(r: &mut ConfigReader<'_>) -> DnsSettings {
    DnsSettings {
        domain_name: r.require("domainName").trim_end_matches('.').to_string(),
        ttl: positive(r, "dnsTtl", 60),
    }
}

fn read_notifications(r: &mut ConfigReader<'_>) -> NotificationSettings {
    NotificationSettings {
        lambda_artifact_path: r.require("lambdaArtifactPath"),
        lambda_runtime: r.get_or("lambdaRuntime", "nodejs18.x"),
        lambda_handler: r.get_or("lambdaHandler", "index.handler"),
        lambda_timeout: positive(r, "lambdaTimeout", 60),
        gcp_project: r.require("gcpProject"),
        gcp_bucket_name: r.require("gcpBucketName"),
        gcp_bucket_location: r.get_or("gcpBucketLocation", "US"),
    }
}
