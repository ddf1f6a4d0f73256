//! AWS-specific type definitions

use std::sync::LazyLock;

use regex::Regex;
use webstack_core::resource::Value;
use webstack_core::schema::AttributeType;

/// Valid AWS regions
pub const VALID_REGIONS: &[&str] = &[
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-south-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ca-central-1",
    "sa-east-1",
];

/// Availability zones an account can use in each region
pub const REGION_ZONES: &[(&str, usize)] = &[
    ("ap-northeast-1", 3),
    ("ap-northeast-2", 4),
    ("ap-northeast-3", 3),
    ("ap-southeast-1", 3),
    ("ap-southeast-2", 3),
    ("ap-south-1", 3),
    ("us-east-1", 6),
    ("us-east-2", 3),
    ("us-west-1", 2),
    ("us-west-2", 4),
    ("eu-west-1", 3),
    ("eu-west-2", 3),
    ("eu-west-3", 3),
    ("eu-central-1", 3),
    ("eu-north-1", 3),
    ("ca-central-1", 3),
    ("sa-east-1", 3),
];

/// Number of availability zones in a known region
pub fn availability_zone_count(region: &str) -> Option<usize> {
    REGION_ZONES
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, count)| *count)
}

static ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-z-]*:[a-z0-9-]+:[a-z0-9-]*:(\d{12}|aws)?:.+$")
        .expect("ARN pattern is valid")
});

/// Check a region name ("us-east-1")
pub fn validate_region(s: &str) -> Result<(), String> {
    if VALID_REGIONS.contains(&s) {
        Ok(())
    } else {
        Err(format!(
            "Invalid region '{}', expected one of: {}",
            s,
            VALID_REGIONS.join(", ")
        ))
    }
}

/// AWS region type with custom validation
pub fn aws_region() -> AttributeType {
    AttributeType::Custom {
        name: "Region".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                validate_region(s)
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

/// Port number type (with validation)
pub fn port_number() -> AttributeType {
    AttributeType::Custom {
        name: "PortNumber".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| {
            if let Value::Int(n) = value {
                if *n >= 0 && *n <= 65535 {
                    Ok(())
                } else {
                    Err("Port number must be between 0 and 65535".to_string())
                }
            } else {
                Err("Expected integer".to_string())
            }
        },
    }
}

/// Protocol type for security group rules ("-1" is all traffic)
pub fn protocol() -> AttributeType {
    AttributeType::Enum(vec![
        "tcp".to_string(),
        "udp".to_string(),
        "icmp".to_string(),
        "-1".to_string(),
    ])
}

/// Amazon Resource Name
pub fn arn() -> AttributeType {
    AttributeType::Custom {
        name: "Arn".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                if ARN.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("Invalid ARN '{}'", s))
                }
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

/// Tags type for AWS resources
pub fn tags_type() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

/// List of strings (IDs, CIDRs, ARNs)
pub fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

/// List of structured blocks
pub fn object_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Object))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_accepts_aws_format() {
        let region_type = aws_region();
        assert!(region_type.validate(&Value::string("us-east-1")).is_ok());
    }

    #[test]
    fn region_rejects_availability_zone() {
        let region_type = aws_region();
        let result = region_type.validate(&Value::string("us-east-1a"));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Invalid region"));
        assert!(err.contains("ap-northeast-1"));
    }

    #[test]
    fn region_validates_all_valid_regions() {
        let region_type = aws_region();
        for region in VALID_REGIONS {
            assert!(
                region_type.validate(&Value::string(*region)).is_ok(),
                "Region {} should be valid",
                region
            );
        }
    }

    #[test]
    fn every_region_has_a_zone_count() {
        for region in VALID_REGIONS {
            let count = availability_zone_count(region);
            assert!(count.is_some_and(|n| n >= 2), "{} has no zone count", region);
        }
        assert_eq!(availability_zone_count("us-west-1"), Some(2));
        assert_eq!(availability_zone_count("us-east-1a"), None);
    }

    #[test]
    fn port_number_bounds() {
        let t = port_number();
        assert!(t.validate(&Value::Int(0)).is_ok());
        assert!(t.validate(&Value::Int(3306)).is_ok());
        assert!(t.validate(&Value::Int(65535)).is_ok());
        assert!(t.validate(&Value::Int(65536)).is_err());
        assert!(t.validate(&Value::Int(-1)).is_err());
        assert!(t.validate(&Value::string("80")).is_err());
    }

    #[test]
    fn protocol_accepts_all_traffic_marker() {
        let t = protocol();
        assert!(t.validate(&Value::string("tcp")).is_ok());
        assert!(t.validate(&Value::string("-1")).is_ok());
        assert!(t.validate(&Value::string("all")).is_err());
    }

    #[test]
    fn arn_validation() {
        let t = arn();
        assert!(
            t.validate(&Value::string(
                "arn:aws:iam::aws:policy/CloudWatchAgentServerPolicy"
            ))
            .is_ok()
        );
        assert!(
            t.validate(&Value::string(
                "arn:aws:sns:us-east-1:123456789012:submissions"
            ))
            .is_ok()
        );
        assert!(t.validate(&Value::reference("topic", "arn")).is_ok());
        assert!(t.validate(&Value::string("not-an-arn")).is_err());
    }
}
