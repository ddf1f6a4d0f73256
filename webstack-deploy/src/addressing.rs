//! Addressing - Carve per-zone subnets out of the VPC block
//!
//! Zone `i` gets the private block `x.y.(2i).0/24` and the public block
//! `x.y.(2i+1).0/24`, where `x.y` are the first two octets of the VPC network.

use std::net::Ipv4Addr;

use webstack_core::schema::parse_cidr;

/// Error type for address partitioning
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AddressingError {
    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    #[error("Zone count must be at least 1")]
    NoZones,

    #[error("Subnet {subnet} for zone {zone} is outside the VPC block {parent}")]
    OutsideParent {
        subnet: String,
        zone: usize,
        parent: String,
    },
}

/// Private and public subnet blocks of one availability zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetPair {
    pub zone: usize,
    pub private_cidr: String,
    pub public_cidr: String,
}

/// An IPv4 block as network address and prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    network: u32,
    prefix: u8,
}

impl Block {
    fn parse(cidr: &str) -> Result<Self, AddressingError> {
        let (addr, prefix) = parse_cidr(cidr).map_err(AddressingError::InvalidCidr)?;
        Ok(Self {
            network: u32::from(addr) & mask(prefix),
            prefix,
        })
    }

    fn contains(&self, other: &Block) -> bool {
        other.prefix >= self.prefix && other.network & mask(self.prefix) == self.network
    }

    fn overlaps(&self, other: &Block) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.network), self.prefix)
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

/// Assign a private and a public /24 to each of `zones` availability zones
pub fn partition(vpc_cidr: &str, zones: usize) -> Result<Vec<SubnetPair>, AddressingError> {
    if zones == 0 {
        return Err(AddressingError::NoZones);
    }
    let parent = Block::parse(vpc_cidr)?;
    let [a, b, _, _] = Ipv4Addr::from(parent.network).octets();

    let subnet = |zone: usize, k: usize| -> Result<Block, AddressingError> {
        let third = u8::try_from(k).ok();
        let block = third.map(|c| Block {
            network: u32::from(Ipv4Addr::new(a, b, c, 0)),
            prefix: 24,
        });
        match block {
            Some(block) if parent.contains(&block) => Ok(block),
            _ => Err(AddressingError::OutsideParent {
                subnet: format!("{}.{}.{}.0/24", a, b, k),
                zone,
                parent: parent.to_string(),
            }),
        }
    };

    let mut pairs = Vec::with_capacity(zones);
    for zone in 0..zones {
        let private = subnet(zone, 2 * zone)?;
        let public = subnet(zone, 2 * zone + 1)?;
        pairs.push(SubnetPair {
            zone,
            private_cidr: private.to_string(),
            public_cidr: public.to_string(),
        });
    }
    log::debug!("partitioned {} into {} zone(s)", parent, zones);
    Ok(pairs)
}

/// Whether two CIDR blocks share any address
pub fn overlaps(a: &str, b: &str) -> Result<bool, AddressingError> {
    Ok(Block::parse(a)?.overlaps(&Block::parse(b)?))
}

/// Whether `inner` lies entirely inside `outer`
pub fn contains(outer: &str, inner: &str) -> Result<bool, AddressingError> {
    Ok(Block::parse(outer)?.contains(&Block::parse(inner)?))
}
