//! Router configuration.

use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_advertise_interval_ms() -> u64 {
    5000
}

fn default_router_dead_interval_ms() -> u64 {
    60_000
}

fn default_cost_infinity() -> u64 {
    16
}

/// A locally configured neighbor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborConfig {
    /// The neighbor's router name.
    pub name: String,
    /// Passive neighbors are only learned from their sync Interests; an
    /// active neighbor has a face we dial ourselves.
    #[serde(default)]
    pub passive: bool,
}

/// Distance-vector daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DvConfig {
    /// The network prefix all routers share, e.g. `/ndn`.
    pub network: String,
    /// This router's name, e.g. `/ndn/router1`.
    pub router: String,
    #[serde(default = "default_advertise_interval_ms")]
    pub advertise_interval_ms: u64,
    #[serde(default = "default_router_dead_interval_ms")]
    pub router_dead_interval_ms: u64,
    /// Costs at or above this sentinel mean unreachable.
    #[serde(default = "default_cost_infinity")]
    pub cost_infinity: u64,
    #[serde(default)]
    pub neighbors: Vec<NeighborConfig>,
}

impl DvConfig {
    pub fn new(network: impl Into<String>, router: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            router: router.into(),
            advertise_interval_ms: default_advertise_interval_ms(),
            router_dead_interval_ms: default_router_dead_interval_ms(),
            cost_infinity: default_cost_infinity(),
            neighbors: Vec::new(),
        }
    }

    pub fn with_neighbor(mut self, name: impl Into<String>, passive: bool) -> Self {
        self.neighbors.push(NeighborConfig {
            name: name.into(),
            passive,
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        let network = self.network_name()?;
        let router = self.router_name()?;
        if !network.is_prefix_of(&router) {
            return Err(Error::InvalidValue(format!(
                "router name {router} is outside network {network}"
            )));
        }
        if self.cost_infinity < 2 {
            return Err(Error::InvalidValue("cost infinity must be at least 2".into()));
        }
        for n in &self.neighbors {
            n.name.parse::<Name>()?;
        }
        Ok(())
    }

    pub fn network_name(&self) -> Result<Name> {
        self.network.parse()
    }

    pub fn router_name(&self) -> Result<Name> {
        self.router.parse()
    }

    /// Where this router publishes advertisements:
    /// `<router>/32=DV/32=ADV`.
    pub fn advert_data_prefix(&self, router: &Name) -> Name {
        router
            .clone()
            .append(Component::keyword("DV"))
            .append(Component::keyword("ADV"))
    }

    /// The network-scoped advertisement sync group:
    /// `<network>/32=DV/32=ADS`.
    pub fn advert_sync_prefix(&self, network: &Name) -> Name {
        network
            .clone()
            .append(Component::keyword("DV"))
            .append(Component::keyword("ADS"))
    }

    /// The localhop-scoped passive sync prefix:
    /// `/localhop/<network>/32=DV/32=ADS`.
    pub fn passive_sync_prefix(&self, network: &Name) -> Name {
        let mut name: Name = "/localhop".parse().expect("static name");
        name = name.append_name(network);
        name.append(Component::keyword("DV"))
            .append(Component::keyword("ADS"))
    }

    /// The prefix-table sync group: `<network>/32=DV/32=PFS`.
    pub fn prefix_sync_prefix(&self, network: &Name) -> Name {
        network
            .clone()
            .append(Component::keyword("DV"))
            .append(Component::keyword("PFS"))
    }

    /// Where this router publishes its prefix-table snapshot:
    /// `<router>/32=DV/32=PFX`.
    pub fn prefix_data_prefix(&self, router: &Name) -> Name {
        router
            .clone()
            .append(Component::keyword("DV"))
            .append(Component::keyword("PFX"))
    }

    pub fn advertise_interval(&self) -> Duration {
        Duration::from_millis(self.advertise_interval_ms)
    }

    pub fn router_dead_interval(&self) -> Duration {
        Duration::from_millis(self.router_dead_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_checks_network_containment() {
        assert!(DvConfig::new("/ndn", "/ndn/r1").validate().is_ok());
        assert!(DvConfig::new("/ndn", "/other/r1").validate().is_err());
    }

    #[test]
    fn derived_names() {
        let config = DvConfig::new("/ndn", "/ndn/r1");
        let network = config.network_name().unwrap();
        let router = config.router_name().unwrap();
        assert_eq!(
            config.advert_data_prefix(&router).to_string(),
            "/ndn/r1/32=DV/32=ADV"
        );
        assert_eq!(
            config.passive_sync_prefix(&network).to_string(),
            "/localhop/ndn/32=DV/32=ADS"
        );
    }
}
