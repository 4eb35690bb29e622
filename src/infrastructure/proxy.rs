//! Rotating proxy gateway pool
//!
//! The gateway exposes a range of equivalent ports; each attempt picks one at
//! random to spread load across the pool.

use std::ops::RangeInclusive;
use url::Url;

use crate::infrastructure::config::ProxyConfig;

#[derive(Debug, Clone)]
pub struct ProxyPool {
    scheme: String,
    host: String,
    ports: RangeInclusive<u16>,
    username: Option<String>,
    password: Option<String>,
}

impl ProxyPool {
    /// `None` when proxying is disabled
    pub fn from_config(config: &ProxyConfig) -> Option<Self> {
        if !config.enabled || config.host.trim().is_empty() {
            return None;
        }
        Some(Self {
            scheme: config.scheme.clone(),
            host: config.host.trim().to_string(),
            ports: config.port_min..=config.port_max,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.ports.clone()
    }

    pub fn pick_port(&self) -> u16 {
        fastrand::u16(self.ports.clone())
    }

    /// Gateway URL for one port, without credentials
    pub fn endpoint(&self, port: u16) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}:{}", self.scheme, self.host, port))
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            (Some(user), None) => Some((user.as_str(), "")),
            _ => None,
        }
    }
}
