//! Configuration for the HTTP surface

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_address: String,
    /// Largest `k` accepted by the top-k query
    pub max_k: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:8080".to_string(), max_k: 100 }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        self.bind_address.parse().map_err(|e| format!("invalid api bind_address {:?}: {}", self.bind_address, e))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.socket_addr()?;

        if self.max_k == 0 {
            return Err("api max_k must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address_must_parse() {
        assert!(ApiConfig::default().validate().is_ok());

        let config = ApiConfig { bind_address: "localhost".to_string(), ..Default::default() };
        assert!(config.validate().is_err());
    }
}
