// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed storage configuration. Parsing this from YAML/env is an external
//! concern; this crate only accepts an already-built [`StorageConfig`].

use crate::cache::CacheTtls;
use crate::monitor::MonitorConfig;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Memory,
    Relational,
    Kv,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub driver: DriverKind,
    /// Path/URI for the relational or KV driver. Unused for `Memory`.
    pub data_source: PathBuf,
    pub max_conns: u32,
    pub cache_ttls: CacheTtls,
    pub monitor: MonitorConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Memory,
            data_source: PathBuf::from(":memory:"),
            max_conns: 1,
            cache_ttls: CacheTtls::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_memory_driver() {
        let config = StorageConfig::default();
        assert_eq!(config.driver, DriverKind::Memory);
    }
}
