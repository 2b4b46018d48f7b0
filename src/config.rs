//! Store and dashboard configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration, usually deserialized from the host application's settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub dashboard: DashboardConfig,
}

/// Embedded document store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the store files.
    pub path: PathBuf,
    /// Delete the store files when the handle is dropped.
    pub temporary: bool,
    /// Page cache size in bytes.
    pub cache_capacity_bytes: u64,
    /// Background flush interval. `None` flushes only on close.
    pub flush_every_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("storefront.db"),
            temporary: false,
            cache_capacity_bytes: 64 * 1024 * 1024,
            flush_every_ms: Some(500),
        }
    }
}

impl StoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Throwaway store, removed when the last handle drops.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::default()
        }
    }

    pub(crate) fn to_sled(&self) -> sled::Config {
        let config = sled::Config::new()
            .cache_capacity(self.cache_capacity_bytes)
            .flush_every_ms(self.flush_every_ms);

        if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.path)
        }
    }
}

/// Window sizes used by the dashboard.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub revenue_days: usize,
    pub recent_orders: usize,
    pub top_products: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            revenue_days: 7,
            recent_orders: 5,
            top_products: 5,
        }
    }
}
