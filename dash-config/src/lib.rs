//! # DASH Harness Configuration
//!
//! One `HarnessConfig` replaces the per-test constants (IPs, MACs, VNIs,
//! packet counts, timing margins) that every scenario needs. It is built once
//! and passed explicitly to flow templates, the traffic runner and the
//! orchestrator.
//!
//! ## Sections
//! - `topology`: generator port names and L1 speed
//! - `addressing`: ENI and network endpoints, VTEPs, VNIs, UDP ports
//! - `traffic`: packet counts, rates and run timing
//! - `simulator`: seed and fault injection for the in-process simulator

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

mod addressing;
mod error;
mod simulator;
mod topology;
mod traffic;
mod validation;

pub use addressing::AddressingConfig;
pub use error::ConfigError;
pub use simulator::SimulatorConfig;
pub use topology::TopologyConfig;
pub use traffic::TrafficConfig;

const BASE_FILE: &str = "config/dash.yaml";
const ENV_PREFIX: &str = "DASH_";

/// Top-level configuration for a harness run.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
#[serde(default)]
pub struct HarnessConfig {
    /// Traffic generator ports facing the DPU.
    #[validate(nested)]
    pub topology: TopologyConfig,

    /// Addresses and encapsulation parameters used by scenario flows.
    #[validate(nested)]
    pub addressing: AddressingConfig,

    /// Per-flow traffic defaults and run timing.
    #[validate(nested)]
    pub traffic: TrafficConfig,

    #[validate(nested)]
    pub simulator: SimulatorConfig,
}

impl HarnessConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/dash.yaml`, if present
    /// 3. `config/<DASH_ENV>.yaml`, if `DASH_ENV` is set and the file exists
    /// 4. `DASH_*` environment variables, `__` separating sections
    ///    (`DASH_TRAFFIC__PPS=200`)
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(HarnessConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        } else {
            debug!("{} not found, using default configuration", BASE_FILE);
        }

        if let Ok(env) = std::env::var("DASH_ENV") {
            let env_file = format!("config/{}.yaml", env);
            if Path::new(&env_file).exists() {
                info!(file = %env_file, "Applying environment configuration");
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file on top of the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(HarnessConfig::default()))
                .merge(Yaml::file(path)),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
