//! KDL configuration parsing for Kiln.
//!
//! This crate handles parsing of:
//! - System configuration (kiln.kdl) with environment overrides for secrets
//! - Variable interpolation in build commands

pub mod error;
pub mod system;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use system::{
    BuildConfig, ClusterConfig, DatabaseConfig, HttpConfig, ServerConfig, SourceConfig,
    StorageConfig, SystemConfig, load_system_config, parse_system_config,
};
pub use variables::{BuildVariables, BuildVariablesBuilder};
