//! `load_config`: turns the global command-line options, the environment and
//! the INI profile file into one [`Resolver`].
//!
//! # Precedence
//! Command-line options win over environment variables, which win over the
//! selected section of the config file. Empty values count as unset.
//!
//! # File handling
//! - `--config_file` not given: `prism.ini` in the working directory is used
//!   if it exists and silently skipped otherwise.
//! - `--config_file` given but missing: error.
//! - `--config_name` given but not in the file: error. The implicit
//!   `default` section may be absent.
//!
//! Nothing here talks to the network.

use std::path::PathBuf;

use anyhow::Result;
use prism_core::config::{
    CliOverrides, ConfigKey, EnvSource, IniSource, Resolver, DEFAULT_CONFIG_FILE,
    DEFAULT_CONFIG_NAME,
};
use tracing::debug;

use crate::cli::GlobalArgs;

impl GlobalArgs {
    /// Values given on the command line, keyed by setting.
    pub fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides::new();
        overrides
            .set(ConfigKey::BaseUrl, self.base_url.clone())
            .set(ConfigKey::TenantName, self.tenant_name.clone())
            .set(ConfigKey::ClientId, self.client_id.clone())
            .set(ConfigKey::ClientSecret, self.client_secret.clone())
            .set(ConfigKey::RefreshToken, self.refresh_token.clone())
            .set(
                ConfigKey::LogFile,
                self.log_file.as_ref().map(|p| p.display().to_string()),
            )
            .set(ConfigKey::LogLevel, self.log_level.clone());
        overrides
    }
}

/// Build the resolver for one invocation from `args` and an environment snapshot.
pub fn build_resolver(args: &GlobalArgs, env: EnvSource) -> Result<Resolver> {
    let config_file = args
        .config_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let section = args.config_name.as_deref().unwrap_or(DEFAULT_CONFIG_NAME);
    debug!(config_file = %config_file.display(), section, "Loading configuration");

    let ini = IniSource::load(
        &config_file,
        section,
        args.config_file.is_some(),
        args.config_name.is_some(),
    )?;

    Ok(Resolver::new()
        .with_source(args.overrides())
        .with_source(env)
        .with_source(ini))
}
