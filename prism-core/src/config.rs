//! Configuration resolution: CLI overrides, environment and INI profiles.
//!
//! Every setting is looked up through an ordered list of [`ConfigSource`]s and
//! the first source that has a non-empty value wins. The CLI assembles the list
//! as `[cli, env, file]`, which gives the documented precedence without any of
//! the call sites knowing about it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PrismError, Result};

/// Profile file read when no `--config_file` is given.
pub const DEFAULT_CONFIG_FILE: &str = "prism.ini";
/// Profile section read when no `--config_name` is given.
pub const DEFAULT_CONFIG_NAME: &str = "default";
/// Prism REST API version used to compose endpoint URLs.
pub const DEFAULT_API_VERSION: &str = "v3";

/// A single named setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    BaseUrl,
    TenantName,
    ClientId,
    ClientSecret,
    RefreshToken,
    LogFile,
    LogLevel,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::BaseUrl,
        ConfigKey::TenantName,
        ConfigKey::ClientId,
        ConfigKey::ClientSecret,
        ConfigKey::RefreshToken,
        ConfigKey::LogFile,
        ConfigKey::LogLevel,
    ];

    /// Name of the matching CLI option, without dashes.
    pub fn option_name(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base_url",
            ConfigKey::TenantName => "tenant_name",
            ConfigKey::ClientId => "client_id",
            ConfigKey::ClientSecret => "client_secret",
            ConfigKey::RefreshToken => "refresh_token",
            ConfigKey::LogFile => "log_file",
            ConfigKey::LogLevel => "log_level",
        }
    }

    /// Name used both as environment variable and as INI key.
    pub fn external_name(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "workday_base_url",
            ConfigKey::TenantName => "workday_tenant_name",
            ConfigKey::ClientId => "prism_client_id",
            ConfigKey::ClientSecret => "prism_client_secret",
            ConfigKey::RefreshToken => "prism_refresh_token",
            ConfigKey::LogFile => "prism_log_file",
            ConfigKey::LogLevel => "prism_log_level",
        }
    }

    pub fn is_required(self) -> bool {
        !matches!(self, ConfigKey::LogFile | ConfigKey::LogLevel)
    }
}

/// One place a setting can come from.
pub trait ConfigSource: Send + Sync {
    /// Short label used in logs, e.g. `"cli"`.
    fn label(&self) -> &str;

    /// The raw value for `key`, if this source defines it.
    fn lookup(&self, key: ConfigKey) -> Option<String>;

    /// Log where this source's values came from. Called once logging is set up.
    fn trace_loaded(&self) {}
}

/// Values given explicitly on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    values: HashMap<ConfigKey, String>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for `key` when present.
    pub fn set(&mut self, key: ConfigKey, value: Option<String>) -> &mut Self {
        if let Some(v) = value {
            self.values.insert(key, v);
        }
        self
    }
}

impl ConfigSource for CliOverrides {
    fn label(&self) -> &str {
        "cli"
    }

    fn lookup(&self, key: ConfigKey) -> Option<String> {
        self.values.get(&key).cloned()
    }
}

/// A snapshot of environment variables.
#[derive(Debug, Default, Clone)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Snapshot the current process environment.
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for EnvSource {
    fn label(&self) -> &str {
        "env"
    }

    fn lookup(&self, key: ConfigKey) -> Option<String> {
        let name = key.external_name();
        self.vars
            .get(name)
            .or_else(|| self.vars.get(&name.to_ascii_uppercase()))
            .cloned()
    }
}

/// What happened when an INI file was read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IniOutcome {
    #[default]
    NoFile,
    Loaded,
    SectionMissing,
}

/// One section of an INI profile file.
#[derive(Debug, Default, Clone)]
pub struct IniSource {
    path: PathBuf,
    section: String,
    outcome: IniOutcome,
    values: HashMap<String, String>,
}

impl IniSource {
    /// Load `section` from the INI file at `path`.
    ///
    /// `explicit` marks a path or section the user asked for by name: a missing
    /// file or section is then an error instead of an empty source. Nothing is
    /// logged here; see [`ConfigSource::trace_loaded`].
    pub fn load(path: &Path, section: &str, explicit_file: bool, explicit_section: bool) -> Result<Self> {
        if !path.is_file() {
            if explicit_file {
                return Err(PrismError::config(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            return Ok(Self::empty(path, section, IniOutcome::NoFile));
        }

        let parsed = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Ini))
            .build()
            .and_then(|c| c.try_deserialize::<HashMap<String, HashMap<String, String>>>())
            .map_err(|e| {
                PrismError::config(format!(
                    "failed to parse config file {}: {e}",
                    path.display()
                ))
            })?;

        let found = parsed
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(section));

        match found {
            Some((_, values)) => Ok(Self {
                path: path.to_path_buf(),
                section: section.to_string(),
                outcome: IniOutcome::Loaded,
                values: values
                        .into_iter()
                    .map(|(k, v)| (k.to_ascii_lowercase(), v))
                    .collect(),
            }),
            None if explicit_section => Err(PrismError::config(format!(
                "section [{section}] not found in {}",
                path.display()
            ))),
            None => Ok(Self::empty(path, section, IniOutcome::SectionMissing)),
        }
    }

    pub fn from_values<I, K, V>(section: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            section: section.to_string(),
            outcome: IniOutcome::Loaded,
            values: values
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    fn empty(path: &Path, section: &str, outcome: IniOutcome) -> Self {
        Self {
            path: path.to_path_buf(),
            section: section.to_string(),
            outcome,
            values: HashMap::new(),
        }
    }

    pub fn outcome(&self) -> IniOutcome {
        self.outcome
    }
}

impl ConfigSource for IniSource {
    fn label(&self) -> &str {
        "file"
    }

    fn lookup(&self, key: ConfigKey) -> Option<String> {
        self.values.get(key.external_name()).cloned()
    }

    fn trace_loaded(&self) {
        let config_path = self.path.display();
        match self.outcome {
            IniOutcome::NoFile => {
                debug!(config_path = %config_path, "No config file found, skipping")
            }
            IniOutcome::Loaded => info!(
                config_path = %config_path,
                section = %self.section,
                keys = self.values.len(),
                "Loaded config file section"
            ),
            IniOutcome::SectionMissing => warn!(
                config_path = %config_path,
                section = %self.section,
                "Config section not found, skipping"
            ),
        }
    }
}

/// Ordered list of sources; earlier sources take precedence.
#[derive(Default)]
pub struct Resolver {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.sources.iter().map(|s| s.label()).collect();
        f.debug_struct("Resolver").field("sources", &labels).finish()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower precedence than every source added before it.
    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Replay each source's load events, e.g. after the log subscriber is installed.
    pub fn trace_loaded(&self) {
        for source in &self.sources {
            source.trace_loaded();
        }
    }

    /// First non-empty value for `key`, scanning sources in order.
    pub fn resolve(&self, key: ConfigKey) -> Option<String> {
        self.sources.iter().find_map(|source| {
            source
                .lookup(key)
                .filter(|v| !v.trim().is_empty())
                .inspect(|_| debug!(key = key.option_name(), source = source.label(), "Resolved setting"))
        })
    }

    /// Resolve every key into [`Settings`], failing if any required key is absent.
    pub fn settings(&self) -> Result<Settings> {
        let missing: Vec<&str> = ConfigKey::ALL
            .iter()
            .filter(|k| k.is_required() && self.resolve(**k).is_none())
            .map(|k| k.option_name())
            .collect();
        if !missing.is_empty() {
            return Err(PrismError::config(format!(
                "missing required setting(s): {}",
                missing.join(", ")
            )));
        }

        let required = |key: ConfigKey| self.resolve(key).unwrap_or_default();
        let base_url = required(ConfigKey::BaseUrl);
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(PrismError::config(format!(
                "base_url must be an http(s) URL, got `{base_url}`"
            )));
        }

        Ok(Settings {
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant_name: required(ConfigKey::TenantName),
            client_id: required(ConfigKey::ClientId),
            client_secret: required(ConfigKey::ClientSecret),
            refresh_token: required(ConfigKey::RefreshToken),
            log_file: self.resolve(ConfigKey::LogFile).map(PathBuf::from),
            log_level: self.resolve(ConfigKey::LogLevel),
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }
}

/// The effective configuration for one invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub tenant_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
    pub api_version: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("tenant_name", &self.tenant_name)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("log_file", &self.log_file)
            .field("log_level", &self.log_level)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl Settings {
    pub fn token_endpoint(&self) -> String {
        format!("{}/ccx/oauth2/{}/token", self.base_url, self.tenant_name)
    }

    pub fn prism_endpoint(&self) -> String {
        format!(
            "{}/api/prismAnalytics/{}/{}",
            self.base_url, self.api_version, self.tenant_name
        )
    }

    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.base_url,
            tenant_name = %self.tenant_name,
            api_version = %self.api_version,
            "Loaded Settings"
        );
        debug!(?self, "Settings loaded (full debug)");
    }
}
