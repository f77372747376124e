//! Configuration file parsing and merging
//!
//! Settings come from `webstage.toml` in the host root, with
//! `webstage.local.toml` layered on top for machine-specific overrides.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::context::{Connector, DeploymentContext, ExtractionPolicy};
use crate::lifecycle::jar_pattern;
use crate::naming::NamingStrategy;
use crate::Result;

/// Name of the shared configuration file
pub const CONFIG_FILE: &str = "webstage.toml";

/// Name of the machine-local override file
pub const LOCAL_CONFIG_FILE: &str = "webstage.local.toml";

/// Main configuration structure for webstage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: HostConfig,
    pub unpack: UnpackConfig,
    pub jars: JarsConfig,
}

/// The host the deployments belong to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Host installation root, holding the `work` directory (default: ".")
    pub root: Utf8PathBuf,

    /// Interface the connector binds to; empty means all interfaces
    pub connector_host: Option<String>,

    /// Connector port; the connector is omitted from names when both
    /// connector settings are unset
    pub connector_port: Option<u16>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("."),
            connector_host: None,
            connector_port: None,
        }
    }
}

/// Unpacking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpackConfig {
    /// Temp directory naming strategy (default: "classic")
    pub strategy: NamingStrategy,

    /// Extract packaged archives (default: true)
    pub extract_archive: bool,

    /// Copy exploded directories into the temp directory (default: false)
    pub copy_source_dir: bool,

    /// Synthesize a private WEB-INF copy (default: false)
    pub copy_web_inf: bool,

    /// Work directory used when the host has none
    pub base_temp_dir: Option<Utf8PathBuf>,
}

impl Default for UnpackConfig {
    fn default() -> Self {
        let policy = ExtractionPolicy::default();
        Self {
            strategy: NamingStrategy::default(),
            extract_archive: policy.extract_archive,
            copy_source_dir: policy.copy_source_dir,
            copy_web_inf: policy.copy_web_inf,
            base_temp_dir: None,
        }
    }
}

/// Jar selection for scanning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JarsConfig {
    /// Pattern over `WEB-INF/lib` jar URIs; all jars when unset
    pub web_inf_pattern: Option<String>,

    /// Pattern over container classpath URIs; no jars when unset
    pub container_pattern: Option<String>,

    /// Container classpath entries, in order
    #[serde(default)]
    pub container_classpath: Vec<Utf8PathBuf>,
}

impl Config {
    /// Load configuration from a host root.
    ///
    /// This loads `webstage.toml` and merges `webstage.local.toml` over it if
    /// it exists.
    pub fn load(host_root: &Utf8Path) -> Result<Self> {
        let config_path = host_root.join(CONFIG_FILE);
        let local_config_path = host_root.join(LOCAL_CONFIG_FILE);

        let base_config = read_toml(&config_path)?
            .unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()));

        let merged = match read_toml(&local_config_path)? {
            Some(local) => merge_toml_values(base_config, local),
            None => base_config,
        };

        let config: Config = merged.try_into()?;
        tracing::debug!(root = %host_root, "Loaded configuration");
        Ok(config)
    }

    /// Load configuration from a string (for testing)
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Extraction flags from the `[unpack]` section
    pub fn policy(&self) -> ExtractionPolicy {
        ExtractionPolicy {
            copy_source_dir: self.unpack.copy_source_dir,
            extract_archive: self.unpack.extract_archive,
            copy_web_inf: self.unpack.copy_web_inf,
        }
    }

    /// The configured connector, if any connector setting is present
    pub fn connector(&self) -> Option<Connector> {
        if self.host.connector_host.is_none() && self.host.connector_port.is_none() {
            return None;
        }
        Some(Connector {
            host: self.host.connector_host.clone(),
            local_port: None,
            port: self.host.connector_port,
        })
    }

    /// Apply host, unpack and jar settings to a deployment
    ///
    /// Fails if a jar pattern is not a valid regular expression.
    pub fn apply_to(&self, context: &mut DeploymentContext) -> Result<()> {
        context.policy = self.policy();
        context.connector = self.connector();
        context.attributes.base_temp_dir = self.unpack.base_temp_dir.clone();
        context.attributes.web_inf_jar_pattern = self
            .jars
            .web_inf_pattern
            .as_deref()
            .map(jar_pattern)
            .transpose()?;
        context.attributes.container_jar_pattern = self
            .jars
            .container_pattern
            .as_deref()
            .map(jar_pattern)
            .transpose()?;
        context.container_classpath = self.jars.container_classpath.clone();
        Ok(())
    }
}

fn read_toml(path: &Utf8Path) -> Result<Option<toml::Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(toml::from_str::<toml::Value>(&content)?))
}

/// Layer `local` over `base`
///
/// Tables merge key by key; any other value in `local`, arrays included,
/// replaces the one in `base`.
fn merge_toml_values(base: toml::Value, local: toml::Value) -> toml::Value {
    match (base, local) {
        (toml::Value::Table(mut merged), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                let value = match merged.remove(&key) {
                    Some(existing) => merge_toml_values(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            toml::Value::Table(merged)
        }
        (_, local) => local,
    }
}
