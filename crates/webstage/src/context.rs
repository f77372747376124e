//! Deployment context
//!
//! A [`DeploymentContext`] is the state of one hosted web application as seen
//! by the staging lifecycle: where its artifact lives, where its temp
//! directory is, which resources make up its effective base, and the typed
//! attributes a host can set to steer resolution.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use crate::resource::Resource;

/// Flags controlling how the artifact is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionPolicy {
    /// Copy an exploded source directory into the temp directory on every run
    pub copy_source_dir: bool,
    /// Extract a packaged archive into the temp directory
    pub extract_archive: bool,
    /// Build a private copy of `WEB-INF/lib` and `WEB-INF/classes`
    pub copy_web_inf: bool,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self {
            copy_source_dir: false,
            extract_archive: true,
            copy_web_inf: false,
        }
    }
}

/// The first connector of the owning host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connector {
    /// Host the connector binds to; `None` means all interfaces
    pub host: Option<String>,
    /// Port actually being listened on, once bound
    pub local_port: Option<u16>,
    /// Configured port
    pub port: Option<u16>,
}

impl Connector {
    /// Port used for naming: bound port, then configured port, then 0
    pub fn effective_port(&self) -> u16 {
        self.local_port.or(self.port).unwrap_or(0)
    }
}

/// Typed attributes recognized on a deployment
#[derive(Debug, Clone, Default)]
pub struct ContextAttributes {
    /// Override for the shared work directory
    pub base_temp_dir: Option<Utf8PathBuf>,
    /// Resolved (or externally supplied) temp directory
    pub temp_dir: Option<Utf8PathBuf>,
    /// `Some(true)` when the temp directory was supplied from outside and
    /// must not be deleted, `Some(false)` when the framework chose it, `None`
    /// when nothing has been resolved
    pub temp_dir_configured: Option<bool>,
    /// Additional resources overlaid after the base resource
    pub extra_resources: Option<Vec<Resource>>,
    /// Selects which `WEB-INF/lib` jars are recorded; all when unset
    pub web_inf_jar_pattern: Option<Regex>,
    /// Selects which container classpath jars are recorded; none when unset
    pub container_jar_pattern: Option<Regex>,
}

/// Jars selected for scanning, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentMetadata {
    pub container_jars: Vec<Resource>,
    pub web_inf_jars: Vec<Resource>,
}

/// One hosted web application instance
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    /// Source artifact locator: a path, `file:` URI or `jar:` URI
    pub war: Option<String>,
    /// Locator of an exploded tree, used when `war` is unset
    pub resource_base: Option<String>,
    /// Context path, e.g. `/app1`
    pub context_path: String,
    /// Virtual hosts; only the first one contributes to naming
    pub virtual_hosts: Vec<String>,
    /// First connector of the owning host, if the host has one
    pub connector: Option<Connector>,
    pub policy: ExtractionPolicy,
    pub attributes: ContextAttributes,
    /// Ordered container classpath entries supplied by the host
    pub container_classpath: Vec<Utf8PathBuf>,
    /// Web application classpath entries wired by configure
    pub class_path: Vec<Resource>,
    pub metadata: DeploymentMetadata,
    base_resource: Option<Resource>,
    temp_directory: Option<Utf8PathBuf>,
    started: bool,
}

impl Default for DeploymentContext {
    fn default() -> Self {
        Self {
            war: None,
            resource_base: None,
            context_path: "/".to_string(),
            virtual_hosts: Vec::new(),
            connector: None,
            policy: ExtractionPolicy::default(),
            attributes: ContextAttributes::default(),
            container_classpath: Vec::new(),
            class_path: Vec::new(),
            metadata: DeploymentMetadata::default(),
            base_resource: None,
            temp_directory: None,
            started: false,
        }
    }
}

impl DeploymentContext {
    /// Create a context for a packaged or exploded artifact
    pub fn new(war: impl Into<String>, context_path: impl Into<String>) -> Self {
        Self {
            war: Some(war.into()),
            context_path: context_path.into(),
            ..Self::default()
        }
    }

    /// The artifact locator that names this deployment: `war`, else `resource_base`
    pub fn artifact_locator(&self) -> Option<&str> {
        self.war
            .as_deref()
            .filter(|war| !war.is_empty())
            .or(self.resource_base.as_deref())
            .filter(|locator| !locator.is_empty())
    }

    pub fn temp_directory(&self) -> Option<&Utf8Path> {
        self.temp_directory.as_deref()
    }

    pub fn set_temp_directory(&mut self, dir: Option<Utf8PathBuf>) {
        self.temp_directory = dir;
    }

    pub fn base_resource(&self) -> Option<&Resource> {
        self.base_resource.as_ref()
    }

    pub fn set_base_resource(&mut self, resource: Option<Resource>) {
        self.base_resource = resource;
    }

    /// `WEB-INF` of the base resource, when it exists as a directory
    pub fn web_inf(&self) -> Option<Resource> {
        let web_inf = self.base_resource.as_ref()?.add_path("WEB-INF/");
        (web_inf.exists() && web_inf.is_directory()).then_some(web_inf)
    }

    /// Whether the framework created the temp directory and may delete it
    pub fn framework_owns_temp_dir(&self) -> bool {
        self.attributes.temp_dir_configured == Some(false)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn set_started(&mut self, started: bool) {
        self.started = started;
    }
}
