//! Temp directory naming
//!
//! Each deployment gets a private directory under the work directory. An
//! explicitly configured directory always wins; otherwise the name comes from
//! a [`NamingStrategy`].

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::context::DeploymentContext;
use crate::resource::Resource;
use crate::utils::is_valid_directory;
use crate::workdir::WorkDirectoryResolver;
use crate::{Error, Result};

/// Fixed prefix of every generated name
pub const NAME_PREFIX: &str = "jetty";

/// Stands in for a connector bound to all interfaces
const ANY_HOST: &str = "0.0.0.0";

/// Stands in for a deployment without virtual hosts
const ANY_VHOST: &str = "any";

/// Format of the timestamp suffix
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%3f";

/// How a new temp directory name is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
    /// `jetty-{host}-{port}-{artifact}-{context}-{vhost}-`, stable across restarts
    #[default]
    Classic,
    /// Classic name plus a random number not used by any existing entry
    Random,
    /// Classic name plus the current local time
    Timestamp,
}

impl NamingStrategy {
    /// Compute a directory name for `context` under `work_dir`
    pub fn name(&self, context: &DeploymentContext, work_dir: &Utf8Path) -> String {
        let classic = classic_name(context);
        match self {
            NamingStrategy::Classic => classic,
            NamingStrategy::Random => random_name(&classic, work_dir, rand::random::<u32>),
            NamingStrategy::Timestamp => {
                format!("{}-{}", classic, Local::now().format(TIMESTAMP_FORMAT))
            }
        }
    }
}

impl std::str::FromStr for NamingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(NamingStrategy::Classic),
            "random" => Ok(NamingStrategy::Random),
            "timestamp" => Ok(NamingStrategy::Timestamp),
            _ => Err(Error::config(
                format!("Unknown naming strategy: {}", s),
                "Supported strategies: classic, random, timestamp",
            )),
        }
    }
}

impl std::fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamingStrategy::Classic => write!(f, "classic"),
            NamingStrategy::Random => write!(f, "random"),
            NamingStrategy::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Deterministic name built from the deployment's identity
///
/// Identical connector, artifact, context path and virtual host always give
/// the same name, which lets a restarted host find its previous extraction.
pub fn classic_name(context: &DeploymentContext) -> String {
    let mut name = format!("{}-", NAME_PREFIX);

    if let Some(connector) = &context.connector {
        let host = connector
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
            .unwrap_or(ANY_HOST);
        name.push_str(host);
        name.push('-');
        name.push_str(&connector.effective_port().to_string());
        name.push('-');
    }

    match artifact_segment(context) {
        Some(segment) => {
            name.push_str(&segment);
            name.push('-');
        }
        None => tracing::warn!(
            context_path = %context.context_path,
            "Can't use the artifact as part of the temp directory name"
        ),
    }

    name.push_str(&context.context_path.replace(['/', '\\'], "_"));
    name.push('-');
    name.push_str(
        context
            .virtual_hosts
            .first()
            .map(String::as_str)
            .unwrap_or(ANY_VHOST),
    );

    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '.'
            }
        })
        .collect();
    sanitized.push('-');
    sanitized
}

/// Last path segment of the deployment's artifact
fn artifact_segment(context: &DeploymentContext) -> Option<String> {
    let resource = match context.base_resource() {
        Some(resource) => resource.clone(),
        None => Resource::from_locator(context.artifact_locator()?).ok()?,
    };

    let path = resource.decoded_path();
    let path = path.strip_suffix('/').unwrap_or(&path);
    let path = path.strip_suffix('!').unwrap_or(path);
    let segment = path.rsplit('/').next().unwrap_or(path);
    Some(segment.to_string())
}

/// Classic name plus a numeric suffix that no entry in `work_dir` already uses
pub fn random_name(
    classic: &str,
    work_dir: &Utf8Path,
    mut next: impl FnMut() -> u32,
) -> String {
    loop {
        let candidate = format!("{}-{}", classic, next());
        if !work_dir.join(&candidate).exists() {
            return candidate;
        }
        tracing::debug!(name = %candidate, "Temp directory name taken, retrying");
    }
}

/// Resolves the temp directory of a deployment
#[derive(Debug, Clone)]
pub struct TempDirectoryNamer {
    strategy: NamingStrategy,
    resolver: WorkDirectoryResolver,
}

impl TempDirectoryNamer {
    pub fn new(strategy: NamingStrategy, resolver: WorkDirectoryResolver) -> Self {
        Self { strategy, resolver }
    }

    pub fn strategy(&self) -> NamingStrategy {
        self.strategy
    }

    pub fn resolver(&self) -> &WorkDirectoryResolver {
        &self.resolver
    }

    /// Resolve the temp directory for a context and record it there
    ///
    /// Precedence:
    /// 1. a valid directory already set on the context (not framework-owned)
    /// 2. a valid directory in the `temp_dir` attribute (not framework-owned)
    /// 3. a name from the strategy under the work directory (framework-owned)
    ///
    /// A directory this namer chose earlier is returned unchanged.
    pub fn resolve(&self, context: &mut DeploymentContext) -> Result<Utf8PathBuf> {
        if let Some(dir) = context.temp_directory().map(Utf8Path::to_path_buf) {
            // Chosen by an earlier call; fixed for the life of the deployment
            if context.attributes.temp_dir_configured == Some(false)
                && context.attributes.temp_dir.as_ref() == Some(&dir)
            {
                return Ok(dir);
            }
            if is_valid_directory(&dir) {
                context.attributes.temp_dir_configured = Some(true);
                return Ok(dir);
            }
        }

        if let Some(dir) = context.attributes.temp_dir.clone() {
            if is_valid_directory(&dir) {
                context.attributes.temp_dir_configured = Some(true);
                context.set_temp_directory(Some(dir.clone()));
                return Ok(dir);
            }
        }

        let work_dir = self.resolver.find_work_directory(context)?;
        let dir = work_dir.join(self.strategy.name(context, &work_dir));
        tracing::debug!(path = %dir, strategy = %self.strategy, "Chose temp directory");

        context.attributes.temp_dir = Some(dir.clone());
        context.attributes.temp_dir_configured = Some(false);
        context.set_temp_directory(Some(dir.clone()));
        Ok(dir)
    }
}
