//! CLI command implementations

pub mod clean;
pub mod stage;
pub mod workdir;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use miette::{IntoDiagnostic, Result};

use crate::config::Config;
use crate::context::DeploymentContext;
use crate::workdir::WorkDirectoryResolver;

/// Arguments identifying one deployment
#[derive(Debug, Args)]
pub struct DeploymentArgs {
    /// Artifact to stage: a directory, archive, file: URI or jar: URI
    pub artifact: String,

    /// Context path the application is served under
    #[arg(short, long, default_value = "/")]
    pub context_path: String,

    /// Virtual host; only the first one takes part in naming
    #[arg(long = "virtual-host")]
    pub virtual_hosts: Vec<String>,
}

impl DeploymentArgs {
    /// Build a deployment context with configuration applied
    pub fn context(&self, config: &Config) -> Result<DeploymentContext> {
        let mut context = DeploymentContext::new(self.artifact.clone(), self.context_path.clone());
        context.virtual_hosts = self.virtual_hosts.clone();
        config.apply_to(&mut context).into_diagnostic()?;
        Ok(context)
    }
}

/// Load the configuration found in the host root
pub(crate) fn load_config(host_root: &Utf8Path) -> Result<Config> {
    Config::load(host_root).into_diagnostic()
}

/// Work directory resolver for the host, honoring `[host] root`
pub(crate) fn resolver(host_root: &Utf8Path, config: &Config) -> WorkDirectoryResolver {
    let root: Utf8PathBuf = host_root.join(&config.host.root);
    WorkDirectoryResolver::new(root)
}
