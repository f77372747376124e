//! Clean command implementation

use camino::Utf8Path;
use clap::Args;
use miette::{IntoDiagnostic, Result};

use super::DeploymentArgs;
use crate::lifecycle::DeploymentLifecycle;
use crate::naming::{NamingStrategy, TempDirectoryNamer};

/// Arguments for the clean command
#[derive(Debug, Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub deployment: DeploymentArgs,
}

/// Run the clean command
///
/// Only the classic name can be recomputed, so only classic temp
/// directories are found.
pub fn run(host_root: &Utf8Path, args: CleanArgs) -> Result<()> {
    let config = super::load_config(host_root)?;
    let mut context = args.deployment.context(&config)?;

    let resolver = super::resolver(host_root, &config);
    let namer = TempDirectoryNamer::new(NamingStrategy::Classic, resolver);
    let dir = namer.resolve(&mut context).into_diagnostic()?;

    if !dir.exists() {
        tracing::info!(path = %dir, "Nothing to clean");
        return Ok(());
    }

    let mut lifecycle = DeploymentLifecycle::new(namer);
    lifecycle.deconfigure(&mut context).into_diagnostic()?;

    if dir.exists() {
        println!("Kept {}", dir);
    } else {
        println!("Removed {}", dir);
    }
    Ok(())
}
