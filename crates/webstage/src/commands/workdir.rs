//! Workdir command implementation

use camino::Utf8Path;
use miette::{IntoDiagnostic, Result};

use crate::context::DeploymentContext;

/// Run the workdir command
pub fn run(host_root: &Utf8Path) -> Result<()> {
    let config = super::load_config(host_root)?;
    let resolver = super::resolver(host_root, &config);

    let mut context = DeploymentContext::default();
    context.attributes.base_temp_dir = config.unpack.base_temp_dir.clone();

    let work_dir = resolver.find_work_directory(&context).into_diagnostic()?;
    println!("{}", work_dir);
    Ok(())
}
