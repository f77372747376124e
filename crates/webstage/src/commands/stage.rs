//! Stage command implementation

use camino::Utf8Path;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::Args;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use super::DeploymentArgs;
use crate::context::DeploymentContext;
use crate::lifecycle::DeploymentLifecycle;
use crate::naming::{NamingStrategy, TempDirectoryNamer};
use crate::resource::Resource;
use crate::unpack::UnpackAction;

/// Arguments for the stage command
#[derive(Debug, Args)]
pub struct StageArgs {
    #[command(flatten)]
    pub deployment: DeploymentArgs,

    /// Temp directory naming strategy [default: from webstage.toml]
    #[arg(long, value_parser = strategy_parser())]
    pub strategy: Option<NamingStrategy>,

    /// Copy an exploded directory into the temp directory
    #[arg(long)]
    pub copy_source_dir: bool,

    /// Serve packaged archives without extracting them
    #[arg(long)]
    pub no_extract: bool,

    /// Synthesize a private copy of WEB-INF/lib and WEB-INF/classes
    #[arg(long)]
    pub copy_web_inf: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

fn strategy_parser() -> impl TypedValueParser<Value = NamingStrategy> {
    PossibleValuesParser::new(["classic", "random", "timestamp"])
        .try_map(|name| name.parse::<NamingStrategy>())
}

/// What staging produced for one deployment
#[derive(Debug, Serialize)]
pub struct StageReport {
    pub artifact: String,
    pub context_path: String,
    pub action: String,
    pub temp_directory: Option<String>,
    pub base_resource: Option<String>,
    pub class_path: Vec<String>,
    pub web_inf_jars: Vec<String>,
    pub container_jars: Vec<String>,
}

impl StageReport {
    fn new(context: &DeploymentContext, action: UnpackAction) -> Self {
        Self {
            artifact: context.artifact_locator().unwrap_or_default().to_string(),
            context_path: context.context_path.clone(),
            action: format!("{:?}", action),
            temp_directory: context.temp_directory().map(ToString::to_string),
            base_resource: context.base_resource().map(ToString::to_string),
            class_path: uris(&context.class_path),
            web_inf_jars: uris(&context.metadata.web_inf_jars),
            container_jars: uris(&context.metadata.container_jars),
        }
    }

    fn print(&self) {
        println!("Artifact:       {}", self.artifact);
        println!("Context path:   {}", self.context_path);
        println!("Action:         {}", self.action);
        println!(
            "Temp directory: {}",
            self.temp_directory.as_deref().unwrap_or("(none)")
        );
        println!(
            "Base resource:  {}",
            self.base_resource.as_deref().unwrap_or("(none)")
        );
        print_list("Classpath", &self.class_path);
        print_list("WEB-INF jars", &self.web_inf_jars);
        print_list("Container jars", &self.container_jars);
    }
}

fn uris(resources: &[Resource]) -> Vec<String> {
    resources.iter().map(Resource::uri).collect()
}

fn print_list(title: &str, entries: &[String]) {
    println!("{}:", title);
    if entries.is_empty() {
        println!("  (none)");
    }
    for entry in entries {
        println!("  - {}", entry);
    }
}

/// Run the stage command
pub fn run(host_root: &Utf8Path, args: StageArgs) -> Result<()> {
    let config = super::load_config(host_root)?;
    let mut context = args.deployment.context(&config)?;

    if args.copy_source_dir {
        context.policy.copy_source_dir = true;
    }
    if args.no_extract {
        context.policy.extract_archive = false;
    }
    if args.copy_web_inf {
        context.policy.copy_web_inf = true;
    }

    let strategy = args.strategy.unwrap_or(config.unpack.strategy);

    tracing::info!(
        artifact = %args.deployment.artifact,
        strategy = %strategy,
        "Staging deployment"
    );

    let namer = TempDirectoryNamer::new(strategy, super::resolver(host_root, &config));
    let mut lifecycle = DeploymentLifecycle::new(namer);
    let action = lifecycle.pre_configure(&mut context).into_diagnostic()?;
    lifecycle.configure(&mut context).into_diagnostic()?;

    let report = StageReport::new(&context, action);
    if args.json {
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{}", json);
    } else {
        report.print();
    }
    Ok(())
}
