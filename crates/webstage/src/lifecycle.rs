//! Deployment lifecycle
//!
//! Drives one deployment through its phases:
//!
//! ```text
//! Unconfigured -> PreConfigured -> Configured -> Deconfigured
//! ```
//!
//! `pre_configure` resolves and creates the temp directory, materializes the
//! artifact and selects jars for scanning. `configure` wires the classpath and
//! composes extra resources. `deconfigure` removes what the framework created
//! and restores the base resource. A deconfigured lifecycle is finished; a
//! redeploy uses a new one.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use crate::context::{DeploymentContext, DeploymentMetadata};
use crate::naming::{TempDirectoryNamer, random_name};
use crate::resource::Resource;
use crate::unpack::{ArtifactUnpacker, UnpackAction};
use crate::utils::remove_dir_tree;
use crate::workdir::WORK_DIR_NAME;
use crate::{Error, Result};

const JAR_EXTENSIONS: &[&str] = &["jar", "zip"];

/// Phase of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unconfigured,
    PreConfigured,
    Configured,
    Deconfigured,
}

/// Runs the staging phases for one deployment
#[derive(Debug, Clone)]
pub struct DeploymentLifecycle {
    namer: TempDirectoryNamer,
    unpacker: ArtifactUnpacker,
    state: LifecycleState,
    pre_unpack_base_resource: Option<Resource>,
}

impl DeploymentLifecycle {
    pub fn new(namer: TempDirectoryNamer) -> Self {
        Self {
            namer,
            unpacker: ArtifactUnpacker::new(),
            state: LifecycleState::Unconfigured,
            pre_unpack_base_resource: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn namer(&self) -> &TempDirectoryNamer {
        &self.namer
    }

    /// Prepare the temp directory, materialize the artifact and select jars
    pub fn pre_configure(&mut self, context: &mut DeploymentContext) -> Result<UnpackAction> {
        self.ensure_active("pre-configure")?;

        self.make_temp_directory(context)?;

        if self.state == LifecycleState::Unconfigured {
            self.pre_unpack_base_resource = context.base_resource().cloned();
        }

        let action = self.unpacker.unpack(context)?;
        tracing::info!(
            context_path = %context.context_path,
            action = ?action,
            "Staged {}",
            context
                .base_resource()
                .map(ToString::to_string)
                .unwrap_or_default()
        );

        context.metadata = order_jars(context)?;
        self.state = LifecycleState::PreConfigured;
        Ok(action)
    }

    /// Wire `WEB-INF/classes` and `WEB-INF/lib` and compose extra resources
    pub fn configure(&mut self, context: &mut DeploymentContext) -> Result<()> {
        self.ensure_active("configure")?;

        if context.is_started() {
            tracing::debug!(
                context_path = %context.context_path,
                "Deployment already started, skipping configure"
            );
            return Ok(());
        }

        if self.state == LifecycleState::Unconfigured {
            return Err(Error::deploy(
                "Cannot configure a deployment that has not been pre-configured",
                "Run pre-configure first to stage the artifact",
            ));
        }

        if let Some(web_inf) = context.web_inf() {
            let classes = web_inf.add_path("classes/");
            if classes.exists() && classes.is_directory() {
                push_unique(&mut context.class_path, classes);
            }

            let lib = web_inf.add_path("lib/");
            if lib.exists() && lib.is_directory() {
                for jar in list_jars(&lib)? {
                    push_unique(&mut context.class_path, jar);
                }
            }
        }

        if let Some(extra) = context.attributes.extra_resources.clone() {
            if let Some(base) = context.base_resource().cloned() {
                let mut members = match base {
                    Resource::Collection(members) => members,
                    other => vec![other],
                };
                for resource in extra {
                    push_unique(&mut members, resource);
                }
                context.set_base_resource(Some(Resource::Collection(members)));
            }
        }

        tracing::debug!(
            context_path = %context.context_path,
            entries = context.class_path.len(),
            "Configured classpath"
        );
        self.state = LifecycleState::Configured;
        Ok(())
    }

    /// Remove the framework-owned temp directory and restore the base resource
    pub fn deconfigure(&mut self, context: &mut DeploymentContext) -> Result<()> {
        if self.state == LifecycleState::Deconfigured {
            tracing::debug!(context_path = %context.context_path, "Already deconfigured");
            return Ok(());
        }

        if let Some(dir) = context.temp_directory().map(Utf8Path::to_path_buf) {
            if !context.framework_owns_temp_dir() {
                tracing::debug!(path = %dir, "Keeping externally configured temp directory");
            } else if is_temp_work_directory(&dir) {
                tracing::debug!(path = %dir, "Keeping persistent work directory");
            } else if remove_dir_tree(&dir) {
                tracing::info!(path = %dir, "Removed temp directory");
                context.attributes.temp_dir = None;
                context.attributes.temp_dir_configured = None;
                context.set_temp_directory(None);
            }
        }

        context.set_base_resource(self.pre_unpack_base_resource.take());
        context.class_path.clear();
        context.metadata = DeploymentMetadata::default();
        self.state = LifecycleState::Deconfigured;
        Ok(())
    }

    /// Give `clone` a fresh temp directory next to the template's
    ///
    /// The returned lifecycle starts out pre-configured. Failure to create the
    /// directory is logged and the path is still assigned.
    pub fn clone_configure(
        &self,
        template: &DeploymentContext,
        clone: &mut DeploymentContext,
    ) -> Result<DeploymentLifecycle> {
        let template_dir = template.temp_directory().ok_or_else(|| {
            Error::deploy(
                "Template deployment has no temp directory",
                "Pre-configure the template before cloning it",
            )
        })?;
        let (parent, name) = template_dir
            .parent()
            .zip(template_dir.file_name())
            .ok_or_else(|| {
                Error::deploy(
                    format!("Cannot clone temp directory {}", template_dir),
                    "The template's temp directory must have a parent directory",
                )
            })?;

        let dir = parent.join(random_name(name, parent, rand::random::<u32>));
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(path = %dir, error = %e, "Failed to create clone temp directory");
        }
        tracing::debug!(template = %template_dir, path = %dir, "Cloned temp directory");

        clone.attributes.temp_dir = Some(dir.clone());
        clone.attributes.temp_dir_configured = Some(false);
        clone.set_temp_directory(Some(dir));

        Ok(DeploymentLifecycle {
            namer: self.namer.clone(),
            unpacker: self.unpacker,
            state: LifecycleState::PreConfigured,
            pre_unpack_base_resource: clone.base_resource().cloned(),
        })
    }

    fn ensure_active(&self, phase: &str) -> Result<()> {
        if self.state == LifecycleState::Deconfigured {
            return Err(Error::deploy(
                format!("Cannot {} a deconfigured deployment", phase),
                "Create a new lifecycle to redeploy",
            ));
        }
        Ok(())
    }

    fn make_temp_directory(&self, context: &mut DeploymentContext) -> Result<Utf8PathBuf> {
        let dir = self.namer.resolve(context)?;
        if !dir.exists() {
            match std::fs::create_dir_all(&dir) {
                Ok(()) => tracing::debug!(path = %dir, "Created temp directory"),
                Err(e) => {
                    tracing::warn!(path = %dir, error = %e, "Failed to create temp directory")
                }
            }
        }
        Ok(dir)
    }
}

/// Whether `dir` is a persistent work directory that must survive teardown
///
/// True for a directory named `work` or a direct child of one, compared
/// case-insensitively.
pub fn is_temp_work_directory(dir: &Utf8Path) -> bool {
    let is_work = |name: Option<&str>| name.is_some_and(|n| n.eq_ignore_ascii_case(WORK_DIR_NAME));
    is_work(dir.file_name()) || is_work(dir.parent().and_then(Utf8Path::file_name))
}

/// Compile a jar selection pattern that must match a whole URI
pub fn jar_pattern(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

/// Select container and `WEB-INF/lib` jars by pattern
fn order_jars(context: &DeploymentContext) -> Result<DeploymentMetadata> {
    let container_jars = match &context.attributes.container_jar_pattern {
        Some(pattern) => context
            .container_classpath
            .iter()
            .map(|path| Resource::Local(path.clone()))
            .filter(|jar| pattern.is_match(&jar.uri()))
            .collect(),
        None => Vec::new(),
    };

    let web_inf_jars = match context.web_inf() {
        Some(web_inf) => {
            let lib = web_inf.add_path("lib/");
            let jars = if lib.exists() && lib.is_directory() {
                list_jars(&lib)?
            } else {
                Vec::new()
            };
            match &context.attributes.web_inf_jar_pattern {
                Some(pattern) => jars
                    .into_iter()
                    .filter(|jar| pattern.is_match(&jar.uri()))
                    .collect(),
                None => jars,
            }
        }
        None => Vec::new(),
    };

    tracing::debug!(
        container = container_jars.len(),
        web_inf = web_inf_jars.len(),
        "Selected jars for scanning"
    );
    Ok(DeploymentMetadata {
        container_jars,
        web_inf_jars,
    })
}

fn list_jars(lib: &Resource) -> Result<Vec<Resource>> {
    Ok(lib
        .list()?
        .into_iter()
        .filter(|name| is_jar_name(name))
        .map(|name| lib.add_path(&name))
        .collect())
}

fn is_jar_name(name: &str) -> bool {
    Utf8Path::new(name)
        .extension()
        .is_some_and(|ext| JAR_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn push_unique(list: &mut Vec<Resource>, resource: Resource) {
    if !list.contains(&resource) {
        list.push(resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingStrategy;
    use crate::workdir::WorkDirectoryResolver;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        root: Utf8PathBuf,
        app: Utf8PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().canonicalize().unwrap()).unwrap();
        fs::create_dir(root.join("work")).unwrap();

        let app = root.join("apps/shop");
        fs::create_dir_all(app.join("WEB-INF/classes")).unwrap();
        fs::create_dir_all(app.join("WEB-INF/lib")).unwrap();
        fs::write(app.join("WEB-INF/lib/core.jar"), "core").unwrap();
        fs::write(app.join("WEB-INF/lib/extra.ZIP"), "extra").unwrap();
        fs::write(app.join("WEB-INF/lib/README.txt"), "not a jar").unwrap();
        fs::write(app.join("index.html"), "<html/>").unwrap();

        Fixture {
            _temp_dir: temp_dir,
            root,
            app,
        }
    }

    fn lifecycle(root: &Utf8Path) -> DeploymentLifecycle {
        DeploymentLifecycle::new(TempDirectoryNamer::new(
            NamingStrategy::Classic,
            WorkDirectoryResolver::new(root),
        ))
    }

    #[test]
    fn test_is_temp_work_directory() {
        assert!(is_temp_work_directory(Utf8Path::new("/opt/host/work")));
        assert!(is_temp_work_directory(Utf8Path::new("/opt/host/WORK")));
        assert!(is_temp_work_directory(Utf8Path::new("/opt/host/Work/jetty-app-")));
        assert!(!is_temp_work_directory(Utf8Path::new("/opt/host/work/a/b")));
        assert!(!is_temp_work_directory(Utf8Path::new("/tmp/jetty-app-")));
        assert!(!is_temp_work_directory(Utf8Path::new("/tmp/workshop")));
    }

    #[test]
    fn test_jar_pattern_matches_whole_uri() {
        let pattern = jar_pattern(".*/core[^/]*\\.jar").unwrap();
        assert!(pattern.is_match("file:///opt/lib/core-1.0.jar"));
        assert!(!pattern.is_match("file:///opt/lib/core-1.0.jar.bak"));
        assert!(jar_pattern("(").is_err());
    }

    #[test]
    fn test_full_lifecycle() {
        let f = fixture();
        let mut context = DeploymentContext::new(f.app.as_str(), "/shop");
        let mut lifecycle = lifecycle(&f.root);

        let action = lifecycle.pre_configure(&mut context).unwrap();
        assert_eq!(action, UnpackAction::InPlace);
        assert_eq!(lifecycle.state(), LifecycleState::PreConfigured);

        let temp = context.temp_directory().unwrap().to_path_buf();
        assert!(temp.starts_with(f.root.join("work")));
        assert!(temp.is_dir());
        assert_eq!(context.metadata.web_inf_jars.len(), 2);
        assert!(context.metadata.container_jars.is_empty());

        lifecycle.configure(&mut context).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Configured);
        assert_eq!(
            context.class_path,
            vec![
                Resource::Local(f.app.join("WEB-INF/classes")),
                Resource::Local(f.app.join("WEB-INF/lib/core.jar")),
                Resource::Local(f.app.join("WEB-INF/lib/extra.ZIP")),
            ]
        );

        // Configuring again does not duplicate entries
        lifecycle.configure(&mut context).unwrap();
        assert_eq!(context.class_path.len(), 3);

        lifecycle.deconfigure(&mut context).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Deconfigured);
        // Temp directory is a direct child of `work`, so it survives
        assert!(temp.is_dir());
        assert!(context.base_resource().is_none());
        assert!(context.class_path.is_empty());

        assert!(lifecycle.pre_configure(&mut context).is_err());
    }

    #[test]
    fn test_deconfigure_removes_framework_temp_dir() {
        let f = fixture();
        let base = f.root.join("base");
        fs::create_dir(&base).unwrap();
        fs::remove_dir(f.root.join("work")).unwrap();

        let mut context = DeploymentContext::new(f.app.as_str(), "/shop");
        context.attributes.base_temp_dir = Some(base.clone());
        context.policy.copy_source_dir = true;

        let mut lifecycle = lifecycle(&f.root);
        assert_eq!(
            lifecycle.pre_configure(&mut context).unwrap(),
            UnpackAction::Copied
        );
        let temp = context.temp_directory().unwrap().to_path_buf();
        assert!(temp.starts_with(&base));
        assert!(temp.join("webapp/index.html").is_file());

        lifecycle.deconfigure(&mut context).unwrap();
        assert!(!temp.exists());
        assert!(context.temp_directory().is_none());
        assert!(context.attributes.temp_dir.is_none());
        assert_eq!(context.attributes.temp_dir_configured, None);
    }

    #[test]
    fn test_deconfigure_keeps_owned_directory_named_work() {
        let f = fixture();
        let owned = f.root.join("owned/work");
        fs::create_dir_all(&owned).unwrap();
        fs::write(owned.join("marker"), "keep").unwrap();

        let mut context = DeploymentContext::new(f.app.as_str(), "/shop");
        context.set_temp_directory(Some(owned.clone()));
        context.attributes.temp_dir = Some(owned.clone());
        context.attributes.temp_dir_configured = Some(false);

        let mut lifecycle = lifecycle(&f.root);
        lifecycle.pre_configure(&mut context).unwrap();
        assert_eq!(context.temp_directory(), Some(owned.as_path()));
        assert!(context.framework_owns_temp_dir());

        lifecycle.deconfigure(&mut context).unwrap();

        assert!(owned.join("marker").is_file());
        assert_eq!(context.temp_directory(), Some(owned.as_path()));
        assert_eq!(context.attributes.temp_dir, Some(owned));
        assert_eq!(context.attributes.temp_dir_configured, Some(false));
    }

    #[test]
    fn test_deconfigure_keeps_external_temp_dir() {
        let f = fixture();
        let external = f.root.join("external");
        fs::create_dir(&external).unwrap();

        let mut context = DeploymentContext::new(f.app.as_str(), "/shop");
        context.set_temp_directory(Some(external.clone()));

        let mut lifecycle = lifecycle(&f.root);
        lifecycle.pre_configure(&mut context).unwrap();
        lifecycle.deconfigure(&mut context).unwrap();

        assert!(external.is_dir());
        assert_eq!(context.temp_directory(), Some(external.as_path()));
        assert_eq!(context.attributes.temp_dir_configured, Some(true));
    }

    #[test]
    fn test_configure_skipped_when_started() {
        let f = fixture();
        let mut context = DeploymentContext::new(f.app.as_str(), "/shop");
        let mut lifecycle = lifecycle(&f.root);

        lifecycle.pre_configure(&mut context).unwrap();
        context.set_started(true);
        lifecycle.configure(&mut context).unwrap();

        assert!(context.class_path.is_empty());
        assert_eq!(lifecycle.state(), LifecycleState::PreConfigured);
    }

    #[test]
    fn test_configure_requires_pre_configure() {
        let f = fixture();
        let mut context = DeploymentContext::new(f.app.as_str(), "/shop");
        assert!(lifecycle(&f.root).configure(&mut context).is_err());
    }

    #[test]
    fn test_configure_composes_extra_resources() {
        let f = fixture();
        let extra = f.root.join("extra");
        fs::create_dir(&extra).unwrap();

        let mut context = DeploymentContext::new(f.app.as_str(), "/shop");
        context.attributes.extra_resources = Some(vec![Resource::Local(extra.clone())]);

        let mut lifecycle = lifecycle(&f.root);
        lifecycle.pre_configure(&mut context).unwrap();
        lifecycle.configure(&mut context).unwrap();

        assert_eq!(
            context.base_resource(),
            Some(&Resource::Collection(vec![
                Resource::Local(f.app.clone()),
                Resource::Local(extra),
            ]))
        );

        lifecycle.deconfigure(&mut context).unwrap();
        assert!(context.base_resource().is_none());
    }

    #[test]
    fn test_jar_patterns_select_jars() {
        let f = fixture();
        let container_lib = f.root.join("container");
        fs::create_dir(&container_lib).unwrap();
        let servlet = container_lib.join("servlet-api-4.0.jar");
        let logging = container_lib.join("logging-1.2.jar");
        fs::write(&servlet, "api").unwrap();
        fs::write(&logging, "log").unwrap();

        let mut context = DeploymentContext::new(f.app.as_str(), "/shop");
        context.container_classpath = vec![logging, servlet.clone()];
        context.attributes.container_jar_pattern =
            Some(jar_pattern(".*/servlet-api-[^/]*\\.jar").unwrap());
        context.attributes.web_inf_jar_pattern = Some(jar_pattern(".*/core\\.jar").unwrap());

        let mut lifecycle = lifecycle(&f.root);
        lifecycle.pre_configure(&mut context).unwrap();

        assert_eq!(context.metadata.container_jars, vec![Resource::Local(servlet)]);
        assert_eq!(
            context.metadata.web_inf_jars,
            vec![Resource::Local(f.app.join("WEB-INF/lib/core.jar"))]
        );
    }

    #[test]
    fn test_clone_configure() {
        let f = fixture();
        let mut template = DeploymentContext::new(f.app.as_str(), "/shop");
        let mut lifecycle = lifecycle(&f.root);
        lifecycle.pre_configure(&mut template).unwrap();
        let template_dir = template.temp_directory().unwrap().to_path_buf();

        let mut clone = DeploymentContext::new(f.app.as_str(), "/shop");
        let cloned = lifecycle.clone_configure(&template, &mut clone).unwrap();

        assert_eq!(cloned.state(), LifecycleState::PreConfigured);
        let clone_dir = clone.temp_directory().unwrap();
        assert_ne!(clone_dir, template_dir);
        assert_eq!(clone_dir.parent(), template_dir.parent());
        assert!(clone_dir
            .file_name()
            .unwrap()
            .starts_with(&format!("{}-", template_dir.file_name().unwrap())));
        assert!(clone_dir.is_dir());
        assert!(clone.framework_owns_temp_dir());
    }

    #[test]
    fn test_clone_configure_requires_template_temp_dir() {
        let f = fixture();
        let template = DeploymentContext::new(f.app.as_str(), "/shop");
        let mut clone = DeploymentContext::new(f.app.as_str(), "/shop");
        assert!(lifecycle(&f.root).clone_configure(&template, &mut clone).is_err());
    }
}
