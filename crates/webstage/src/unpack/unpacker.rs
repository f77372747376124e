//! Artifact unpacking decisions

use camino::{Utf8Path, Utf8PathBuf};
use std::time::SystemTime;

use crate::archive::{self, strip_archive_suffix};
use crate::context::DeploymentContext;
use crate::resource::Resource;
use crate::utils::{copy_dir_recursive, is_valid_directory, modified, remove_dir_tree};
use crate::{Error, Result};

use super::WEBAPP_DIR_NAME;
use super::web_inf::synthesize_web_inf;

/// What the unpacker did with the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackAction {
    /// The context already had a base resource
    Preset,
    /// An exploded directory used where it is
    InPlace,
    /// An archive served from within, without extraction
    ServedFromArchive,
    /// An exploded directory copied into the temp directory
    Copied,
    /// An archive extracted for the first time
    Extracted,
    /// A stale extraction replaced because the archive is newer
    Reextracted,
    /// A previous extraction reused because it is up to date
    Reused,
    /// A writable directory next to the archive used instead of extracting
    Sibling,
}

/// Materializes a deployment's artifact into a servable directory
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactUnpacker;

impl ArtifactUnpacker {
    pub fn new() -> Self {
        Self
    }

    /// Materialize the artifact and set the context's base resource
    ///
    /// Does nothing to the artifact when the context already has a base
    /// resource. When `copy_web_inf` is set the base resource becomes an
    /// overlay with the synthesized `WEB-INF` first.
    pub fn unpack(&self, context: &mut DeploymentContext) -> Result<UnpackAction> {
        let action = if context.base_resource().is_some() {
            UnpackAction::Preset
        } else {
            self.materialize(context)?
        };

        if context.policy.copy_web_inf {
            synthesize_web_inf(context)?;
        }

        Ok(action)
    }

    fn materialize(&self, context: &mut DeploymentContext) -> Result<UnpackAction> {
        let locator = context
            .artifact_locator()
            .map(str::to_string)
            .ok_or_else(|| Error::deploy_not_found("(no artifact configured)"))?;

        let mut web_app = Resource::from_locator(&locator)?;

        // Accept aliases for the artifact
        if let Some(alias) = web_app.alias() {
            tracing::debug!(artifact = %web_app, alias = %alias, "Artifact anti-aliased");
            web_app = alias;
        }

        // A packaged file is served through its archive root
        if let Resource::Local(path) = &web_app {
            if path.is_file() && archive::is_archive(path) {
                web_app = Resource::archive_root(path.clone());
            }
        }

        tracing::debug!(
            artifact = %web_app,
            exists = web_app.exists(),
            directory = web_app.is_directory(),
            "Resolved artifact"
        );

        let policy = context.policy;
        let (web_app, action) = match &web_app {
            Resource::Local(path) if path.is_dir() && policy.copy_source_dir => {
                let dest = webapp_dir(context)?;
                tracing::info!("Copy {} to {}", path, dest);
                copy_dir_recursive(path, &dest)?;
                (Resource::Local(dest), UnpackAction::Copied)
            }
            Resource::Local(path) if path.is_dir() => (web_app.clone(), UnpackAction::InPlace),
            Resource::Archive { archive, .. } if policy.extract_archive && web_app.exists() => {
                match sibling_dir(archive) {
                    Some(sibling) => {
                        tracing::info!("Using exploded sibling {} for {}", sibling, archive);
                        (Resource::Local(sibling), UnpackAction::Sibling)
                    }
                    None => {
                        let dest = webapp_dir(context)?;
                        let action = extract_if_stale(&web_app, &dest)?;
                        (Resource::Local(dest), action)
                    }
                }
            }
            Resource::Archive { .. } => (web_app.clone(), UnpackAction::ServedFromArchive),
            Resource::Local(_) | Resource::Collection(_) => {
                (web_app.clone(), UnpackAction::InPlace)
            }
        };

        if !web_app.exists() || !web_app.is_directory() {
            tracing::warn!("Web application not found {}", locator);
            return Err(Error::deploy_not_found(locator));
        }

        tracing::debug!(webapp = %web_app, action = ?action, "Materialized artifact");
        context.set_base_resource(Some(web_app));
        Ok(action)
    }
}

/// `{temp_dir}/webapp` for the context
fn webapp_dir(context: &DeploymentContext) -> Result<Utf8PathBuf> {
    let temp_dir = context.temp_directory().ok_or_else(|| {
        Error::deploy(
            "No temp directory to materialize the artifact into",
            "Resolve the temp directory before unpacking",
        )
    })?;
    Ok(temp_dir.join(WEBAPP_DIR_NAME))
}

/// A writable directory next to `archive` with the archive suffix removed
fn sibling_dir(archive: &Utf8Path) -> Option<Utf8PathBuf> {
    let stem = strip_archive_suffix(archive.file_name()?)?;
    let sibling = archive.with_file_name(stem);
    is_valid_directory(&sibling).then_some(sibling)
}

/// Extract into `dest` unless an extraction at least as new as the archive exists
fn extract_if_stale(archive_root: &Resource, dest: &Utf8Path) -> Result<UnpackAction> {
    if !dest.exists() {
        extract_fresh(archive_root, dest)?;
        return Ok(UnpackAction::Extracted);
    }

    if is_newer(archive_root.last_modified(), modified(dest)) {
        std::fs::remove_dir_all(dest)?;
        extract_fresh(archive_root, dest)?;
        return Ok(UnpackAction::Reextracted);
    }

    tracing::debug!(dest = %dest, "Extraction is up to date");
    Ok(UnpackAction::Reused)
}

/// Extract into an empty `dest`, leaving nothing behind on failure
///
/// A partial tree would look up to date on the next run.
fn extract_fresh(archive_root: &Resource, dest: &Utf8Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    tracing::info!("Extract {} to {}", archive_root, dest);
    if let Err(e) = archive_root.copy_to(dest) {
        tracing::warn!(dest = %dest, error = %e, "Extraction failed, discarding partial tree");
        remove_dir_tree(dest);
        return Err(e);
    }
    Ok(())
}

fn is_newer(source: Option<SystemTime>, extracted: Option<SystemTime>) -> bool {
    match (source, extracted) {
        (Some(source), Some(extracted)) => source > extracted,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
