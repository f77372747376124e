//! WEB-INF synthesis
//!
//! Gives a deployment a filesystem copy of `WEB-INF/lib` and `WEB-INF/classes`
//! under `{temp_dir}/webinf`, looked up ahead of the artifact itself. This is
//! what makes the jars and classes of a WAR served from within the archive, or
//! of an overlay of several roots, available as plain files.

use crate::context::DeploymentContext;
use crate::resource::Resource;
use crate::{Error, Result};

use super::WEBINF_DIR_NAME;

const COPIED_SUBDIRS: &[&str] = &["lib/", "classes/"];

/// Build `{temp_dir}/webinf/WEB-INF` and put it ahead of the artifact
pub(super) fn synthesize_web_inf(context: &mut DeploymentContext) -> Result<()> {
    let temp_dir = context.temp_directory().map(ToOwned::to_owned).ok_or_else(|| {
        Error::deploy(
            "No temp directory to copy WEB-INF into",
            "Resolve the temp directory before unpacking",
        )
    })?;
    let synthetic_root = temp_dir.join(WEBINF_DIR_NAME);
    let synthetic = Resource::Local(synthetic_root.clone());

    let Some(web_app) = context.base_resource().map(|base| strip_overlay(base, &synthetic))
    else {
        return Ok(());
    };

    let web_inf = web_app.add_path("WEB-INF/");
    let copyable = match &web_inf {
        Resource::Local(path) => path.is_dir(),
        Resource::Collection(_) | Resource::Archive { .. } => {
            web_inf.exists() && web_inf.is_directory()
        }
    };
    if !copyable {
        tracing::debug!(webapp = %web_app, "No WEB-INF directory to copy");
        return Ok(());
    }

    if synthetic_root.exists() {
        std::fs::remove_dir_all(&synthetic_root)?;
    }
    let target = synthetic_root.join("WEB-INF");
    std::fs::create_dir_all(&target)?;

    for subdir in COPIED_SUBDIRS {
        let source = web_inf.add_path(subdir);
        if source.exists() && source.is_directory() {
            let dest = target.join(subdir.trim_end_matches('/'));
            tracing::debug!("Copy {} to {}", source, dest);
            std::fs::create_dir_all(&dest)?;
            source.copy_to(&dest)?;
        }
    }

    tracing::info!(webinf = %synthetic_root, "Synthesized WEB-INF");
    context.set_base_resource(Some(Resource::Collection(vec![synthetic, web_app])));
    Ok(())
}

/// The artifact root underneath a previously synthesized overlay
fn strip_overlay(base: &Resource, synthetic: &Resource) -> Resource {
    match base {
        Resource::Collection(members) if members.first() == Some(synthetic) => {
            let mut rest = members[1..].to_vec();
            if rest.len() == 1 {
                rest.remove(0)
            } else {
                Resource::Collection(rest)
            }
        }
        other => other.clone(),
    }
}
