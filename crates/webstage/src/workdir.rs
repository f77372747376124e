//! Work directory resolution
//!
//! The work directory is the shared root under which every deployment's temp
//! directory is created. Candidates are tried in a fixed order and the first
//! one that exists, is a directory and is writable wins:
//!
//! 1. `{host_root}/work`
//! 2. the context's `base_temp_dir` attribute
//! 3. the system temp directory
//!
//! If none qualifies, a fresh uniquely named directory is created under the
//! host root.

use camino::{Utf8Path, Utf8PathBuf};

use crate::context::DeploymentContext;
use crate::utils::{is_valid_directory, to_utf8};
use crate::{Error, Result};

/// Name of the persistent work directory under the host root
pub const WORK_DIR_NAME: &str = "work";

/// Finds the shared root directory for deployment temp directories
#[derive(Debug, Clone)]
pub struct WorkDirectoryResolver {
    host_root: Utf8PathBuf,
    system_temp_dir: Option<Utf8PathBuf>,
}

impl WorkDirectoryResolver {
    /// Create a resolver for a host installed at `host_root`
    pub fn new(host_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            host_root: host_root.into(),
            system_temp_dir: None,
        }
    }

    /// Use `dir` in place of the process temp directory
    pub fn with_system_temp_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.system_temp_dir = Some(dir.into());
        self
    }

    pub fn host_root(&self) -> &Utf8Path {
        &self.host_root
    }

    /// Find the work directory for a context
    pub fn find_work_directory(&self, context: &DeploymentContext) -> Result<Utf8PathBuf> {
        let host_work = self.host_root.join(WORK_DIR_NAME);
        if is_valid_directory(&host_work) {
            tracing::debug!(path = %host_work, "Using host work directory");
            return Ok(host_work);
        }

        if let Some(base) = context.attributes.base_temp_dir.as_deref() {
            if is_valid_directory(base) {
                tracing::debug!(path = %base, "Using configured base temp directory");
                return Ok(base.to_path_buf());
            }
            tracing::debug!(path = %base, "Configured base temp directory is not usable");
        }

        if let Some(system_temp) = self.system_temp_dir() {
            if is_valid_directory(&system_temp) {
                tracing::debug!(path = %system_temp, "Using system temp directory");
                return Ok(system_temp);
            }
            tracing::debug!(path = %system_temp, "System temp directory is not usable");
        }

        self.create_fallback()
    }

    fn system_temp_dir(&self) -> Option<Utf8PathBuf> {
        match &self.system_temp_dir {
            Some(dir) => Some(dir.clone()),
            None => to_utf8(std::env::temp_dir()).ok(),
        }
    }

    /// Create a uniquely named directory under the host root
    fn create_fallback(&self) -> Result<Utf8PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix("webstage-context-")
            .suffix("-work")
            .keep(true)
            .tempdir_in(&self.host_root)
            .map_err(|e| {
                tracing::warn!(
                    path = %self.host_root,
                    error = %e,
                    "Unable to create fallback work directory"
                );
                Error::work_directory_unavailable(&self.host_root)
            })?;

        let path = to_utf8(dir.path().to_path_buf())?;
        tracing::warn!(path = %path, "No usable work directory, created a fallback");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_root(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_host_work_directory_wins() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);
        let host_work = root.join("work");
        let base = root.join("basetemp");
        fs::create_dir(&host_work).unwrap();
        fs::create_dir(&base).unwrap();

        let mut context = DeploymentContext::default();
        context.attributes.base_temp_dir = Some(base);

        let resolver = WorkDirectoryResolver::new(&root);
        assert_eq!(resolver.find_work_directory(&context).unwrap(), host_work);
    }

    #[test]
    fn test_base_temp_dir_attribute() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);
        let base = root.join("basetemp");
        fs::create_dir(&base).unwrap();

        let mut context = DeploymentContext::default();
        context.attributes.base_temp_dir = Some(base.clone());

        let resolver = WorkDirectoryResolver::new(&root);
        assert_eq!(resolver.find_work_directory(&context).unwrap(), base);
    }

    #[test]
    fn test_falls_back_to_system_temp() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);

        let resolver = WorkDirectoryResolver::new(&root);
        let work = resolver
            .find_work_directory(&DeploymentContext::default())
            .unwrap();

        let system_temp = Utf8PathBuf::try_from(std::env::temp_dir()).unwrap();
        assert_eq!(work, system_temp);
    }

    #[test]
    fn test_invalid_candidates_do_not_short_circuit() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);

        // `work` exists but is a file, the attribute points nowhere
        fs::write(root.join("work"), "not a directory").unwrap();
        let mut context = DeploymentContext::default();
        context.attributes.base_temp_dir = Some(root.join("missing"));

        let resolver = WorkDirectoryResolver::new(&root);
        let work = resolver.find_work_directory(&context).unwrap();

        let system_temp = Utf8PathBuf::try_from(std::env::temp_dir()).unwrap();
        assert_eq!(work, system_temp);
    }

    #[test]
    fn test_fallback_created_under_host_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);

        let resolver =
            WorkDirectoryResolver::new(&root).with_system_temp_dir(root.join("no-such-tmp"));
        let work = resolver
            .find_work_directory(&DeploymentContext::default())
            .unwrap();

        assert_eq!(work.parent(), Some(root.as_path()));
        let name = work.file_name().unwrap();
        assert!(name.starts_with("webstage-context-"));
        assert!(name.ends_with("-work"));
        assert!(work.is_dir());
    }

    #[test]
    fn test_work_directory_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);
        let missing_host = root.join("missing-host");

        let mut context = DeploymentContext::default();
        context.attributes.base_temp_dir = Some(root.join("missing-base"));

        let resolver = WorkDirectoryResolver::new(&missing_host)
            .with_system_temp_dir(root.join("no-such-tmp"));
        let err = resolver.find_work_directory(&context).unwrap_err();

        assert!(
            matches!(err, Error::WorkDirectoryUnavailable { ref path } if *path == missing_host)
        );
    }
}
