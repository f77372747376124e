//! Resource handles for deployable content
//!
//! A [`Resource`] is a location that can be checked, listed, descended into and
//! copied out, whether it lives on the filesystem, inside a packaged archive,
//! or in an ordered overlay of several such locations.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;
use url::Url;

use crate::archive;
use crate::utils::{copy_dir_recursive, modified, to_utf8};
use crate::{Error, Result};

/// A handle on deployable content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A filesystem path: an exploded directory tree or a file within one
    Local(Utf8PathBuf),

    /// A location inside a packaged archive
    Archive {
        /// Path of the archive file
        archive: Utf8PathBuf,
        /// Entry name within the archive; empty for the archive root
        entry: String,
    },

    /// An ordered overlay; earlier members shadow later ones
    Collection(Vec<Resource>),
}

impl Resource {
    /// Resolve a locator into a resource
    ///
    /// Accepts plain paths, `file:` URIs and `jar:file:...!/entry` URIs.
    /// Percent-encoded URIs are decoded.
    pub fn from_locator(locator: &str) -> Result<Self> {
        if let Some(rest) = locator.strip_prefix("jar:") {
            let (archive_part, entry) = match rest.split_once("!/") {
                Some((archive_part, entry)) => (archive_part, entry),
                None => (rest.trim_end_matches('!'), ""),
            };
            return Ok(Resource::Archive {
                archive: locator_to_path(archive_part)?,
                entry: entry.to_string(),
            });
        }

        Ok(Resource::Local(locator_to_path(locator)?))
    }

    /// The root of a packaged archive
    pub fn archive_root(archive: impl Into<Utf8PathBuf>) -> Self {
        Resource::Archive {
            archive: archive.into(),
            entry: String::new(),
        }
    }

    /// Whether the resource exists
    pub fn exists(&self) -> bool {
        match self {
            Resource::Local(path) => path.exists(),
            Resource::Archive { archive, entry } => {
                if entry.is_empty() {
                    return archive::is_archive(archive);
                }
                let dir_prefix = dir_prefix(entry);
                archive_names(archive)
                    .iter()
                    .any(|name| name == entry || name.starts_with(&dir_prefix))
            }
            Resource::Collection(members) => members.iter().any(Resource::exists),
        }
    }

    /// Whether the resource is directory-like
    pub fn is_directory(&self) -> bool {
        match self {
            Resource::Local(path) => path.is_dir(),
            Resource::Archive { archive, entry } => {
                if entry.is_empty() {
                    return archive::is_archive(archive);
                }
                let dir_prefix = dir_prefix(entry);
                archive_names(archive)
                    .iter()
                    .any(|name| name.starts_with(&dir_prefix))
            }
            Resource::Collection(members) => members.iter().any(Resource::is_directory),
        }
    }

    /// Filesystem path backing this resource, if it has one
    pub fn local_path(&self) -> Option<&Utf8Path> {
        match self {
            Resource::Local(path) => Some(path),
            _ => None,
        }
    }

    /// Last modification time
    ///
    /// Archive entries report the archive's own time. A collection reports its
    /// first existing member.
    pub fn last_modified(&self) -> Option<SystemTime> {
        match self {
            Resource::Local(path) => modified(path),
            Resource::Archive { archive, .. } => modified(archive),
            Resource::Collection(members) => members
                .iter()
                .find(|member| member.exists())
                .and_then(Resource::last_modified),
        }
    }

    /// Immediate children, sorted, with directories suffixed by `/`
    pub fn list(&self) -> Result<Vec<String>> {
        match self {
            Resource::Local(path) => {
                if !path.is_dir() {
                    return Ok(Vec::new());
                }
                let mut names = Vec::new();
                for entry in path.read_dir_utf8()? {
                    let entry = entry?;
                    let mut name = entry.file_name().to_string();
                    if entry.file_type()?.is_dir() {
                        name.push('/');
                    }
                    names.push(name);
                }
                names.sort();
                Ok(names)
            }
            Resource::Archive { archive, entry } => {
                let prefix = if entry.is_empty() {
                    String::new()
                } else {
                    dir_prefix(entry)
                };
                let children: BTreeSet<String> = archive::entry_names(archive)?
                    .iter()
                    .filter_map(|name| name.strip_prefix(prefix.as_str()))
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| match rest.find('/') {
                        Some(slash) => rest[..=slash].to_string(),
                        None => rest.to_string(),
                    })
                    .collect();
                Ok(children.into_iter().collect())
            }
            Resource::Collection(members) => {
                let mut children = BTreeSet::new();
                for member in members.iter().filter(|member| member.exists()) {
                    children.extend(member.list()?);
                }
                Ok(children.into_iter().collect())
            }
        }
    }

    /// Descend into a relative path
    ///
    /// The returned resource may not exist. For a collection the result is the
    /// single existing match, an overlay of all matching directories, or the
    /// first member's (missing) child when nothing matches.
    pub fn add_path(&self, path: &str) -> Resource {
        let path = path.trim_start_matches('/');
        match self {
            Resource::Local(base) => {
                let relative = path.trim_end_matches('/');
                if relative.is_empty() {
                    Resource::Local(base.clone())
                } else {
                    Resource::Local(base.join(relative))
                }
            }
            Resource::Archive { archive, entry } => {
                let entry = if entry.is_empty() {
                    path.to_string()
                } else {
                    format!("{}{}", dir_prefix(entry), path)
                };
                Resource::Archive {
                    archive: archive.clone(),
                    entry,
                }
            }
            Resource::Collection(members) => {
                let candidates: Vec<Resource> =
                    members.iter().map(|member| member.add_path(path)).collect();
                let mut found: Vec<Resource> = candidates
                    .iter()
                    .filter(|candidate| candidate.exists())
                    .cloned()
                    .collect();

                match found.len() {
                    0 => candidates
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| Resource::Collection(Vec::new())),
                    1 => found.remove(0),
                    _ if found.iter().all(Resource::is_directory) => Resource::Collection(found),
                    _ => found.remove(0),
                }
            }
        }
    }

    /// Copy the content of this resource to `dest`
    ///
    /// Directories are copied recursively into `dest`; archive content is
    /// extracted; collections are copied last member first so earlier members
    /// win.
    pub fn copy_to(&self, dest: &Utf8Path) -> Result<()> {
        match self {
            Resource::Local(path) => {
                if path.is_dir() {
                    copy_dir_recursive(path, dest)
                } else {
                    if let Some(parent) = dest.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::copy(path, dest)?;
                    Ok(())
                }
            }
            Resource::Archive { archive, entry } => {
                let prefix = if entry.is_empty() {
                    String::new()
                } else {
                    dir_prefix(entry)
                };
                archive::extract(archive, &prefix, dest)
            }
            Resource::Collection(members) => {
                for member in members.iter().rev().filter(|member| member.exists()) {
                    member.copy_to(dest)?;
                }
                Ok(())
            }
        }
    }

    /// Canonical location when it differs from the configured one
    pub fn alias(&self) -> Option<Resource> {
        match self {
            Resource::Local(path) => {
                let canonical = path.canonicalize_utf8().ok()?;
                (canonical != *path).then_some(Resource::Local(canonical))
            }
            _ => None,
        }
    }

    /// URI form of this resource
    pub fn uri(&self) -> String {
        match self {
            Resource::Local(path) => {
                let url = if path.is_dir() {
                    Url::from_directory_path(path)
                } else {
                    Url::from_file_path(path)
                };
                url.map(String::from)
                    .unwrap_or_else(|()| format!("file:{}", path))
            }
            Resource::Archive { archive, entry } => {
                let archive_uri = Url::from_file_path(archive)
                    .map(String::from)
                    .unwrap_or_else(|()| format!("file:{}", archive));
                format!("jar:{}!/{}", archive_uri, entry)
            }
            Resource::Collection(members) => {
                let uris: Vec<String> = members.iter().map(Resource::uri).collect();
                format!("[{}]", uris.join(", "))
            }
        }
    }

    /// Decoded path form, as used for naming
    ///
    /// Directories end with `/` and archives carry a `!/` separator, matching
    /// the path component of [`Resource::uri`].
    pub fn decoded_path(&self) -> String {
        match self {
            Resource::Local(path) => {
                if path.is_dir() && !path.as_str().ends_with('/') {
                    format!("{}/", path)
                } else {
                    path.to_string()
                }
            }
            Resource::Archive { archive, entry } => format!("{}!/{}", archive, entry),
            Resource::Collection(members) => members
                .first()
                .map(Resource::decoded_path)
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Local(path) => write!(f, "{}", path),
            Resource::Archive { archive, entry } => write!(f, "jar:{}!/{}", archive, entry),
            Resource::Collection(members) => {
                let parts: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

fn locator_to_path(locator: &str) -> Result<Utf8PathBuf> {
    if !locator.starts_with("file:") {
        return Ok(Utf8PathBuf::from(locator));
    }

    let url = Url::parse(locator).map_err(|e| {
        Error::config(
            format!("Invalid artifact URI {}: {}", locator, e),
            "Use a plain path or a well-formed file: URI",
        )
    })?;
    let path = url.to_file_path().map_err(|()| {
        Error::config(
            format!("Artifact URI does not name a local file: {}", locator),
            "Use a plain path or a file: URI without a host component",
        )
    })?;
    to_utf8(path)
}

fn dir_prefix(entry: &str) -> String {
    if entry.ends_with('/') {
        entry.to_string()
    } else {
        format!("{}/", entry)
    }
}

fn archive_names(archive: &Utf8Path) -> Vec<String> {
    archive::entry_names(archive).unwrap_or_default()
}
