//! Packaged web application access
//!
//! Reading the archive format is delegated to the `zip` crate. This module only
//! maps entry names onto the filesystem and guards against entries that would
//! escape the destination directory.

use camino::{Utf8Component, Utf8Path};
use std::fs::File;
use zip::ZipArchive;

use crate::{Error, Result};

/// File name suffixes recognized as packaged web applications
pub const ARCHIVE_SUFFIXES: &[&str] = &[".war", ".jar", ".zip"];

/// Strip a recognized archive suffix (case-insensitive) from a file name
///
/// Returns `None` when the name does not end with one of [`ARCHIVE_SUFFIXES`]
/// or when nothing would be left after stripping.
pub fn strip_archive_suffix(name: &str) -> Option<&str> {
    let lower = name.to_ascii_lowercase();
    ARCHIVE_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|suffix| &name[..name.len() - suffix.len()])
        .filter(|stem| !stem.is_empty())
}

fn open(path: &Utf8Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(file)?)
}

/// Check whether a file can be opened as an archive
pub fn is_archive(path: &Utf8Path) -> bool {
    path.is_file() && open(path).is_ok()
}

/// List the entry names of an archive
///
/// Entries that cannot be read are skipped with a warning.
pub fn entry_names(path: &Utf8Path) -> Result<Vec<String>> {
    let mut archive = open(path)?;
    let mut names = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        match archive.by_index(index) {
            Ok(entry) => names.push(entry.name().to_string()),
            Err(e) => {
                tracing::warn!(
                    archive = %path,
                    index,
                    error = %e,
                    "Skipping unreadable archive entry"
                );
            }
        }
    }

    Ok(names)
}

/// Extract every entry under `prefix` into `dest`
///
/// `prefix` is an entry-name prefix such as `""` (whole archive) or
/// `"WEB-INF/lib/"`; it is stripped from the extracted paths.
pub fn extract(path: &Utf8Path, prefix: &str, dest: &Utf8Path) -> Result<()> {
    let mut archive = open(path)?;
    std::fs::create_dir_all(dest)?;

    let mut extracted = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;

        let Some(relative) = entry.name().strip_prefix(prefix) else {
            continue;
        };
        if relative.is_empty() {
            continue;
        }

        let relative = Utf8Path::new(relative);
        let is_enclosed = relative
            .components()
            .all(|c| matches!(c, Utf8Component::Normal(_)));
        if !is_enclosed {
            return Err(Error::archive(
                format!("Entry {} escapes the extraction directory", entry.name()),
                "The archive is malformed or malicious; rebuild it from trusted sources",
            ));
        }

        let target = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    tracing::debug!(archive = %path, prefix, dest = %dest, files = extracted, "Extracted archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_war(path: &Utf8Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, FileOptions::default()).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    fn utf8_root(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_strip_archive_suffix() {
        assert_eq!(strip_archive_suffix("myapp.war"), Some("myapp"));
        assert_eq!(strip_archive_suffix("MyApp.WAR"), Some("MyApp"));
        assert_eq!(strip_archive_suffix("lib.jar"), Some("lib"));
        assert_eq!(strip_archive_suffix("myapp"), None);
        assert_eq!(strip_archive_suffix(".war"), None);
    }

    #[test]
    fn test_entry_names_and_is_archive() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);
        let war = root.join("app.war");
        write_war(
            &war,
            &[("index.html", "<html/>"), ("WEB-INF/", ""), ("WEB-INF/web.xml", "<web-app/>")],
        );

        assert!(is_archive(&war));
        let names = entry_names(&war).unwrap();
        assert_eq!(names, vec!["index.html", "WEB-INF/", "WEB-INF/web.xml"]);

        let plain = root.join("plain.txt");
        std::fs::write(&plain, "not an archive").unwrap();
        assert!(!is_archive(&plain));
        assert!(!is_archive(&root));
    }

    #[test]
    fn test_extract_with_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_root(&temp_dir);
        let war = root.join("app.war");
        write_war(
            &war,
            &[
                ("index.html", "<html/>"),
                ("WEB-INF/lib/a.jar", "jar-a"),
                ("WEB-INF/classes/App.class", "class"),
            ],
        );

        let full = root.join("full");
        extract(&war, "", &full).unwrap();
        assert_eq!(std::fs::read_to_string(full.join("index.html")).unwrap(), "<html/>");
        assert!(full.join("WEB-INF/classes/App.class").is_file());

        let lib = root.join("lib");
        extract(&war, "WEB-INF/lib/", &lib).unwrap();
        assert_eq!(std::fs::read_to_string(lib.join("a.jar")).unwrap(), "jar-a");
        assert!(!lib.join("index.html").exists());
    }
}
