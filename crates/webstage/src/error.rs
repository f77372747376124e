//! Error types for webstage

// This warning is a false positive from thiserror macro expansion
#![allow(unused_assignments)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for webstage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for webstage
///
/// Non-fatal conditions (an uncreatable temp directory, an unreadable archive
/// entry, a failed teardown) are never represented here. They are logged with
/// `tracing::warn!` and processing continues.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Archive could not be opened or read
    #[error("Failed to read archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Invalid jar inclusion pattern
    #[error("Invalid jar pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[help]
        help: String,
    },

    /// Archive error
    #[error("Archive error: {message}")]
    Archive {
        message: String,
        #[help]
        help: String,
    },

    /// Deploy error
    #[error("Deploy error: {message}")]
    Deploy {
        message: String,
        #[help]
        help: String,
    },

    /// The deployable artifact did not resolve to an existing directory
    #[error("Web application not found: {locator}")]
    #[diagnostic(help(
        "Check that the artifact path exists and is a directory or a readable archive"
    ))]
    DeployNotFound {
        /// The locator as originally configured
        locator: String,
    },

    /// No usable work directory could be established
    #[error("Unable to establish work directory: {path}")]
    #[diagnostic(help(
        "Create a writable `work` directory under the host root or set unpack.base_temp_dir"
    ))]
    WorkDirectoryUnavailable {
        /// The last candidate that was tried
        path: Utf8PathBuf,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create an archive error
    pub fn archive(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a deploy error
    pub fn deploy(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Deploy {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a deploy-not-found error
    pub fn deploy_not_found(locator: impl Into<String>) -> Self {
        Self::DeployNotFound {
            locator: locator.into(),
        }
    }

    /// Create a work-directory-unavailable error
    pub fn work_directory_unavailable(path: impl Into<Utf8PathBuf>) -> Self {
        Self::WorkDirectoryUnavailable { path: path.into() }
    }
}
