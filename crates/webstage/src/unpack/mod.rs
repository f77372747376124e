//! Artifact materialization
//!
//! This module provides:
//! - Unpacking: deciding whether the artifact is used in place, copied, or
//!   extracted into the deployment's temp directory
//! - WEB-INF synthesis: a private copy of `WEB-INF/lib` and `WEB-INF/classes`
//!   placed ahead of the artifact in lookup order

mod unpacker;
mod web_inf;

pub use unpacker::{ArtifactUnpacker, UnpackAction};

/// Directory under the temp directory holding the extracted or copied artifact
pub const WEBAPP_DIR_NAME: &str = "webapp";

/// Directory under the temp directory holding the synthesized `WEB-INF`
pub const WEBINF_DIR_NAME: &str = "webinf";
