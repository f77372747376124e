//! webstage - staging of hosted web application deployments
//!
//! This crate provides both a library and CLI for webstage, including:
//! - Work directory resolution and per-deployment temp directory naming
//! - Resource handles over directories, packaged archives and overlays
//! - Artifact unpacking (in place, copy, extraction, sibling reuse)
//! - WEB-INF synthesis, jar selection and classpath wiring
//! - Deployment lifecycle and teardown
//! - Configuration file parsing and merging

pub mod archive;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod naming;
pub mod resource;
pub mod unpack;
pub mod utils;
pub mod workdir;

pub use error::{Error, Result};
