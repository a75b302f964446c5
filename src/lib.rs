//! Release pipeline for the gauge system monitor.
//!
//! Given a single version tag, this crate drives parallel cross-platform
//! builds, collects their artifacts into a shared pool, and renders
//! per-ecosystem package manifests (installer script, AUR recipes, winget
//! manifest, Chocolatey script, Homebrew formula) by substituting version
//! numbers and content checksums into templates.
//!
//! It can be used as a CLI tool or as a library; the coordinator, the
//! release store, and the toolchain are all ordinary types with trait
//! seams where external collaborators plug in.

pub mod build;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod release;
pub mod report;
pub mod template;

// Re-export commonly used types
pub use error::{ReleaseError, Result};
