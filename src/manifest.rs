//! Describing what an installation created.
//!
//! In order to ensure user files and directories are never removed
//! inadvertently, the installer records every directory it created and every
//! file it wrote in a manifest stored on disk. The uninstaller consults it
//! before deleting anything.
//!
//! ## Default file locations
//!
//! The disk manifest is stored inside the application data directory as
//! `install-manifest.ron`. See [`crate::path`] for the data directory
//! locations.
//!

pub use self::discovery::*;
pub use self::disk::*;
pub use self::id::*;

mod discovery;
mod disk;
mod id;
