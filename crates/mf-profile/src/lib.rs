//! Encoding profiles.
//!
//! Profiles are loaded in bulk from a [`ProfileSource`] (TOML descriptors on
//! disk in production) into a [`ProfileRegistry`], which serves concurrent
//! lookups and swaps in a fresh snapshot on reload.

pub mod descriptor;
pub mod profile;
pub mod registry;

pub use descriptor::{ProfileSource, StaticProfileSource, TomlProfileSource};
pub use profile::{EncodingProfile, ProfileVariant};
pub use registry::ProfileRegistry;
