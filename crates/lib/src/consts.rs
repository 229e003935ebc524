//! Crate-wide constants.

/// Application name used for cache/data directories.
pub const APP_NAME: &str = "nativeforge";

/// Length of truncated object hashes used for fingerprints and store paths.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Marker file written into a package directory once it is completely packaged.
pub const PACKAGE_COMPLETE_MARKER: &str = ".nativeforge-complete";

/// Artifact index file at the root of the artifact store.
pub const INDEX_FILENAME: &str = "index.json";

/// Current on-disk format version of the artifact index.
pub const INDEX_VERSION: u32 = 1;

/// Default configuration file name.
pub const CONFIG_FILENAME: &str = "forge.toml";
