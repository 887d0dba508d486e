//! Version information for DevForge
//!
//! Git commit and build timestamp are injected by `build.rs`.

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (short form)
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");

/// Build timestamp (RFC3339 format)
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");

/// Version metadata as a struct
#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub version: &'static str,
    pub git_commit: &'static str,
    pub build_timestamp: &'static str,
}

impl VersionInfo {
    pub fn get() -> Self {
        Self {
            version: VERSION,
            git_commit: GIT_COMMIT,
            build_timestamp: BUILD_TIMESTAMP,
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DevForge v{} (commit {}, built {})",
            self.version, self.git_commit, self.build_timestamp
        )
    }
}
