//! Build and version information.

use std::fmt;

use serde::Serialize;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version and build metadata.
///
/// `git_commit` and `build_date` come from the `GIT_COMMIT` and `BUILD_DATE`
/// environment variables at compile time and read `"unknown"` otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// Crate version.
    pub version: &'static str,
    /// Git commit hash.
    pub git_commit: &'static str,
    /// Build date.
    pub build_date: &'static str,
    /// `os/arch`.
    pub platform: String,
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MessageBus Client v{} (commit: {}, built: {}, platform: {})",
            self.version, self.git_commit, self.build_date, self.platform
        )
    }
}

/// Returns the version information of this build.
pub fn version() -> VersionInfo {
    VersionInfo {
        version: VERSION,
        git_commit: option_env!("GIT_COMMIT").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
    }
}

/// Short version string, e.g. `"v0.1.0"`.
pub fn version_string() -> String {
    format!("v{VERSION}")
}
