//! Build identification
//!
//! Everything here is resolved at compile time by `build.rs`.

use std::fmt;

/// Identifies the exact build of this binary
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub build_timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc_version: &'static str,
    dirty: &'static str,
}

/// The build info for this compilation
pub const BUILD_INFO: BuildInfo = BuildInfo {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
    git_hash: env!("INGEST_WATCH_GIT_HASH"),
    git_branch: env!("INGEST_WATCH_GIT_BRANCH"),
    build_timestamp: env!("INGEST_WATCH_BUILD_TIMESTAMP"),
    target: env!("INGEST_WATCH_TARGET"),
    profile: env!("INGEST_WATCH_PROFILE"),
    rustc_version: env!("INGEST_WATCH_RUSTC_VERSION"),
    dirty: env!("INGEST_WATCH_GIT_DIRTY"),
};

impl BuildInfo {
    /// True when the working tree had uncommitted changes at build time
    pub fn git_dirty(&self) -> bool {
        self.dirty == "true"
    }

    /// Version plus commit, e.g. `0.1.0-9f3c21aa` or `0.1.0-9f3c21aa-dirty`
    pub fn full_version(&self) -> String {
        let suffix = if self.git_dirty() { "-dirty" } else { "" };
        format!("{}-{}{}", self.version, self.git_hash, suffix)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "Build Information:")?;
        writeln!(f, "  Git Hash:   {}", self.git_hash)?;
        writeln!(f, "  Git Branch: {}", self.git_branch)?;
        writeln!(f, "  Built:      {}", self.build_timestamp)?;
        writeln!(f, "  Target:     {}", self.target)?;
        writeln!(f, "  Profile:    {}", self.profile)?;
        writeln!(f, "  Rustc:      {}", self.rustc_version)
    }
}

/// Get the current build info
pub fn build_info() -> BuildInfo {
    BUILD_INFO
}

/// Print the full version block to stdout
pub fn print_version() {
    println!("{}", BUILD_INFO);
}
