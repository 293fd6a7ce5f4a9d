//! ---
//! pvz_section: "01-core-functionality"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Build metadata for version banners."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use serde::Serialize;

/// Compile-time version metadata captured via `vergen`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    /// Workspace semantic version.
    pub semver: String,
    /// Build timestamp from the compilation environment.
    pub build_timestamp: String,
    /// Target triple used for the build.
    pub target: String,
    /// Optimisation level the binary was compiled with.
    pub opt_level: String,
}

impl VersionInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
                .unwrap_or("UNKNOWN")
                .to_owned(),
            target: option_env!("VERGEN_CARGO_TARGET_TRIPLE")
                .unwrap_or("UNKNOWN")
                .to_owned(),
            opt_level: option_env!("VERGEN_CARGO_OPT_LEVEL")
                .unwrap_or("UNKNOWN")
                .to_owned(),
        }
    }

    /// Human readable banner used in logging surfaces.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("pvz-load v{}", self.semver)
    }

    /// Extended string containing build metadata suitable for `--version` flags.
    #[must_use]
    pub fn extended(&self) -> String {
        format!(
            "{banner}\nBuilt: {built}\nTarget: {target}\nOpt level: {opt}",
            banner = self.banner(),
            built = self.build_timestamp,
            target = self.target,
            opt = self.opt_level
        )
    }
}
