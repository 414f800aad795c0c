//! Skill readiness checking — supplemented plumbing (SPEC_FULL.md §4.I').
//!
//! Grounded on the teacher's `SkillManifest::check_readiness`
//! (`crates/skills/src/manifest.rs`): a skill's `requires` block is checked
//! against the current process (bins on `PATH`, env vars, os, arch) so the
//! dispatch resolver and any caller presenting skill candidates can avoid
//! recommending a skill that cannot actually run here. This does not
//! change the selector's scoring (spec §4.I's weights are untouched) — it
//! is a separate, additive signal a caller may consult before surfacing a
//! recommendation.

use sa_domain::skill::{InstallEntry, SkillRequirements};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SkillReadiness {
    pub status: ReadinessStatus,
    pub missing_bins: Vec<String>,
    pub missing_env: Vec<String>,
    pub os_supported: bool,
    pub arch_supported: bool,
    pub install_hints: Vec<InstallEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    Ready,
    MissingDeps,
    UnsupportedPlatform,
}

/// Check `requires`/`install` against the current process. Mirrors the
/// teacher's `check_readiness`: `os`/`arch` lists are "any of" matches,
/// empty means unconstrained, and install hints are filtered to entries
/// whose `provides` names a bin that's actually missing (an entry with no
/// `provides` is offered whenever any bin is missing).
pub fn check_readiness(requires: &SkillRequirements, install: &[InstallEntry]) -> SkillReadiness {
    let missing_bins: Vec<String> = requires.bins.iter().filter(|bin| !bin_exists(bin)).cloned().collect();
    let missing_env: Vec<String> = requires.env.iter().filter(|var| std::env::var(var).is_err()).cloned().collect();

    let os_supported = requires.os.is_empty() || requires.os.iter().any(|o| o == current_os());
    let arch_supported = requires.arch.is_empty() || requires.arch.iter().any(|a| a == current_arch());

    let install_hints: Vec<InstallEntry> = install
        .iter()
        .filter(|ie| {
            ie.provides
                .as_deref()
                .map(|p| missing_bins.iter().any(|b| b == p))
                .unwrap_or(!missing_bins.is_empty())
        })
        .cloned()
        .collect();

    let status = if !os_supported || !arch_supported {
        ReadinessStatus::UnsupportedPlatform
    } else if !missing_bins.is_empty() || !missing_env.is_empty() {
        ReadinessStatus::MissingDeps
    } else {
        ReadinessStatus::Ready
    };

    SkillReadiness { status, missing_bins, missing_env, os_supported, arch_supported, install_hints }
}

fn bin_exists(name: &str) -> bool {
    std::process::Command::new("sh")
        .args(["-c", &format!("command -v {name} >/dev/null 2>&1")])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn current_os() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else {
        "unknown"
    }
}

fn current_arch() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "x86_64"
    } else if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else {
        "unknown"
    }
}
