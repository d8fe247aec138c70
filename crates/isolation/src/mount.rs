// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translates a workspace's host `project_path` into a sandbox [`MountSpec`],
//! rejecting paths that would expose anything sensitive on the host.

use ctlplane_core::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Host paths (and prefixes) a workspace project path must never resolve
/// into, on either side of a symlink.
const DENY_LIST: &[&str] = &[
    "/", "/etc", "/usr", "/bin", "/sbin", "/boot", "/sys", "/proc", "/dev", "/root",
    "/var/run", "/run",
];

#[cfg(windows)]
const WINDOWS_DENY_LIST: &[&str] = &["C:\\Windows", "C:\\Program Files", "C:\\System Volume Information"];

fn is_denied(path: &Path) -> bool {
    let owned = path.to_string_lossy();
    let s: &str = &owned;
    if DENY_LIST.iter().any(|deny| s == *deny) {
        return true;
    }
    // Component-wise containment, not string prefix: "/etc" must deny
    // "/etc/cron.d" but "/" is excluded here since every absolute path
    // would otherwise match it.
    if DENY_LIST.iter().any(|deny| *deny != "/" && path.starts_with(deny)) {
        return true;
    }
    #[cfg(windows)]
    {
        if WINDOWS_DENY_LIST.iter().any(|deny| s.starts_with(deny)) {
            return true;
        }
    }
    false
}

/// Validate a host path as a workspace mount source: it must exist, be a
/// directory, be readable, and resolve (after symlinks) to something
/// outside the deny list. Returns the canonicalized path on success.
pub fn validate_source(path: &Path) -> CoreResult<PathBuf> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CoreError::invalid_input(format!("{} is not accessible: {e}", path.display())))?;
    if !metadata.is_dir() {
        return Err(CoreError::invalid_input(format!("{} is not a directory", path.display())));
    }
    if is_denied(path) {
        return Err(CoreError::invalid_input(format!("{} is not permitted as a workspace root", path.display())));
    }
    let real = std::fs::canonicalize(path)
        .map_err(|e| CoreError::invalid_input(format!("failed to resolve {}: {e}", path.display())))?;
    if is_denied(&real) {
        return Err(CoreError::invalid_input(format!("{} resolves to a denied path", real.display())));
    }
    Ok(real)
}

/// Validate the in-sandbox target path does not collide with a sensitive
/// mount point.
pub fn validate_target(target: &Path) -> CoreResult<()> {
    if is_denied(target) {
        return Err(CoreError::invalid_input(format!("{} is not a permitted mount target", target.display())));
    }
    Ok(())
}

/// A filesystem synchronization-consistency hint, chosen from the host
/// filesystem type. Meaningful to isolation providers that proxy a host
/// directory into a VM or remote sandbox; ignored by providers that bind
/// the directory directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Native,
    Cached,
    Delegated,
}

impl Default for SyncMode {
    fn default() -> Self {
        SyncMode::Native
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MountPolicy {
    pub no_exec: bool,
    pub no_suid: bool,
    pub no_dev: bool,
}

impl MountPolicy {
    pub fn default_policy() -> Self {
        Self { no_exec: false, no_suid: true, no_dev: true }
    }
}

/// A fully validated mount request, ready to hand to an [`crate::provider::IsolationProvider`].
#[derive(Debug, Clone)]
pub struct MountSpec {
    pub source: PathBuf,
    pub target: PathBuf,
    pub read_only: bool,
    pub uid: u32,
    pub gid: u32,
    pub policy: MountPolicy,
    pub sync_mode: SyncMode,
    pub exclude_patterns: Vec<String>,
    pub include_patterns: Vec<String>,
}

/// Default directories excluded from a watcher scan and (where the provider
/// honors it) from the mount itself.
pub fn default_excludes() -> Vec<String> {
    vec![
        ".git".into(),
        "node_modules".into(),
        "target".into(),
        ".venv".into(),
        "__pycache__".into(),
        ".idea".into(),
        ".vscode".into(),
        "dist".into(),
        "build".into(),
    ]
}

impl MountSpec {
    /// Build a validated mount spec for `source`. `target` defaults to
    /// `/workspace` when `None`.
    pub fn new(source: &Path, target: Option<PathBuf>) -> CoreResult<Self> {
        let source = validate_source(source)?;
        let target = target.unwrap_or_else(|| PathBuf::from("/workspace"));
        validate_target(&target)?;
        Ok(Self {
            source,
            target,
            read_only: false,
            uid: 1000,
            gid: 1000,
            policy: MountPolicy::default_policy(),
            sync_mode: SyncMode::default(),
            exclude_patterns: default_excludes(),
            include_patterns: Vec::new(),
        })
    }
}

#[cfg(test)]
#[path = "mount_tests.rs"]
mod tests;
