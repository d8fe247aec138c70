// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The boundary between the supervisor and whatever actually runs agent
//! processes. The real sandbox/container engine is out of scope here;
//! [`LocalProcessProvider`] is a reference implementation that launches
//! unsandboxed child processes directly, for development and for any
//! deployment that doesn't need process isolation.

use crate::mount::MountSpec;
use async_trait::async_trait;
use ctlplane_core::{CoreError, CoreResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

/// An opaque handle a provider hands back from [`IsolationProvider::prepare`]
/// and expects in [`IsolationProvider::launch`]. Providers that don't need
/// per-process preparation (like [`LocalProcessProvider`]) use it to carry
/// just the resolved working directory.
#[derive(Debug, Clone)]
pub struct MountHandle {
    pub id: u64,
    pub working_dir: PathBuf,
    pub spec: MountSpec,
}

/// A running (or just-exited) agent process as seen by its provider.
pub struct ProcessHandle {
    pub pid: Option<u32>,
    inner: ProcessInner,
}

enum ProcessInner {
    Local(Child),
}

/// Liveness/resource snapshot returned by [`IsolationProvider::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(i32),
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct Inspection {
    pub state: ProcessState,
    pub rss_bytes: Option<u64>,
}

/// Launch arguments: argv, environment, and working-directory override.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    pub argv: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Abstracts how an agent process comes to exist inside an isolated
/// filesystem view. Implementations may bind a directory directly (no
/// isolation), run inside a container, or proxy into a VM; none of that
/// is modeled here beyond this contract.
#[async_trait]
pub trait IsolationProvider: Send + Sync {
    /// Validate and prepare a mount, returning a handle later passed to
    /// `launch`. May be a no-op beyond validation for providers with no
    /// real sandboxing.
    async fn prepare(&self, spec: MountSpec) -> CoreResult<MountHandle>;

    /// Start a process inside the mount described by `handle`.
    async fn launch(&self, handle: &MountHandle, launch: LaunchSpec) -> CoreResult<ProcessHandle>;

    /// Request the process stop, escalating to a forced kill if it hasn't
    /// exited within `grace`.
    async fn stop(&self, process: &mut ProcessHandle, grace: Duration) -> CoreResult<ProcessState>;

    /// Point-in-time liveness/resource probe.
    async fn inspect(&self, process: &mut ProcessHandle) -> CoreResult<Inspection>;
}

/// Launches plain OS child processes directly against the mount's host
/// directory, with no sandboxing — a reference implementation and the
/// default for local development.
#[derive(Default)]
pub struct LocalProcessProvider {
    next_handle: AtomicU64,
}

impl LocalProcessProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IsolationProvider for LocalProcessProvider {
    async fn prepare(&self, spec: MountSpec) -> CoreResult<MountHandle> {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let working_dir = spec.source.clone();
        tracing::debug!(id, target = %spec.target.display(), "prepared local mount");
        Ok(MountHandle { id, working_dir, spec })
    }

    async fn launch(&self, handle: &MountHandle, launch: LaunchSpec) -> CoreResult<ProcessHandle> {
        let Some((program, args)) = launch.argv.split_first() else {
            return Err(CoreError::invalid_input("launch argv must not be empty"));
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&handle.working_dir)
            .envs(&launch.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = command
            .spawn()
            .map_err(|e| CoreError::internal(format!("failed to spawn {program}: {e}")))?;
        let pid = child.id();
        tracing::info!(pid, program = %program, "launched agent process");
        Ok(ProcessHandle { pid, inner: ProcessInner::Local(child) })
    }

    async fn stop(&self, process: &mut ProcessHandle, grace: Duration) -> CoreResult<ProcessState> {
        let ProcessInner::Local(child) = &mut process.inner;
        if let Some(pid) = process.pid {
            send_sigterm(pid);
        }
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => Ok(ProcessState::Exited(status.code().unwrap_or(-1))),
            Ok(Err(e)) => Err(CoreError::internal(format!("wait failed: {e}"))),
            Err(_) => {
                child
                    .kill()
                    .await
                    .map_err(|e| CoreError::internal(format!("kill failed: {e}")))?;
                let status = child
                    .wait()
                    .await
                    .map_err(|e| CoreError::internal(format!("wait after kill failed: {e}")))?;
                Ok(ProcessState::Exited(status.code().unwrap_or(-1)))
            }
        }
    }

    async fn inspect(&self, process: &mut ProcessHandle) -> CoreResult<Inspection> {
        let ProcessInner::Local(child) = &mut process.inner;
        match child.try_wait() {
            Ok(Some(status)) => Ok(Inspection {
                state: ProcessState::Exited(status.code().unwrap_or(-1)),
                rss_bytes: None,
            }),
            Ok(None) => Ok(Inspection { state: ProcessState::Running, rss_bytes: read_rss(process.pid) }),
            Err(e) => {
                tracing::warn!(error = %e, "inspect failed, reporting unknown state");
                Ok(Inspection { state: ProcessState::Unknown, rss_bytes: None })
            }
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    let pid = nix::unistd::Pid::from_raw(pid as i32);
    if let Err(e) = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM) {
        tracing::warn!(pid = pid.as_raw(), error = %e, "failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn send_sigterm(pid: u32) {
    let _ = pid;
}

#[cfg(target_os = "linux")]
fn read_rss(pid: Option<u32>) -> Option<u64> {
    let pid = pid?;
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn read_rss(_pid: Option<u32>) -> Option<u64> {
    None
}

impl ProcessHandle {
    pub fn stdin(&mut self) -> Option<&mut (dyn AsyncWrite + Send + Unpin)> {
        let ProcessInner::Local(child) = &mut self.inner;
        child.stdin.as_mut().map(|s| s as &mut (dyn AsyncWrite + Send + Unpin))
    }

    pub fn stdout(&mut self) -> Option<&mut (dyn AsyncRead + Send + Unpin)> {
        let ProcessInner::Local(child) = &mut self.inner;
        child.stdout.as_mut().map(|s| s as &mut (dyn AsyncRead + Send + Unpin))
    }

    pub fn stderr(&mut self) -> Option<&mut (dyn AsyncRead + Send + Unpin)> {
        let ProcessInner::Local(child) = &mut self.inner;
        child.stderr.as_mut().map(|s| s as &mut (dyn AsyncRead + Send + Unpin))
    }

    /// Takes ownership of the stdout/stderr pipes, leaving `None` behind.
    /// Lets a caller hand them to an independent reader task instead of
    /// holding the process's own lock for as long as the child runs —
    /// `wait`/`try_wait`/`kill` never touch these handles, so taking them
    /// doesn't disturb `stop`/`inspect`.
    pub fn take_stdio(&mut self) -> (Option<tokio::process::ChildStdout>, Option<tokio::process::ChildStderr>) {
        let ProcessInner::Local(child) = &mut self.inner;
        (child.stdout.take(), child.stderr.take())
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
