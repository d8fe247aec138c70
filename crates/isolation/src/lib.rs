// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Isolation binding: validates workspace mounts and launches agent
//! processes behind a provider-agnostic [`provider::IsolationProvider`]
//! trait. The actual sandbox/container engine is out of scope; this crate
//! only defines the boundary and ships a local, unsandboxed reference
//! implementation.

pub mod mount;
pub mod provider;
pub mod watcher;

pub use mount::{MountPolicy, MountSpec, SyncMode};
pub use provider::{
    Inspection, IsolationProvider, LaunchSpec, LocalProcessProvider, MountHandle, ProcessHandle,
    ProcessState,
};
pub use watcher::{Change, ChangeKind, Watcher, WatcherConfig};
