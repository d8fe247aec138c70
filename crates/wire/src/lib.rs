// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire DTOs for the stream fan-out hub.
//!
//! Wire format: WebSocket JSON text frames, one value per frame. No framing
//! envelope of its own — transport-level message boundaries are the frame
//! boundaries.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod event;

pub use event::{ControlMessage, OutboundMessage, StreamEvent, StreamKind, TerminalStatus};
