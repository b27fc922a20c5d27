//! Breakpoint injection bridge
//!
//! Breakpoints are textual: the target line is replaced by
//! `Stop '<original>` and put back on removal. All host calls run on one
//! worker thread owned by [`HostBridge`].

mod breakpoints;
mod bridge;
mod retry;

pub use breakpoints::{Breakpoint, BreakpointManager, BreakpointResult, DEFAULT_TIMEOUT};
pub use bridge::{BridgeError, BridgeOp, BridgeReply, HostBridge, STOP_PREFIX};
pub use retry::RetryPolicy;
