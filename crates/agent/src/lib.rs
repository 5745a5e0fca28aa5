// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! musterd library
//!
//! The agent daemon as a library: process-scoped services (task
//! supervisor, metrics sampler, stream hub, discovery responder,
//! request router) plus the lifecycle that wires them together. The
//! `musterd` binary is a thin shell over [`lifecycle::startup`]; the
//! end-to-end test suite drives the same services in-process.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod discovery;
pub mod env;
pub mod lifecycle;
pub mod probe;
pub mod router;
pub mod sampler;
pub mod storage;
pub mod streams;
pub mod subprocess;
pub mod supervisor;

pub use config::AgentConfig;
pub use lifecycle::{startup, startup_with_probe, AgentHandle, LifecycleError};
pub use probe::{FakeProbe, ProbeError, StatsProbe, SysinfoProbe};
pub use supervisor::TaskSupervisor;
