//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (agent.rs):
//!     Build components → Initial config load → Register → Spawn listener + heartbeat
//!
//! Shutdown (agent.rs, shutdown.rs):
//!     Signal received → Broadcast stop → Join loops → Deregister → Drop client
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then registration, then loops
//! - Ordered shutdown: stop loops before deregistering so no beat follows it
//! - Deregistration consumes the running agent, so it happens once

pub mod agent;
pub mod shutdown;
pub mod signals;

pub use agent::{RegistryAgent, RunningAgent};
pub use shutdown::Shutdown;
