//! Registry client subsystem.
//!
//! # Data Flow
//! ```text
//! auth.rs (token cache) ← used lazily by every call below
//!
//! config_service.rs:
//!     GET document → fingerprint.rs → settings store (validate, swap)
//!     POST listener (long-poll with last fingerprint)
//!
//! listener.rs:   Waiting ⇄ Applying loop over config_service
//! instance.rs:   register / deregister / query / beat
//! heartbeat.rs:  fixed-cadence loop over instance beat
//! ```
//!
//! # Design Decisions
//! - One pooled `reqwest::Client` per registry, shared by all components
//! - Every call maps non-success statuses to a typed `RegistryError`
//! - Background loops never propagate errors; callers of one-shot
//!   operations decide retry policy

pub mod auth;
pub mod config_service;
pub mod error;
pub mod fingerprint;
pub mod heartbeat;
pub mod http;
pub mod instance;
pub mod listener;

pub use auth::{CachedToken, Clock, SystemClock, TokenManager};
#[cfg(any(test, feature = "test-util"))]
pub use auth::ManualClock;
pub use config_service::{watch_key, ConfigDocument, ConfigService};
pub use error::{HttpStatusError, RegistryError, RegistryResult};
pub use fingerprint::fingerprint;
pub use heartbeat::{Beater, Heartbeat};
pub use http::RegistryHttp;
pub use instance::{BeatInfo, InstanceDescriptor, InstanceDetail, InstanceManager};
pub use listener::{ChangeListener, ChangeSource};
