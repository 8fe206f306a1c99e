//! Core types and shared functionality for reelcache.
//!
//! This crate provides:
//! - Versioned cache stores behind the `CacheStorage` trait (SQLite and in-memory)
//! - The manager lifecycle state machine and control messages
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod install;
pub mod lifecycle;
pub mod message;
pub mod version;

pub use cache::{CacheDb, CacheEntryMeta, CacheStorage, MemoryStorage};
pub use clients::{ClientId, ClientRegistry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{CachedRequest, CachedResponse};
pub use install::{InstallPolicy, PrecacheFailure, PrecacheOutcome};
pub use lifecycle::{Effect, Lifecycle, LifecycleEvent, Transition, WorkerState};
pub use message::ControlMessage;
pub use version::{CacheVersion, PrecacheManifest};
