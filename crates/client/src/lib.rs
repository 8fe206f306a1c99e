//! Client code for reelcache.
//!
//! This crate provides the network seam with its reqwest implementation and
//! the offline cache manager that combines it with a cache store.

pub mod fetch;
pub mod manager;

pub use fetch::{FetchClient, FetchConfig, Network, canonicalize, resolve};
pub use manager::{
    ActivationReport, Intercepted, LifecycleReport, ManagerConfig, OfflineCacheManager, ResponseSource,
};
