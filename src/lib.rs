//! SprintSaaS storefront query cache
//!
//! A two-layer read-through cache (memory plus a durable mirror) that reports
//! staleness instead of dropping expired results, with an optional coordinator
//! that serves stale data while refreshing it in the background.

pub mod cache;
pub mod cli;
pub mod refresh;
