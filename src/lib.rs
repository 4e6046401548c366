// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! # kaflow - declarative Kafka pipeline orchestrator
//!
//! `kaflow` turns a YAML list of components (Helm apps, streams-bootstrap
//! streams and producer apps, Kafka Connect connectors) into a resolved
//! pipeline and reconciles it with a cluster.
//!
//! ## Quick Start
//!
//! ```bash
//! # Print the resolved pipeline
//! kaflow generate pipelines/orders
//!
//! # Show what a deploy would change, then apply it
//! kaflow deploy pipelines/orders
//! kaflow deploy pipelines/orders --execute
//!
//! # Tear it down including topics and schemas
//! kaflow clean pipelines/orders --execute
//! ```

pub mod cli;
pub mod clients;
pub mod components;
pub mod config;
pub mod defaults;
pub mod diff;
pub mod errors;
pub mod handlers;
pub mod helm;
pub mod pipeline;
pub mod registry;
pub mod utils;

// Re-export commonly used types
pub use components::Component;
pub use config::KaflowConfig;
pub use errors::{KaflowError, KaflowResult};
pub use pipeline::{load_pipeline, Pipeline};
pub use registry::Registry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
