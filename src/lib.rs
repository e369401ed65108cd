//! # rtlgen-client
//!
//! Async client library for AI-assisted RTL generation services.
//!
//! ## Design Philosophy
//!
//! rtlgen-client is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Sensible defaults** - Works out of the box against a local backend
//! - **Lifecycle-safe** - Polling is explicitly started and stopped; stale
//!   responses are discarded, never applied
//! - **Snapshot-consistent** - Observers only ever read fully-formed state
//!
//! ## Quick Start
//!
//! ```no_run
//! use rtlgen_client::{Config, GenerationClient, TaskMonitor};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = GenerationClient::new(&config)?;
//!
//!     // Submit a prompt and monitor the resulting task
//!     let handle = client.submit_prompt("32-bit pipelined ALU").await?;
//!     let monitor = TaskMonitor::new(Arc::new(client.clone()), &config);
//!     monitor.start(handle.clone());
//!
//!     // Watch snapshot updates
//!     let mut updates = monitor.subscribe();
//!     while updates.changed().await.is_ok() {
//!         let snapshot = updates.borrow().clone();
//!         println!("{:?} {}%", snapshot.status, snapshot.progress);
//!         if snapshot.status.is_terminal() {
//!             break;
//!         }
//!     }
//!
//!     monitor.stop();
//!     let result = client.fetch_result(&handle).await?;
//!     println!("{}", result.output);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Ephemeral artifact handles for viewing/downloading uploaded files
pub mod artifact;
/// One-shot REST operations against the generation backend
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Polling lifecycle for in-flight generation tasks
pub mod monitor;
/// Upload package assembly and validation
pub mod package;
/// Polling seam between the monitor and the backend
pub mod poller;
/// Persistence seam for the current upload package
pub mod store;
/// Core types
pub mod types;

// Re-export commonly used types
pub use artifact::{ArtifactHandle, ArtifactResolver};
pub use client::{BackendHealth, GeneratedOutput, GenerationClient, UploadReceipt};
pub use config::Config;
pub use error::{Error, Result, ValidationError};
pub use monitor::TaskMonitor;
pub use package::{UploadPackage, UploadTreeBuilder};
pub use poller::{LogsUpdate, StatusUpdate, TaskPoller};
pub use store::{JsonFileStore, MemoryStore, PackageStore};
pub use types::{CategoryKey, FileRef, TaskHandle, TaskId, TaskSnapshot, TaskStatus};
