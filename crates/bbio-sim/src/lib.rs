//! Bridge Adapter Simulation Library
//!
//! This crate lets baud rate detection run end to end without an adapter or
//! a target on the bench. It includes:
//!
//! - **VirtualAdapter**: speaks the binary protocol and bridges to a target
//! - **VirtualTarget**: sends text or garbage depending on the bridge rate
//! - **ScriptedInteraction**: an operator that answers from a script
//!
//! # Example
//!
//! ```rust
//! use bbio_detect::{DetectionOrchestrator, DetectionResult};
//! use bbio_sim::{ScriptedInteraction, VirtualAdapter, VirtualTarget};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let target = VirtualTarget::silent().speaking(9600, "hello world, this is a test.\r\n");
//! let adapter = VirtualAdapter::new(target);
//! let operator = ScriptedInteraction::new(adapter.handle());
//!
//! let mut orchestrator = DetectionOrchestrator::new(operator);
//! assert_eq!(orchestrator.run(adapter).await, DetectionResult::Found(9600));
//! # });
//! ```

pub mod adapter;
pub mod interaction;
pub mod target;

pub use adapter::{VirtualAdapter, VirtualAdapterConfig, VirtualAdapterHandle};
pub use interaction::ScriptedInteraction;
pub use target::{RateScript, VirtualTarget, VirtualTargetConfig};
