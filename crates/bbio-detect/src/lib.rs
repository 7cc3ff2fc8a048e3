//! Baud Rate Detection Library
//!
//! This crate finds the baud rate of an unknown UART target reached through
//! a binary-mode bridge adapter. It tries a fixed list of rates, bridges the
//! target at each one and scores what comes back for readable text.
//!
//! # Architecture
//!
//! - [`classifier`]: pure byte classification and the evidence window
//! - [`session`]: the adapter protocol driven over an [`AdapterLink`]
//! - [`orchestrator`]: the per-rate retry / trigger / advance policy
//! - [`interaction`]: operator steps (button presses, prompts, terminal)
//!
//! # Example
//!
//! ```rust,no_run
//! use bbio_detect::{DetectionOrchestrator, DetectionResult, InteractionPort, SerialLink};
//!
//! # async fn run<P: InteractionPort<SerialLink>>(port: P) -> Result<(), bbio_detect::DetectError> {
//! let link = SerialLink::open("/dev/ttyACM0")?;
//! let mut orchestrator = DetectionOrchestrator::new(port);
//!
//! if let DetectionResult::Found(rate) = orchestrator.run(link).await {
//!     println!("Target speaks {} baud", rate);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod interaction;
pub mod link;
pub mod orchestrator;
pub mod scanner;
pub mod session;
pub mod usb_ids;

pub use cancel::{CancelHandle, Cancellation};
pub use classifier::{classify, Category, ClassificationWindow, ValidCharacterSet};
pub use config::DetectConfig;
pub use error::DetectError;
pub use events::{DetectEvent, FailureReason};
pub use interaction::InteractionPort;
pub use link::{AdapterLink, SerialLink, StreamLink};
pub use orchestrator::{CandidateOutcome, DetectionOrchestrator, DetectionResult};
pub use scanner::{PortScanner, SerialPortInfo};
pub use session::AdapterSession;
