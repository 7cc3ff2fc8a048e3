//! Human-in-the-loop steps of a detection run
//!
//! Pressing the adapter button, answering a prompt and driving a terminal
//! session are all paced by the operator. The orchestrator only sees this
//! trait, so its decisions can be tested without a human.

use async_trait::async_trait;

use crate::error::DetectError;
use crate::link::AdapterLink;

/// Operator-facing capabilities used by the orchestrator
#[async_trait]
pub trait InteractionPort<L: AdapterLink>: Send {
    /// Ask a yes/no question
    async fn confirm(&mut self, prompt: &str) -> Result<bool, DetectError>;

    /// Ask the operator to press the adapter button
    ///
    /// The button takes the adapter out of the bridge and back to binary
    /// mode. Implementations return once the operator has been told; the
    /// orchestrator then watches the link for the adapter's banner.
    async fn await_manual_advance(&mut self) -> Result<(), DetectError>;

    /// Lend the bridged link to an interactive terminal at `rate`
    ///
    /// The orchestrator does not touch the link until this returns.
    async fn hand_off_to_terminal(&mut self, link: &mut L, rate: u32) -> Result<(), DetectError>;
}
