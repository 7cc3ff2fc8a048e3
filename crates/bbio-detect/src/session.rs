//! Adapter session
//!
//! Drives the adapter's binary protocol over an exclusively owned link and
//! tracks the adapter mode. Every exchange checks its acknowledgement;
//! every mode change goes through [`AdapterMode::apply`] before any byte is
//! written, so an out-of-order request never reaches the wire.
//!
//! A session must end with [`AdapterSession::finish`], which returns the
//! adapter to its console and closes the link.

use std::time::Duration;

use bbio_protocol::command::{self, BBIO_BANNER};
use bbio_protocol::{
    AdapterCommand, AdapterMode, BaudCandidate, EncodeCommand, ProtocolError, Transition,
};
use tracing::{debug, info, trace, warn};

use crate::config::DetectConfig;
use crate::link::AdapterLink;

/// Timing and retry parameters of the protocol exchanges
#[derive(Debug, Clone, Copy)]
struct Timing {
    handshake_timeout: Duration,
    handshake_attempts: usize,
    trigger_settle: Duration,
    settle: Duration,
}

/// An adapter on a link, with its current mode
pub struct AdapterSession<L: AdapterLink> {
    link: L,
    mode: AdapterMode,
    candidate: Option<BaudCandidate>,
    timing: Timing,
    /// Tail of the bytes seen while waiting for the bridge exit banner
    exit_scan: Vec<u8>,
    finished: bool,
}

impl<L: AdapterLink> AdapterSession<L> {
    /// Take ownership of a link; the adapter is assumed to be in its console
    pub fn new(link: L, config: &DetectConfig) -> Self {
        Self {
            link,
            mode: AdapterMode::Console,
            candidate: None,
            timing: Timing {
                handshake_timeout: config.handshake_timeout,
                handshake_attempts: config.handshake_attempts,
                trigger_settle: config.trigger_settle,
                settle: config.settle,
            },
            exit_scan: Vec::new(),
            finished: false,
        }
    }

    /// Current adapter mode
    pub fn mode(&self) -> AdapterMode {
        self.mode
    }

    /// Rate the UART was last configured to
    pub fn candidate(&self) -> Option<BaudCandidate> {
        self.candidate
    }

    /// Lend the link out (terminal handoff)
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Enter binary bit-bang mode
    ///
    /// Sends one priming byte at a time and waits briefly for the banner,
    /// up to the configured number of attempts.
    pub async fn enter_binary_mode(&mut self) -> Result<(), ProtocolError> {
        let next = self.mode.apply(Transition::EnterBinary)?;
        debug!("Entering binary mode from {}", self.mode.name());

        let priming = AdapterCommand::EnterBinary.encode();
        let mut response = Vec::new();

        for attempt in 1..=self.timing.handshake_attempts {
            self.link.write(&priming).await?;
            let chunk = self
                .link
                .read(BBIO_BANNER.len(), self.timing.handshake_timeout)
                .await?;
            response.extend_from_slice(&chunk);

            if command::is_bbio_banner(&response) {
                trace!("Binary mode banner after {} priming bytes", attempt);
                self.link.drain().await?;
                self.mode = next;
                return Ok(());
            }
        }

        warn!(
            "No binary mode banner from {} after {} attempts",
            self.link.name(),
            self.timing.handshake_attempts
        );
        Err(ProtocolError::HandshakeFailed {
            attempts: self.timing.handshake_attempts,
        })
    }

    /// Select the UART submode
    pub async fn enter_uart_submode(&mut self) -> Result<(), ProtocolError> {
        let next = self.mode.apply(Transition::SelectUart)?;
        let cmd = AdapterCommand::SelectUart;

        self.link.write(&cmd.encode()).await?;
        let response = self.read_response(cmd.response_len()).await?;

        if !command::is_uart_banner(&response) {
            warn!("Unexpected UART mode answer: {:02X?}", response);
            return Err(ProtocolError::UnsupportedMode { response });
        }

        debug!("UART mode selected");
        self.mode = next;
        Ok(())
    }

    /// Configure the UART to a candidate rate
    ///
    /// Returns `false` when the adapter does not acknowledge the rate. That
    /// is an expected outcome, not a protocol fault.
    pub async fn set_baud(&mut self, candidate: BaudCandidate) -> Result<bool, ProtocolError> {
        let next = self.mode.apply(Transition::SetBaud)?;
        let cmd = AdapterCommand::SetBaud(candidate);

        self.link.write(&cmd.encode()).await?;
        let response = self.read_response(cmd.response_len()).await?;
        self.mode = next;

        if command::is_ack(&response) {
            info!("Switched to {}", candidate);
            self.candidate = Some(candidate);
            Ok(true)
        } else {
            warn!("Adapter refused {} (answered {:02X?})", candidate, response);
            Ok(false)
        }
    }

    /// Start the transparent bridge
    ///
    /// From here on, reads return target bytes and writes reach the target.
    pub async fn start_bridge(&mut self) -> Result<(), ProtocolError> {
        let next = self.mode.apply(Transition::StartBridge)?;
        self.link.write(&AdapterCommand::StartBridge.encode()).await?;
        self.exit_scan.clear();
        self.mode = next;
        debug!("UART bridge started");
        Ok(())
    }

    /// Read one byte from the bridged target
    pub async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, ProtocolError> {
        self.require_bridge()?;
        let chunk = self.link.read(1, timeout).await?;
        Ok(chunk.first().copied())
    }

    /// Send a wake-up sequence to a silent target
    ///
    /// The target usually echoes it; the echo is read back and discarded.
    pub async fn send_trigger(&mut self) -> Result<(), ProtocolError> {
        self.require_bridge()?;

        let cmd = AdapterCommand::Trigger;
        self.link.write(&cmd.encode()).await?;
        let echo = self.read_response(cmd.response_len()).await?;
        trace!("Discarded trigger echo {:02X?}", echo);
        tokio::time::sleep(self.timing.trigger_settle).await;
        Ok(())
    }

    /// Watch the link for the adapter leaving the bridge
    ///
    /// Performs one bounded read. Returns `true` once the banner the adapter
    /// prints after its button was pressed has been seen; the session is
    /// then back in binary mode with a clean receive buffer.
    pub async fn poll_bridge_exit(&mut self, timeout: Duration) -> Result<bool, ProtocolError> {
        let next = self.mode.apply(Transition::BridgeExited)?;

        let chunk = self.link.read(BBIO_BANNER.len(), timeout).await?;
        self.exit_scan.extend_from_slice(&chunk);
        if !command::is_bridge_exit(&self.exit_scan) {
            let keep = command::BBIO_BANNER_PREFIX.len() - 1;
            let excess = self.exit_scan.len().saturating_sub(keep);
            self.exit_scan.drain(..excess);
            return Ok(false);
        }

        debug!("Adapter left the bridge");
        self.exit_scan.clear();
        self.mode = next;

        // The adapter console needs a line ending before it settles
        self.link.write(command::TRIGGER).await?;
        tokio::time::sleep(self.timing.settle).await;
        self.link.drain().await?;
        Ok(true)
    }

    /// Return the adapter to its console and drain the link
    pub async fn reset_to_console(&mut self) -> Result<(), ProtocolError> {
        let next = self.mode.apply(Transition::Reset)?;
        if self.mode.is_transparent() {
            warn!("Resetting while bridged: the adapter button may be needed to release it");
        }

        info!("Resetting adapter to console mode");
        self.link
            .write(&AdapterCommand::ResetToConsole.encode())
            .await?;
        tokio::time::sleep(self.timing.settle).await;
        self.link.drain().await?;
        self.mode = next;
        self.candidate = None;
        Ok(())
    }

    /// Reset the adapter and close the link
    ///
    /// Runs exactly once per session, on every exit path. Failures are
    /// logged; there is nobody left to report them to.
    pub async fn finish(mut self) {
        if let Err(e) = self.reset_to_console().await {
            warn!("Failed to reset adapter: {}", e);
        }
        if let Err(e) = self.link.close().await {
            warn!("Failed to close {}: {}", self.link.name(), e);
        }
        self.finished = true;
    }

    fn require_bridge(&self) -> Result<(), ProtocolError> {
        if self.mode.is_transparent() {
            Ok(())
        } else {
            Err(ProtocolError::NotBridged { mode: self.mode })
        }
    }

    /// Read an answer of known length, stopping early on silence
    async fn read_response(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut response = Vec::with_capacity(len);
        while response.len() < len {
            let chunk = self
                .link
                .read(len - response.len(), self.timing.handshake_timeout)
                .await?;
            if chunk.is_empty() {
                break;
            }
            response.extend_from_slice(&chunk);
        }
        Ok(response)
    }
}

impl<L: AdapterLink> Drop for AdapterSession<L> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "Adapter session on {} dropped without reset (adapter left in {} mode)",
                self.link.name(),
                self.mode.name()
            );
        }
    }
}
