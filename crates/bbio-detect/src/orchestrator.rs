//! Detection orchestrator
//!
//! Walks the candidate rates in order. For each rate it configures the
//! adapter, opens the bridge and feeds every received byte to the
//! classifier:
//!
//! - a garbage byte abandons the rate;
//! - silence either triggers the target (when enabled, up to a limit) or
//!   abandons the rate;
//! - a confirmed window ends the scan.
//!
//! Abandoning a rate needs the operator to press the adapter button, which
//! ends the bridge. A confirmed rate is offered for a terminal session.
//! Whatever happens, the adapter session is finished (reset to console and
//! closed) before the result is returned.

use std::future::Future;

use bbio_protocol::{BaudCandidate, ProtocolError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::Cancellation;
use crate::classifier::{classify, describe, Category, ClassificationWindow};
use crate::config::DetectConfig;
use crate::error::DetectError;
use crate::events::{DetectEvent, FailureReason};
use crate::interaction::InteractionPort;
use crate::link::AdapterLink;
use crate::session::AdapterSession;

/// Terminal outcome of a detection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResult {
    /// Text was confirmed at this rate
    Found(u32),
    /// Every candidate was tried without confirmation
    Exhausted,
    /// The operator aborted the run
    Cancelled,
    /// The adapter stopped speaking its protocol
    Fatal(ProtocolError),
}

/// Outcome of listening at one candidate rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Confirmed,
    RateRejected,
    Timeout,
    InvalidByte(u8),
}

/// Why a run stopped before running out of candidates
#[derive(Debug)]
enum Stop {
    Cancelled,
    Fatal(ProtocolError),
    Interaction(DetectError),
}

impl From<ProtocolError> for Stop {
    fn from(err: ProtocolError) -> Self {
        Stop::Fatal(err)
    }
}

impl From<DetectError> for Stop {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::Protocol(e) => Stop::Fatal(e),
            other => Stop::Interaction(other),
        }
    }
}

/// Race a blocking step against the cancellation signal
async fn race<F, T, E>(cancel: &mut Cancellation, step: F) -> Result<T, Stop>
where
    F: Future<Output = Result<T, E>>,
    Stop: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Stop::Cancelled),
        result = step => result.map_err(Stop::from),
    }
}

/// Drives a detection run over one adapter
pub struct DetectionOrchestrator<P> {
    config: DetectConfig,
    port: P,
    cancel: Cancellation,
    events: Option<mpsc::UnboundedSender<DetectEvent>>,
}

impl<P> DetectionOrchestrator<P> {
    /// Create an orchestrator with default configuration
    pub fn new(port: P) -> Self {
        Self::with_config(DetectConfig::default(), port)
    }

    /// Create an orchestrator with custom configuration
    pub fn with_config(config: DetectConfig, port: P) -> Self {
        Self {
            config,
            port,
            cancel: Cancellation::never(),
            events: None,
        }
    }

    /// Observe this cancellation signal during the run
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Emit progress events on this channel
    pub fn with_events(mut self, events: mpsc::UnboundedSender<DetectEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Give back the interaction port
    pub fn into_port(self) -> P {
        self.port
    }

    fn emit(&self, event: DetectEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn check_cancelled(&self) -> Result<(), Stop> {
        if self.cancel.is_cancelled() {
            Err(Stop::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run detection over a link
    ///
    /// The link is owned for the whole run and closed before returning; the
    /// adapter is reset to its console exactly once, whatever the outcome.
    pub async fn run<L>(&mut self, link: L) -> DetectionResult
    where
        L: AdapterLink,
        P: InteractionPort<L>,
    {
        info!("Starting baud rate detection on {}", link.name());
        self.emit(DetectEvent::RunStarted {
            port: link.name().to_string(),
        });

        let mut session = AdapterSession::new(link, &self.config);

        let result = match self.scan(&mut session).await {
            Ok(Some(rate)) => DetectionResult::Found(rate),
            Ok(None) => {
                info!("No candidate rate produced readable text");
                DetectionResult::Exhausted
            }
            Err(Stop::Cancelled) => {
                info!("Detection cancelled");
                DetectionResult::Cancelled
            }
            Err(Stop::Interaction(e)) => {
                warn!("Lost the operator ({}), treating as cancellation", e);
                DetectionResult::Cancelled
            }
            Err(Stop::Fatal(e)) => {
                warn!("Adapter protocol fault: {}", e);
                DetectionResult::Fatal(e)
            }
        };

        session.finish().await;
        self.emit(DetectEvent::RunFinished);
        result
    }

    async fn scan<L>(&mut self, session: &mut AdapterSession<L>) -> Result<Option<u32>, Stop>
    where
        L: AdapterLink,
        P: InteractionPort<L>,
    {
        let candidates = self.config.candidates.clone();

        for candidate in candidates {
            self.check_cancelled()?;
            self.emit(DetectEvent::CandidateStarted {
                rate: candidate.rate,
            });

            let outcome = self.try_candidate(session, candidate).await?;
            if outcome == CandidateOutcome::Confirmed {
                info!("Valid baud rate found: {}", candidate.rate);
                self.emit(DetectEvent::RateFound {
                    rate: candidate.rate,
                });
                match self.offer_terminal(session, candidate).await {
                    Err(Stop::Interaction(e)) => {
                        warn!("Lost the operator after finding {} baud: {}", candidate.rate, e);
                    }
                    other => other?,
                }
                return Ok(Some(candidate.rate));
            }

            let reason = match outcome {
                CandidateOutcome::RateRejected => FailureReason::RateRejected,
                CandidateOutcome::InvalidByte(b) => FailureReason::InvalidByte(b),
                _ => FailureReason::Timeout,
            };
            debug!("Abandoning {} ({:?})", candidate, reason);
            self.emit(DetectEvent::CandidateFailed {
                rate: candidate.rate,
                reason,
            });
            self.manual_advance(session).await?;
        }

        Ok(None)
    }

    /// Configure one rate and listen to the target
    async fn try_candidate<L>(
        &mut self,
        session: &mut AdapterSession<L>,
        candidate: BaudCandidate,
    ) -> Result<CandidateOutcome, Stop>
    where
        L: AdapterLink,
    {
        race(&mut self.cancel, session.enter_binary_mode()).await?;
        race(&mut self.cancel, session.enter_uart_submode()).await?;

        if !race(&mut self.cancel, session.set_baud(candidate)).await? {
            return Ok(CandidateOutcome::RateRejected);
        }

        race(&mut self.cancel, session.start_bridge()).await?;
        self.emit(DetectEvent::BridgeStarted {
            rate: candidate.rate,
        });

        self.listen(session, candidate).await
    }

    /// Classify bridged bytes until the rate is confirmed or abandoned
    async fn listen<L>(
        &mut self,
        session: &mut AdapterSession<L>,
        candidate: BaudCandidate,
    ) -> Result<CandidateOutcome, Stop>
    where
        L: AdapterLink,
    {
        let rate = candidate.rate;
        let read_timeout = self.config.read_timeout;
        let mut window = ClassificationWindow::new();
        let mut triggers = 0;

        loop {
            let byte = race(&mut self.cancel, session.read_byte(read_timeout)).await?;

            match byte {
                Some(byte) => {
                    self.emit(DetectEvent::ByteReceived { rate, byte });
                    let category = classify(byte);
                    window = window.observe(category);

                    if category == Category::Invalid {
                        debug!("Invalid byte {} at {} baud", describe(byte), rate);
                        return Ok(CandidateOutcome::InvalidByte(byte));
                    }
                    if window.is_confirmed() {
                        debug!("Window confirmed at {} baud: {:?}", rate, window);
                        return Ok(CandidateOutcome::Confirmed);
                    }
                }
                None if self.config.trigger && triggers < self.config.max_triggers => {
                    triggers += 1;
                    info!("Triggering the target ({}/{})", triggers, self.config.max_triggers);
                    self.emit(DetectEvent::TriggerSent {
                        rate,
                        attempt: triggers,
                    });
                    race(&mut self.cancel, session.send_trigger()).await?;
                }
                None => {
                    debug!("Nothing received at {} baud", rate);
                    return Ok(CandidateOutcome::Timeout);
                }
            }
        }
    }

    /// Have the operator press the adapter button and wait for the bridge to end
    async fn manual_advance<L>(&mut self, session: &mut AdapterSession<L>) -> Result<(), Stop>
    where
        L: AdapterLink,
        P: InteractionPort<L>,
    {
        self.check_cancelled()?;
        info!("Press the adapter button to continue");
        self.emit(DetectEvent::ManualAdvanceRequested);
        race(&mut self.cancel, self.port.await_manual_advance()).await?;

        let poll = self.config.read_timeout;
        while session.mode().is_transparent() {
            race(&mut self.cancel, session.poll_bridge_exit(poll)).await?;
        }
        Ok(())
    }

    /// Offer a terminal at the confirmed rate, then take the adapter back
    async fn offer_terminal<L>(
        &mut self,
        session: &mut AdapterSession<L>,
        candidate: BaudCandidate,
    ) -> Result<(), Stop>
    where
        L: AdapterLink,
        P: InteractionPort<L>,
    {
        let prompt = format!(
            "Would you like to open a terminal session at {} baud?",
            candidate.rate
        );
        let accepted = race(&mut self.cancel, self.port.confirm(&prompt)).await?;

        if accepted {
            info!("Handing the link to a terminal at {} baud", candidate.rate);
            race(
                &mut self.cancel,
                self.port
                    .hand_off_to_terminal(session.link_mut(), candidate.rate),
            )
            .await?;
        }

        self.manual_advance(session).await?;
        race(&mut self.cancel, session.enter_binary_mode()).await?;
        Ok(())
    }
}
