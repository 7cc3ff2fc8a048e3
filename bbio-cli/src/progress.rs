//! Live progress rendering of detection events

use std::io::Write as _;

use bbio_detect::classifier::describe;
use bbio_detect::{DetectEvent, FailureReason};
use tokio::sync::mpsc;

/// Turns events into console text
///
/// Received bytes are shown inline on the line of their candidate rate;
/// everything else gets a line of its own.
#[derive(Debug, Default)]
pub struct Progress {
    mid_line: bool,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to print for an event (may be empty)
    pub fn render(&mut self, event: &DetectEvent) -> String {
        let line = match event {
            DetectEvent::RunStarted { port } => format!("Scanning target behind {}", port),
            DetectEvent::CandidateStarted { rate } => format!("Trying {} baud", rate),
            DetectEvent::BridgeStarted { .. } => return self.inline("  "),
            DetectEvent::ByteReceived { byte, .. } => {
                return self.inline(&format!("{} ", describe(*byte)))
            }
            DetectEvent::TriggerSent { attempt, .. } => format!("  (trigger {})", attempt),
            DetectEvent::CandidateFailed { rate, reason } => match reason {
                FailureReason::RateRejected => format!("  {} baud refused by the adapter", rate),
                FailureReason::Timeout => format!("  nothing received at {} baud", rate),
                FailureReason::InvalidByte(b) => {
                    format!("  {} is not text, {} baud is wrong", describe(*b), rate)
                }
            },
            DetectEvent::ManualAdvanceRequested => return String::new(),
            DetectEvent::RateFound { rate } => format!("Valid baud rate found: {}", rate),
            DetectEvent::RunFinished => "Adapter reset to console".to_string(),
        };
        self.line(&line)
    }

    fn inline(&mut self, text: &str) -> String {
        self.mid_line = true;
        text.to_string()
    }

    fn line(&mut self, text: &str) -> String {
        let prefix = if self.mid_line { "\n" } else { "" };
        self.mid_line = false;
        format!("{}{}\n", prefix, text)
    }
}

/// Print events to stderr until the sender goes away
pub async fn print_events(mut rx: mpsc::UnboundedReceiver<DetectEvent>) {
    let mut progress = Progress::new();
    while let Some(event) = rx.recv().await {
        let text = progress.render(&event);
        if !text.is_empty() {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(text.as_bytes());
            let _ = stderr.flush();
        }
    }
}
