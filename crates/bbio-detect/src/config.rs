//! Detection run configuration

use std::time::Duration;

use bbio_protocol::command::DEFAULT_HANDSHAKE_ATTEMPTS;
use bbio_protocol::{BaudCandidate, CANDIDATES};

/// Configuration for a detection run
#[derive(Debug, Clone)]
pub struct DetectConfig {
    /// How long to wait for each byte from the target
    pub read_timeout: Duration,
    /// How long to wait for each adapter acknowledgement
    pub handshake_timeout: Duration,
    /// Priming bytes sent before binary mode entry is declared failed
    pub handshake_attempts: usize,
    /// Send a wake-up sequence when the target stays silent
    pub trigger: bool,
    /// Wake-up sequences allowed per candidate
    pub max_triggers: u32,
    /// Pause after a wake-up sequence before reading again
    pub trigger_settle: Duration,
    /// Pause before draining after a reset or a bridge exit
    pub settle: Duration,
    /// Rates to try, in order
    pub candidates: Vec<BaudCandidate>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            handshake_timeout: Duration::from_millis(100),
            handshake_attempts: DEFAULT_HANDSHAKE_ATTEMPTS,
            trigger: false,
            max_triggers: 3,
            trigger_settle: Duration::from_millis(500),
            settle: Duration::from_millis(200),
            candidates: CANDIDATES.to_vec(),
        }
    }
}
