//! Progress events emitted during a detection run
//!
//! Observers (the CLI progress line, tests) receive every step of a run
//! through a single unbounded channel, in order.

/// Why a candidate rate was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The adapter refused the rate
    RateRejected,
    /// No byte arrived within the read timeout
    Timeout,
    /// A byte outside the valid character set arrived
    InvalidByte(u8),
}

/// Detection progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectEvent {
    /// Scan started on a link
    RunStarted { port: String },

    /// A candidate rate is being configured
    CandidateStarted { rate: u32 },

    /// The bridge is open at this rate, bytes from the target follow
    BridgeStarted { rate: u32 },

    /// A byte arrived from the target
    ByteReceived { rate: u32, byte: u8 },

    /// The target was silent and a wake-up sequence was sent
    TriggerSent { rate: u32, attempt: u32 },

    /// The candidate was abandoned
    CandidateFailed { rate: u32, reason: FailureReason },

    /// The operator must press the adapter button to continue
    ManualAdvanceRequested,

    /// Enough text was received at this rate
    RateFound { rate: u32 },

    /// The run ended and the adapter was reset
    RunFinished,
}
