//! Virtual target device
//!
//! Stands on the far side of the adapter's UART bridge. What it sends
//! depends on the rate the bridge was opened at: at its real rate it
//! produces readable text, at any other rate whatever the test scripts
//! (usually garbage or nothing).

use std::collections::HashMap;

use bbio_protocol::command::TRIGGER;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// What the target sends at one bridge rate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateScript {
    /// Sent as soon as the bridge opens
    pub greeting: Vec<u8>,
    /// Sent after every wake-up sequence (following the echo)
    pub on_trigger: Vec<u8>,
}

impl RateScript {
    /// A target that talks on its own
    pub fn chatty(text: impl Into<Vec<u8>>) -> Self {
        Self {
            greeting: text.into(),
            on_trigger: Vec::new(),
        }
    }

    /// A target that only answers when poked
    pub fn answers_trigger(text: impl Into<Vec<u8>>) -> Self {
        Self {
            greeting: Vec::new(),
            on_trigger: text.into(),
        }
    }
}

/// Configuration for a virtual target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualTargetConfig {
    /// Echo bytes written to the target back to the adapter
    pub echo: bool,
    /// Per-rate behaviour; rates not listed are silent
    pub scripts: HashMap<u32, RateScript>,
}

impl Default for VirtualTargetConfig {
    fn default() -> Self {
        Self {
            echo: true,
            scripts: HashMap::new(),
        }
    }
}

/// A simulated device on the bridged UART
#[derive(Debug, Clone, Default)]
pub struct VirtualTarget {
    config: VirtualTargetConfig,
    triggers: HashMap<u32, usize>,
}

impl VirtualTarget {
    /// A target that never sends anything
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn from_config(config: VirtualTargetConfig) -> Self {
        Self {
            config,
            triggers: HashMap::new(),
        }
    }

    /// Talk `text` at `rate` as soon as the bridge opens
    pub fn speaking(self, rate: u32, text: impl Into<Vec<u8>>) -> Self {
        self.with_script(rate, RateScript::chatty(text))
    }

    /// Emit `bytes` at `rate`, as a mismatched UART would
    pub fn garbled(self, rate: u32, bytes: impl Into<Vec<u8>>) -> Self {
        self.with_script(rate, RateScript::chatty(bytes))
    }

    pub fn with_script(mut self, rate: u32, script: RateScript) -> Self {
        self.config.scripts.insert(rate, script);
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.config.echo = echo;
        self
    }

    /// Number of wake-up sequences received at `rate`
    pub fn triggers_at(&self, rate: u32) -> usize {
        self.triggers.get(&rate).copied().unwrap_or(0)
    }

    /// Bytes sent when a bridge opens at `rate`
    pub(crate) fn on_bridge_open(&self, rate: u32) -> Vec<u8> {
        self.config
            .scripts
            .get(&rate)
            .map(|s| s.greeting.clone())
            .unwrap_or_default()
    }

    /// Bytes sent back after the adapter forwarded `data` at `rate`
    pub(crate) fn on_write(&mut self, rate: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        if self.config.echo {
            out.extend_from_slice(data);
        }

        let is_trigger = data.windows(TRIGGER.len()).any(|w| w == TRIGGER);
        if is_trigger {
            *self.triggers.entry(rate).or_insert(0) += 1;
            if let Some(script) = self.config.scripts.get(&rate) {
                out.extend_from_slice(&script.on_trigger);
            }
        }

        trace!("Target at {} baud got {:02X?}, answers {} bytes", rate, data, out.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_rate_is_silent() {
        let target = VirtualTarget::silent().speaking(38400, "hello");
        assert_eq!(target.on_bridge_open(38400), b"hello");
        assert!(target.on_bridge_open(9600).is_empty());
    }

    #[test]
    fn test_trigger_echo_and_answer() {
        let mut target = VirtualTarget::silent()
            .with_script(9600, RateScript::answers_trigger("login: "));

        let out = target.on_write(9600, b"\r\n");
        assert_eq!(out, b"\r\nlogin: ");
        assert_eq!(target.triggers_at(9600), 1);

        // Plain data is echoed but does not count as a wake-up
        let out = target.on_write(9600, b"x");
        assert_eq!(out, b"x");
        assert_eq!(target.triggers_at(9600), 1);
    }

    #[test]
    fn test_no_echo() {
        let mut target = VirtualTarget::silent().with_echo(false);
        assert!(target.on_write(19200, b"\r\n").is_empty());
        assert_eq!(target.triggers_at(19200), 1);
    }

    #[test]
    fn test_config_serde() {
        let config = VirtualTarget::silent()
            .speaking(57600, "ok")
            .config
            .clone();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: VirtualTargetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.scripts.get(&57600), Some(&RateScript::chatty("ok")));
        assert!(parsed.echo);
    }
}
