//! Virtual bridge adapter
//!
//! Speaks the adapter side of the binary protocol byte by byte, forwards
//! bridged traffic to a [`VirtualTarget`] and records every write. The
//! [`VirtualAdapter`] is the link handed to the orchestrator; a
//! [`VirtualAdapterHandle`] keeps access to the same state so a test (or a
//! scripted operator) can press the button and inspect the traffic.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bbio_detect::AdapterLink;
use bbio_protocol::command::{
    ACK, BBIO_BANNER, BINARY_MODE_ENTRY, CONSOLE_RESET, START_BRIDGE, UART_BANNER,
    UART_MODE_SELECT,
};
use bbio_protocol::{AdapterCommand, AdapterMode, EncodeCommand, CANDIDATES};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::target::VirtualTarget;

/// Answer to a rate the adapter does not accept
const NACK: u8 = 0x00;

/// Configuration for a virtual adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAdapterConfig {
    /// Port name reported by the link
    pub name: String,
    /// Whether the adapter answers binary mode entry at all
    pub responsive: bool,
    /// Consecutive priming bytes needed before the banner appears
    pub priming_required: usize,
    /// Identifier returned on UART submode selection
    pub uart_identifier: Vec<u8>,
    /// Rates the adapter acknowledges; `None` accepts every known rate
    pub supported_rates: Option<Vec<u32>>,
}

impl Default for VirtualAdapterConfig {
    fn default() -> Self {
        Self {
            name: "Virtual Hydrabus".to_string(),
            responsive: true,
            priming_required: 1,
            uart_identifier: UART_BANNER.to_vec(),
            supported_rates: None,
        }
    }
}

#[derive(Debug)]
struct AdapterState {
    config: VirtualAdapterConfig,
    target: VirtualTarget,
    mode: AdapterMode,
    /// Consecutive priming bytes seen in console mode
    priming: usize,
    rate: Option<u32>,
    /// Bytes waiting to be read by the host
    rx: VecDeque<u8>,
    /// Every write call, as one frame each
    write_log: Vec<Vec<u8>>,
    console_resets: usize,
    button_presses: usize,
    closed: bool,
}

impl AdapterState {
    fn push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    fn accepts(&self, rate: u32) -> bool {
        match &self.config.supported_rates {
            Some(rates) => rates.contains(&rate),
            None => true,
        }
    }

    /// Feed one write frame through the adapter state machine
    fn receive(&mut self, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            match self.mode {
                AdapterMode::Console => self.console_byte(byte),
                AdapterMode::BinaryBitbang => self.binary_byte(byte),
                AdapterMode::UartControl => self.uart_byte(byte),
                AdapterMode::UartBridge => {
                    // Everything from here on belongs to the target
                    let rate = self.rate.unwrap_or_default();
                    let answer = self.target.on_write(rate, &data[i..]);
                    self.push(&answer);
                    return;
                }
            }
        }
    }

    fn console_byte(&mut self, byte: u8) {
        if !self.config.responsive {
            return;
        }
        if byte != BINARY_MODE_ENTRY {
            self.priming = 0;
            return;
        }
        self.priming += 1;
        if self.priming >= self.config.priming_required {
            debug!("Virtual adapter entering binary mode");
            self.priming = 0;
            self.mode = AdapterMode::BinaryBitbang;
            self.push(BBIO_BANNER);
        }
    }

    fn binary_byte(&mut self, byte: u8) {
        match byte {
            BINARY_MODE_ENTRY => self.push(BBIO_BANNER),
            UART_MODE_SELECT => {
                self.mode = AdapterMode::UartControl;
                let identifier = self.config.uart_identifier.clone();
                self.push(&identifier);
            }
            CONSOLE_RESET => {
                debug!("Virtual adapter back to console");
                self.mode = AdapterMode::Console;
                self.rate = None;
                self.console_resets += 1;
            }
            other => trace!("Virtual adapter ignores {:#04x} in binary mode", other),
        }
    }

    fn uart_byte(&mut self, byte: u8) {
        if byte == BINARY_MODE_ENTRY {
            self.mode = AdapterMode::BinaryBitbang;
            self.push(BBIO_BANNER);
            return;
        }
        if byte == START_BRIDGE {
            let rate = self.rate.unwrap_or_default();
            debug!("Virtual adapter bridging at {} baud", rate);
            self.mode = AdapterMode::UartBridge;
            let greeting = self.target.on_bridge_open(rate);
            self.push(&greeting);
            return;
        }

        match CANDIDATES.iter().find(|c| c.select_code == byte) {
            Some(candidate) if self.accepts(candidate.rate) => {
                self.rate = Some(candidate.rate);
                self.push(&[ACK]);
            }
            _ => self.push(&[NACK]),
        }
    }

    /// The physical button: leaves the bridge, prints the banner
    fn press_button(&mut self) -> bool {
        self.button_presses += 1;
        if self.mode != AdapterMode::UartBridge {
            return false;
        }
        debug!("Virtual adapter button leaves the bridge");
        self.mode = AdapterMode::BinaryBitbang;
        self.push(BBIO_BANNER);
        true
    }
}

/// Shared access to a virtual adapter's state
#[derive(Debug, Clone)]
pub struct VirtualAdapterHandle {
    state: Arc<Mutex<AdapterState>>,
    notify: Arc<Notify>,
}

impl VirtualAdapterHandle {
    fn state(&self) -> MutexGuard<'_, AdapterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Press the adapter button
    ///
    /// Returns true if the adapter was bridged and has left the bridge.
    pub fn press_button(&self) -> bool {
        let left = self.state().press_button();
        self.notify.notify_waiters();
        left
    }

    /// Current mode of the adapter
    pub fn mode(&self) -> AdapterMode {
        self.state().mode
    }

    /// Rate the UART is configured to
    pub fn rate(&self) -> Option<u32> {
        self.state().rate
    }

    /// Every write frame received so far
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state().write_log.clone()
    }

    /// Number of writes that were exactly the console reset sequence
    pub fn reset_requests(&self) -> usize {
        let reset = AdapterCommand::ResetToConsole.encode();
        self.state()
            .write_log
            .iter()
            .filter(|frame| **frame == reset)
            .count()
    }

    /// Number of times the adapter actually returned to its console
    pub fn console_resets(&self) -> usize {
        self.state().console_resets
    }

    pub fn button_presses(&self) -> usize {
        self.state().button_presses
    }

    /// Wake-up sequences the target received at `rate`
    pub fn triggers_at(&self, rate: u32) -> usize {
        self.state().target.triggers_at(rate)
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

/// A simulated adapter, usable as the orchestrator's link
#[derive(Debug)]
pub struct VirtualAdapter {
    name: String,
    handle: VirtualAdapterHandle,
}

impl VirtualAdapter {
    /// Create a responsive adapter in front of `target`
    pub fn new(target: VirtualTarget) -> Self {
        Self::from_config(VirtualAdapterConfig::default(), target)
    }

    pub fn from_config(config: VirtualAdapterConfig, target: VirtualTarget) -> Self {
        let name = config.name.clone();
        let state = AdapterState {
            config,
            target,
            mode: AdapterMode::Console,
            priming: 0,
            rate: None,
            rx: VecDeque::new(),
            write_log: Vec::new(),
            console_resets: 0,
            button_presses: 0,
            closed: false,
        };
        Self {
            name,
            handle: VirtualAdapterHandle {
                state: Arc::new(Mutex::new(state)),
                notify: Arc::new(Notify::new()),
            },
        }
    }

    /// Get a handle to the shared state
    pub fn handle(&self) -> VirtualAdapterHandle {
        self.handle.clone()
    }

    fn take(&self, max: usize) -> io::Result<Vec<u8>> {
        let mut state = self.handle.state();
        if state.closed {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is closed", self.name),
            ));
        }
        let n = max.min(state.rx.len());
        Ok(state.rx.drain(..n).collect())
    }
}

#[async_trait]
impl AdapterLink for VirtualAdapter {
    async fn read(&mut self, max: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        // Register for wake-ups before looking, so a push in between is not lost
        let notified = self.handle.notify.notified();

        let chunk = self.take(max)?;
        if !chunk.is_empty() || max == 0 {
            return Ok(chunk);
        }

        let _ = tokio::time::timeout(timeout, notified).await;
        self.take(max)
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        {
            let mut state = self.handle.state();
            if state.closed {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    format!("{} is closed", self.name),
                ));
            }
            state.write_log.push(data.to_vec());
            state.receive(data);
        }
        self.handle.notify.notify_waiters();
        Ok(())
    }

    async fn drain(&mut self) -> io::Result<usize> {
        let mut state = self.handle.state();
        let n = state.rx.len();
        state.rx.clear();
        Ok(n)
    }

    async fn close(&mut self) -> io::Result<()> {
        self.handle.state().closed = true;
        self.handle.notify.notify_waiters();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(10);

    async fn bridge_at(adapter: &mut VirtualAdapter, code: u8) -> Vec<u8> {
        adapter.write(&[0x00]).await.unwrap();
        assert_eq!(adapter.read(5, WAIT).await.unwrap(), b"BBIO1");
        adapter.write(&[0x03]).await.unwrap();
        assert_eq!(adapter.read(4, WAIT).await.unwrap(), b"ART1");
        adapter.write(&[code]).await.unwrap();
        let ack = adapter.read(1, WAIT).await.unwrap();
        adapter.write(&[0x0F]).await.unwrap();
        ack
    }

    #[tokio::test]
    async fn test_priming_threshold() {
        let config = VirtualAdapterConfig {
            priming_required: 3,
            ..Default::default()
        };
        let mut adapter = VirtualAdapter::from_config(config, VirtualTarget::silent());

        adapter.write(&[0x00]).await.unwrap();
        adapter.write(&[0x00]).await.unwrap();
        assert!(adapter.read(5, WAIT).await.unwrap().is_empty());
        adapter.write(&[0x00]).await.unwrap();
        assert_eq!(adapter.read(5, WAIT).await.unwrap(), b"BBIO1");
        assert_eq!(adapter.handle().mode(), AdapterMode::BinaryBitbang);
    }

    #[tokio::test]
    async fn test_unresponsive_adapter_stays_silent() {
        let config = VirtualAdapterConfig {
            responsive: false,
            ..Default::default()
        };
        let mut adapter = VirtualAdapter::from_config(config, VirtualTarget::silent());

        for _ in 0..30 {
            adapter.write(&[0x00]).await.unwrap();
        }
        assert!(adapter.read(5, WAIT).await.unwrap().is_empty());
        assert_eq!(adapter.handle().mode(), AdapterMode::Console);
    }

    #[tokio::test]
    async fn test_bridge_forwards_target_greeting() {
        let target = VirtualTarget::silent().speaking(19200, "hi there");
        let mut adapter = VirtualAdapter::new(target);

        assert_eq!(bridge_at(&mut adapter, 0x65).await, [0x01u8]);
        assert_eq!(adapter.read(64, WAIT).await.unwrap(), b"hi there");
        assert_eq!(adapter.handle().mode(), AdapterMode::UartBridge);
        assert_eq!(adapter.handle().rate(), Some(19200));
    }

    #[tokio::test]
    async fn test_unsupported_rate_is_refused() {
        let config = VirtualAdapterConfig {
            supported_rates: Some(vec![115200]),
            ..Default::default()
        };
        let mut adapter = VirtualAdapter::from_config(config, VirtualTarget::silent());

        assert_eq!(bridge_at(&mut adapter, 0x64).await, [0x00u8]);
    }

    #[tokio::test]
    async fn test_bridged_reset_reaches_target() {
        let mut adapter = VirtualAdapter::new(VirtualTarget::silent().with_echo(false));
        let handle = adapter.handle();
        bridge_at(&mut adapter, 0x64).await;

        adapter.write(&[0x00, 0x0F]).await.unwrap();
        assert_eq!(handle.mode(), AdapterMode::UartBridge);
        assert_eq!(handle.reset_requests(), 1);
        assert_eq!(handle.console_resets(), 0);

        assert!(handle.press_button());
        assert_eq!(adapter.read(5, WAIT).await.unwrap(), b"BBIO1");
        adapter.write(&[0x00, 0x0F]).await.unwrap();
        assert_eq!(handle.mode(), AdapterMode::Console);
        assert_eq!(handle.console_resets(), 1);
    }

    #[tokio::test]
    async fn test_button_outside_bridge_does_nothing() {
        let adapter = VirtualAdapter::new(VirtualTarget::silent());
        let handle = adapter.handle();
        assert!(!handle.press_button());
        assert_eq!(handle.button_presses(), 1);
        assert_eq!(handle.mode(), AdapterMode::Console);
    }

    #[tokio::test]
    async fn test_read_wakes_on_button() {
        let mut adapter = VirtualAdapter::new(VirtualTarget::silent());
        let handle = adapter.handle();
        bridge_at(&mut adapter, 0x66).await;

        let presser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.press_button()
        });

        let got = adapter.read(5, Duration::from_secs(2)).await.unwrap();
        assert_eq!(got, b"BBIO1");
        assert!(presser.await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_link_errors() {
        let mut adapter = VirtualAdapter::new(VirtualTarget::silent());
        adapter.close().await.unwrap();
        assert!(adapter.handle().is_closed());
        assert!(adapter.write(&[0x00]).await.is_err());
        assert!(adapter.read(1, WAIT).await.is_err());
    }
}
