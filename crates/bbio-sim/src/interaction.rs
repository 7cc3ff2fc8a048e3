//! Scripted operator
//!
//! Plays the human side of a detection run against a [`VirtualAdapter`]:
//! answers prompts from a queue, presses the button when asked and records
//! what it was asked to do.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bbio_detect::{AdapterLink, CancelHandle, DetectError, InteractionPort};
use tracing::debug;

use crate::adapter::{VirtualAdapter, VirtualAdapterHandle};

/// Cancel the run some time after a given manual advance
#[derive(Debug, Clone)]
struct CancelPlan {
    advance: usize,
    delay: Duration,
    handle: CancelHandle,
}

/// An [`InteractionPort`] driven by a script instead of a person
#[derive(Debug)]
pub struct ScriptedInteraction {
    adapter: VirtualAdapterHandle,
    answers: VecDeque<bool>,
    press_button: bool,
    fail_prompts: bool,
    terminal_input: Vec<u8>,
    cancel_plan: Option<CancelPlan>,
    prompts: Vec<String>,
    advances: usize,
    handoffs: Vec<u32>,
}

impl ScriptedInteraction {
    /// An operator who declines every prompt and presses the button when asked
    pub fn new(adapter: VirtualAdapterHandle) -> Self {
        Self {
            adapter,
            answers: VecDeque::new(),
            press_button: true,
            fail_prompts: false,
            terminal_input: Vec::new(),
            cancel_plan: None,
            prompts: Vec::new(),
            advances: 0,
            handoffs: Vec::new(),
        }
    }

    /// Queue answers for upcoming prompts; once exhausted, prompts are declined
    pub fn answering(mut self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.answers.extend(answers);
        self
    }

    /// Never press the button (the operator walked away)
    pub fn without_button(mut self) -> Self {
        self.press_button = false;
        self
    }

    /// Fail every prompt, as a closed terminal would
    pub fn failing_prompts(mut self) -> Self {
        self.fail_prompts = true;
        self
    }

    /// Type these bytes into the terminal session
    pub fn typing(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.terminal_input = input.into();
        self
    }

    /// Cancel the run `delay` after the `advance`-th manual advance (1-based)
    pub fn cancelling_after(mut self, advance: usize, delay: Duration, handle: CancelHandle) -> Self {
        self.cancel_plan = Some(CancelPlan {
            advance,
            delay,
            handle,
        });
        self
    }

    /// Prompts shown so far
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Number of manual advances requested
    pub fn advances(&self) -> usize {
        self.advances
    }

    /// Rates at which a terminal session was opened
    pub fn handoffs(&self) -> &[u32] {
        &self.handoffs
    }
}

#[async_trait]
impl InteractionPort<VirtualAdapter> for ScriptedInteraction {
    async fn confirm(&mut self, prompt: &str) -> Result<bool, DetectError> {
        self.prompts.push(prompt.to_string());
        if self.fail_prompts {
            return Err(DetectError::Interaction("prompt input closed".to_string()));
        }
        let answer = self.answers.pop_front().unwrap_or(false);
        debug!("Scripted answer to {:?}: {}", prompt, answer);
        Ok(answer)
    }

    async fn await_manual_advance(&mut self) -> Result<(), DetectError> {
        self.advances += 1;

        if let Some(plan) = &self.cancel_plan {
            if plan.advance == self.advances {
                let plan = plan.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(plan.delay).await;
                    debug!("Scripted cancellation");
                    plan.handle.cancel();
                });
            }
        }

        if self.press_button {
            self.adapter.press_button();
        }
        Ok(())
    }

    async fn hand_off_to_terminal(
        &mut self,
        link: &mut VirtualAdapter,
        rate: u32,
    ) -> Result<(), DetectError> {
        self.handoffs.push(rate);
        if !self.terminal_input.is_empty() {
            link.write(&self.terminal_input).await?;
        }
        Ok(())
    }
}
