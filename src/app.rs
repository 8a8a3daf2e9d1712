use crate::input::{InputEvent, InputSource};
use crate::renderer::TerminalRenderer;
use anyhow::Result;
use percept_core::{RatingField, TrialPhase};
use percept_experiment::{DisplaySignal, Navigator, TrialStateMachine};
use percept_store::KeyValueStore;
use percept_timing::Timer;
use std::io::Write;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tracing::{debug, info};

const IDLE_WAIT: Duration = Duration::from_secs(1);
/// Deadlines closer than this are slept out on the precise clock instead of the
/// input channel, which can overshoot by a scheduler tick.
const PRECISE_WAIT: Duration = Duration::from_millis(2);
/// The break countdown is redrawn each time it drops into a new block of this many seconds.
const COUNTDOWN_STEP: u64 = 10;

#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    Finished,
    /// Input closed before the last trial; progress is already on disk.
    Interrupted,
}

/// Hands the participant over to the post-experiment page.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&mut self, route: &str) {
        info!(route, "navigating to completion page");
    }
}

/// Drives a [`TrialStateMachine`] from terminal input, waking for whichever comes
/// first: a line of input or the next timer deadline.
pub struct App<T: Timer, S: KeyValueStore, I: InputSource, W: Write> {
    machine: TrialStateMachine<T, S>,
    clock: T,
    input: I,
    renderer: TerminalRenderer<W>,
    options: Vec<String>,
    countdown_block: Option<u64>,
}

impl<T: Timer, S: KeyValueStore, I: InputSource, W: Write> App<T, S, I, W> {
    pub fn new(machine: TrialStateMachine<T, S>, clock: T, input: I, out: W) -> Self {
        let scale_max = machine.config().scale_max;
        Self {
            machine,
            clock,
            input,
            renderer: TerminalRenderer::new(out, scale_max),
            options: Vec::new(),
            countdown_block: None,
        }
    }

    pub fn run(mut self) -> Result<Exit> {
        if self.machine.records().resumed() {
            self.renderer.note("picking up where you left off")?;
        }
        self.machine.start();
        loop {
            self.flush_signals()?;
            if self.machine.is_done() {
                return Ok(Exit::Finished);
            }

            let wait = self.wait();
            if self.machine.next_deadline().is_some() && wait <= PRECISE_WAIT {
                self.clock.sleep(wait);
                continue;
            }

            match self.input.recv_timeout(wait) {
                Ok(InputEvent::Line(line)) => self.handle_line(&line)?,
                Ok(InputEvent::Closed) | Err(RecvTimeoutError::Disconnected) => {
                    info!(
                        cursor = self.machine.cursor(),
                        total = self.machine.sequence().len(),
                        "input closed; session can be resumed"
                    );
                    return Ok(Exit::Interrupted);
                }
                Err(RecvTimeoutError::Timeout) => self.refresh_countdown()?,
            }
        }
    }

    fn wait(&self) -> Duration {
        match self.machine.next_deadline() {
            Some(deadline) => {
                Duration::from_nanos(deadline.saturating_sub(self.clock.now())).min(IDLE_WAIT)
            }
            None => IDLE_WAIT,
        }
    }

    fn flush_signals(&mut self) -> Result<()> {
        for signal in self.machine.update() {
            match &signal {
                DisplaySignal::AttentionQuestion { options } => self.options.clone_from(options),
                DisplaySignal::Break { seconds_remaining } => {
                    self.countdown_block = Some(seconds_remaining.div_ceil(COUNTDOWN_STEP));
                }
                _ => {}
            }
            self.renderer.render(&signal)?;
        }
        Ok(())
    }

    fn refresh_countdown(&mut self) -> Result<()> {
        let Some(seconds_remaining) = self.machine.break_seconds_remaining() else {
            return Ok(());
        };
        let block = seconds_remaining.div_ceil(COUNTDOWN_STEP);
        if seconds_remaining > 0 && self.countdown_block != Some(block) {
            self.countdown_block = Some(block);
            self.renderer.render(&DisplaySignal::Break { seconds_remaining })?;
        }
        Ok(())
    }

    /// An option number, or an option typed out in any letter case.
    fn option_for(&self, line: &str) -> Option<String> {
        if let Ok(n) = line.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| self.options.get(i)).cloned();
        }
        self.options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(line))
            .cloned()
    }

    /// Routes one line of input according to the current phase.
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        debug!(phase = ?self.machine.phase(), line, "input");
        match self.machine.phase() {
            TrialPhase::Rating => self.rating_input(line)?,
            TrialPhase::AttentionQuestion => match self.option_for(line) {
                Some(answer) => {
                    // rejections come back as display signals
                    let _ = self.machine.submit_attention_answer(&answer);
                }
                None => self
                    .renderer
                    .note(&format!("choose 1-{} or type one of the options", self.options.len()))?,
            },
            TrialPhase::AttentionBreak => {
                if !self.machine.skip_break() {
                    self.renderer.note("break already over")?;
                }
            }
            _ => self.renderer.note("please wait")?,
        }
        self.flush_signals()
    }

    fn rating_input(&mut self, line: &str) -> Result<()> {
        if line.eq_ignore_ascii_case("submit") {
            let _ = self.machine.submit_draft();
            return Ok(());
        }

        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() == RatingField::ALL.len() && !line.contains('=') {
            let mut values = Vec::with_capacity(tokens.len());
            for token in &tokens {
                match token.parse::<u8>() {
                    Ok(v) => values.push(v),
                    Err(_) => return self.renderer.note("scores must be whole numbers").map_err(Into::into),
                }
            }
            for (field, value) in RatingField::ALL.into_iter().zip(values) {
                self.machine.update_rating(field, Some(value));
            }
            let _ = self.machine.submit_draft();
            return Ok(());
        }

        for token in tokens {
            let parsed = token.split_once('=').and_then(|(name, value)| {
                let field = RatingField::from_name(name.trim())?;
                let value = value.trim();
                if value.is_empty() {
                    return Some((field, None));
                }
                value.parse::<u8>().ok().map(|v| (field, Some(v)))
            });
            match parsed {
                Some((field, value)) => {
                    self.machine.update_rating(field, value);
                }
                None => self.renderer.note(&format!("could not read `{token}`"))?,
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn machine(&self) -> &TrialStateMachine<T, S> {
        &self.machine
    }
}
