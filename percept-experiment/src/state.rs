use chrono::Utc;
use percept_core::{
    AttentionRecord, RatingField, RatingForm, RatingRecord, StimulusItem, TrialPhase,
};
use percept_store::KeyValueStore;
use percept_timing::{Timer, TimerSlot};
use tracing::{debug, error, info};

use crate::config::ExperimentConfig;
use crate::error::Rejection;
use crate::finalize::Finalizer;
use crate::record::{RecordStore, SessionState};

#[derive(Copy, Debug, Clone, PartialEq, Eq)]
enum TimerKind {
    Fixation,
    Stimulus,
    Rest,
    AttentionBreak,
}

/// What the presentation layer should show, emitted on every state entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySignal {
    Fixation { trial: usize, total: usize },
    Stimulus { path: String },
    RatingForm { submit_enabled: bool },
    AttentionQuestion { options: Vec<String> },
    Break { seconds_remaining: u64 },
    Rest,
    Rejected { reason: Rejection },
    Finished { route: String },
}

/// Callbacks from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentEvent {
    RatingChanged { field: RatingField, value: Option<u8> },
    RatingSubmitted(RatingForm),
    AttentionAnswered(String),
    SkipBreak,
}

#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Complete,
    Next(usize),
}

/// Walks the trial sequence one item at a time:
/// fixation → stimulus → rating | attention question → rest | break → next trial.
///
/// All timers live in a single [`TimerSlot`]; every transition clears it before
/// arming the next one, so a stale timer can never move the session forward.
pub struct TrialStateMachine<T: Timer, S: KeyValueStore> {
    config: ExperimentConfig,
    timer: T,
    records: RecordStore<S>,
    finalizer: Finalizer,
    phase: TrialPhase,
    timers: TimerSlot<TimerKind>,
    draft: RatingForm,
    signals: Vec<DisplaySignal>,
    finished: bool,
}

impl<T: Timer, S: KeyValueStore> TrialStateMachine<T, S> {
    pub fn new(config: ExperimentConfig, timer: T, records: RecordStore<S>, finalizer: Finalizer) -> Self {
        Self {
            config,
            timer,
            records,
            finalizer,
            phase: TrialPhase::Idle,
            timers: TimerSlot::new(),
            draft: RatingForm::new(),
            signals: Vec::new(),
            finished: false,
        }
    }

    /// Enters the first trial. A session resumed mid-pause finishes that pause first.
    pub fn start(&mut self) {
        if self.phase != TrialPhase::Idle {
            return;
        }
        info!(
            participant = %self.records.profile().participant_id,
            condition = %self.records.profile().condition_id,
            cursor = self.records.cursor(),
            total = self.records.sequence().len(),
            "session started"
        );
        if self.records.session().response_recorded {
            self.advance_then_check();
        } else {
            self.enter_next();
        }
    }

    /// Fires due timers and hands back everything emitted since the last call.
    pub fn update(&mut self) -> Vec<DisplaySignal> {
        self.tick();
        self.take_signals()
    }

    /// Fires every timer that is due by now, returning how many fired.
    pub fn tick(&mut self) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.timers.poll(self.timer.now()) {
            fired += 1;
            self.on_timer(timer.kind);
        }
        fired
    }

    pub fn handle_event(&mut self, event: ExperimentEvent) -> bool {
        match event {
            ExperimentEvent::RatingChanged { field, value } => self.update_rating(field, value),
            ExperimentEvent::RatingSubmitted(form) => self.submit_rating(&form).is_ok(),
            ExperimentEvent::AttentionAnswered(answer) => {
                self.submit_attention_answer(&answer).is_ok()
            }
            ExperimentEvent::SkipBreak => self.skip_break(),
        }
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match (kind, self.phase) {
            (TimerKind::Fixation, TrialPhase::Fixation) => self.transition(TrialPhase::Stimulus),
            (TimerKind::Stimulus, TrialPhase::Stimulus) => {
                let next = match self.records.current() {
                    Some(item) if item.is_attention() => TrialPhase::AttentionQuestion,
                    Some(_) => TrialPhase::Rating,
                    None => TrialPhase::Done,
                };
                self.transition(next);
            }
            (TimerKind::Rest, TrialPhase::Rest)
            | (TimerKind::AttentionBreak, TrialPhase::AttentionBreak) => self.advance_then_check(),
            (kind, phase) => debug!(?kind, ?phase, "ignoring stale timer"),
        }
    }

    /// Single entry point for every state change.
    fn transition(&mut self, next: TrialPhase) {
        if self.finished {
            return;
        }
        self.timers.cancel();
        debug!(from = ?self.phase, to = ?next, cursor = self.records.cursor(), "transition");
        self.phase = next;
        let now = self.timer.now();

        match next {
            TrialPhase::Idle => {}
            TrialPhase::Fixation => {
                if self.records.current().is_none() {
                    return self.transition(TrialPhase::Done);
                }
                self.timers.arm(TimerKind::Fixation, now, self.config.fixation());
                let (trial, total) = self.progress();
                self.signals.push(DisplaySignal::Fixation { trial, total });
            }
            TrialPhase::Stimulus => {
                let Some(item) = self.records.current() else {
                    return self.transition(TrialPhase::Done);
                };
                let exposure = self.config.stimulus_for(item);
                let path = item.path.clone();
                self.timers.arm(TimerKind::Stimulus, now, exposure);
                self.signals.push(DisplaySignal::Stimulus { path });
            }
            TrialPhase::Rating => {
                self.draft = RatingForm::new();
                self.signals.push(DisplaySignal::RatingForm {
                    submit_enabled: false,
                });
            }
            TrialPhase::AttentionQuestion => {
                self.signals.push(DisplaySignal::AttentionQuestion {
                    options: self.config.categories.clone(),
                });
            }
            TrialPhase::Rest => {
                self.timers.arm(TimerKind::Rest, now, self.config.rest());
                self.signals.push(DisplaySignal::Rest);
            }
            TrialPhase::AttentionBreak => {
                self.timers
                    .arm(TimerKind::AttentionBreak, now, self.config.attention_break());
                self.signals.push(DisplaySignal::Break {
                    seconds_remaining: self.config.attention_break_secs,
                });
            }
            TrialPhase::Done => self.finish(),
        }
    }

    /// Where the cursor points: the next trial, or the end of the sequence.
    /// Reads state only, so asking twice always gives the same answer.
    pub fn completion(&self) -> Completion {
        let cursor = self.records.cursor();
        if cursor >= self.records.sequence().len() {
            Completion::Complete
        } else {
            Completion::Next(cursor)
        }
    }

    fn enter_next(&mut self) {
        match self.completion() {
            Completion::Complete => self.transition(TrialPhase::Done),
            Completion::Next(_) => self.transition(TrialPhase::Fixation),
        }
    }

    /// The one place the cursor moves: past the answered trial, then on to the next
    /// trial or to the end.
    fn advance_then_check(&mut self) {
        if let Err(err) = self.records.advance() {
            error!(error = %err, "failed to persist progress; continuing from memory");
        }
        self.enter_next();
    }

    fn finish(&mut self) {
        self.timers.cancel();
        if let Err(err) = self.records.finish(Utc::now()) {
            error!(error = %err, "failed to persist finished session");
        }
        self.finished = true;
        let record = self.records.session_record();
        info!(
            participant = %record.participant_id,
            ratings = record.experiment_data.ratings.len(),
            attention_checks = record.experiment_data.attention_results.len(),
            "session finished"
        );
        self.finalizer.finish(&record);
        self.signals.push(DisplaySignal::Finished {
            route: self.finalizer.route().to_string(),
        });
    }

    fn reject(&mut self, reason: Rejection) -> Rejection {
        debug!(%reason, phase = ?self.phase, "input rejected");
        self.signals.push(DisplaySignal::Rejected {
            reason: reason.clone(),
        });
        reason
    }

    /// Records one answer on the rating form. Returns whether submit is now enabled.
    pub fn update_rating(&mut self, field: RatingField, value: Option<u8>) -> bool {
        if self.phase != TrialPhase::Rating {
            return false;
        }
        self.draft.set(field, value);
        let submit_enabled = self.submit_enabled();
        self.signals.push(DisplaySignal::RatingForm { submit_enabled });
        submit_enabled
    }

    /// Submits the form built up through [`Self::update_rating`].
    pub fn submit_draft(&mut self) -> Result<(), Rejection> {
        let form = self.draft;
        self.submit_rating(&form)
    }

    pub fn submit_rating(&mut self, form: &RatingForm) -> Result<(), Rejection> {
        if self.phase != TrialPhase::Rating {
            return Err(self.reject(Rejection::NotAccepting { phase: self.phase }));
        }
        let scores = match form.validate(self.config.scale_max) {
            Ok(scores) => scores,
            Err(err) => return Err(self.reject(err.into())),
        };
        let Some(item) = self.records.current() else {
            self.transition(TrialPhase::Done);
            return Err(Rejection::NotAccepting {
                phase: TrialPhase::Done,
            });
        };
        let record = RatingRecord::new(
            self.records.profile(),
            item,
            scores,
            self.config.device_class,
            Utc::now(),
        );
        if let Err(err) = self.records.append_rating(record) {
            error!(error = %err, "failed to persist rating; kept in memory");
        }
        self.transition(TrialPhase::Rest);
        Ok(())
    }

    pub fn submit_attention_answer(&mut self, answer: &str) -> Result<(), Rejection> {
        if self.phase != TrialPhase::AttentionQuestion {
            return Err(self.reject(Rejection::NotAccepting { phase: self.phase }));
        }
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(self.reject(Rejection::NoSelection));
        }
        if !self.config.categories.iter().any(|option| option == answer) {
            return Err(self.reject(Rejection::NotAnOption {
                answer: answer.to_string(),
            }));
        }
        let Some(item) = self.records.current() else {
            self.transition(TrialPhase::Done);
            return Err(Rejection::NotAccepting {
                phase: TrialPhase::Done,
            });
        };
        let record = AttentionRecord::new(self.records.profile(), item, answer, Utc::now());
        debug!(stimulus = %record.stimulus_id, correct = record.correct, "attention check answered");
        if let Err(err) = self.records.append_attention_result(record) {
            error!(error = %err, "failed to persist attention result; kept in memory");
        }
        self.transition(TrialPhase::AttentionBreak);
        Ok(())
    }

    /// Ends the attention break early. Returns false when there is no break left to
    /// skip, including when it has already expired.
    pub fn skip_break(&mut self) -> bool {
        if self.phase != TrialPhase::AttentionBreak {
            return false;
        }
        match self.timers.cancel() {
            Some(timer) if timer.kind == TimerKind::AttentionBreak => {
                self.advance_then_check();
                true
            }
            _ => false,
        }
    }

    pub fn take_signals(&mut self) -> Vec<DisplaySignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase.is_done()
    }

    pub fn cursor(&self) -> usize {
        self.records.cursor()
    }

    pub fn session(&self) -> &SessionState {
        self.records.session()
    }

    pub fn snapshot(&self) -> SessionState {
        self.records.snapshot()
    }

    pub fn records(&self) -> &RecordStore<S> {
        &self.records
    }

    pub fn sequence(&self) -> &[StimulusItem] {
        self.records.sequence()
    }

    pub fn current_item(&self) -> Option<&StimulusItem> {
        self.records.current()
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// True once every field holds an in-range score, i.e. exactly when
    /// [`Self::submit_draft`] would be accepted.
    pub fn submit_enabled(&self) -> bool {
        self.phase == TrialPhase::Rating && self.draft.validate(self.config.scale_max).is_ok()
    }

    /// 1-based trial number and sequence length.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.records.sequence().len();
        ((self.records.cursor() + 1).min(total), total)
    }

    /// Absolute deadline of the pending timer, in the timer's nanoseconds.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.deadline()
    }

    pub fn break_seconds_remaining(&self) -> Option<u64> {
        if self.phase != TrialPhase::AttentionBreak {
            return None;
        }
        self.timers
            .remaining(self.timer.now())
            .map(|d| d.as_nanos().div_ceil(1_000_000_000) as u64)
    }
}
