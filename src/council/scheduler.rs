//! Timed removal of personas while the debate runs.
//!
//! `Armed` waits out the warm-up, `Ticking` eliminates one non-impostor
//! persona per interval, `Done` is reached after the configured number of
//! ticks or as soon as the session stops.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::persona::PersonaName;

use super::eligibility::EliminationOutcome;
use super::session::SessionHandle;

/// Elimination timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub warmup: Duration,
    pub interval: Duration,
    pub max_eliminations: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            warmup: Duration::from_secs(240),
            interval: Duration::from_secs(60),
            max_eliminations: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Armed,
    Ticking,
    Done,
}

/// What a finished scheduler did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Ticks that fired, including skipped ones
    pub ticks: u32,
    pub eliminated: Vec<PersonaName>,
    pub skipped: u32,
}

/// Elimination timer for one session.
#[derive(Debug)]
pub struct EliminationScheduler {
    settings: SchedulerSettings,
    phase: Mutex<SchedulerPhase>,
}

impl EliminationScheduler {
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            phase: Mutex::new(SchedulerPhase::Armed),
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: SchedulerPhase) {
        *self.phase.lock() = phase;
    }

    /// Run on its own task.
    pub fn spawn(self: Arc<Self>, session: Arc<SessionHandle>) -> JoinHandle<SchedulerReport> {
        tokio::spawn(async move { self.run(&session).await })
    }

    /// Run until `Done`.
    pub async fn run(&self, session: &SessionHandle) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        let cancel = session.cancellation().clone();

        if !self.settings.enabled || self.settings.max_eliminations == 0 {
            self.set_phase(SchedulerPhase::Done);
            return report;
        }

        self.set_phase(SchedulerPhase::Armed);
        debug!(session_id = %session.id(), warmup = ?self.settings.warmup, "Elimination armed");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.set_phase(SchedulerPhase::Done);
                return report;
            }
            _ = tokio::time::sleep(self.settings.warmup) => {}
        }

        self.set_phase(SchedulerPhase::Ticking);
        let mut timer = tokio::time::interval_at(Instant::now() + self.settings.interval, self.settings.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while report.ticks < self.settings.max_eliminations {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }
            report.ticks += 1;

            match session.eliminate_one() {
                Some(EliminationOutcome::Eliminated(name)) => report.eliminated.push(name),
                Some(EliminationOutcome::SkippedFloor) => {
                    report.skipped += 1;
                    warn!(session_id = %session.id(), tick = report.ticks, "Skipping elimination, too few personas left");
                }
                Some(EliminationOutcome::NoneEligible) => {
                    report.skipped += 1;
                    warn!(session_id = %session.id(), tick = report.ticks, "No persona left to eliminate");
                }
                None => break,
            }
        }

        self.set_phase(SchedulerPhase::Done);
        info!(
            session_id = %session.id(),
            ticks = report.ticks,
            eliminated = report.eliminated.len(),
            "Elimination schedule finished"
        );
        report
    }
}
