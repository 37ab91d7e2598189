//! Sample collection state machine.
//!
//! `Idle -> Collecting -> Satisfied`, or `Collecting -> Cancelled` on an
//! operator abort. While collecting, a detected board is accepted only once
//! the debounce interval has elapsed since the previous acceptance (or since
//! collection began). Time is whatever clock the caller stamps offers with;
//! the pipeline uses frame timestamps.

use std::sync::Arc;
use std::time::Duration;

use camcal_core::{CalibrationSample, Observation, ReferencePattern, SampleError, SampleSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Collecting,
    Satisfied,
    Cancelled,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Collecting => "collecting",
            Phase::Satisfied => "satisfied",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    #[error("collector is {actual}, expected {expected}")]
    WrongPhase { expected: Phase, actual: Phase },
    #[error("only {collected} of {target} samples collected")]
    NotSatisfied { collected: usize, target: usize },
    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// Outcome of offering one detected board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offer {
    Accepted { count: usize, target: usize },
    /// Too soon after the previous acceptance.
    Debounced { remaining: Duration },
}

#[derive(Debug)]
pub struct SampleCollector {
    pattern: Arc<ReferencePattern>,
    target: usize,
    debounce: Duration,
    phase: Phase,
    samples: Vec<CalibrationSample>,
    last_accepted: Duration,
    consecutive_misses: usize,
}

impl SampleCollector {
    pub fn new(pattern: Arc<ReferencePattern>, target: usize, debounce: Duration) -> Self {
        Self {
            pattern,
            target,
            debounce,
            phase: Phase::Idle,
            samples: Vec::with_capacity(target),
            last_accepted: Duration::ZERO,
            consecutive_misses: 0,
        }
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), CollectError> {
        if self.phase != expected {
            return Err(CollectError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    /// Start collecting. `at` is the debounce reference for the first sample.
    pub fn begin(&mut self, at: Duration) -> Result<(), CollectError> {
        self.expect_phase(Phase::Idle)?;
        self.last_accepted = at;
        self.phase = if self.target == 0 {
            Phase::Satisfied
        } else {
            Phase::Collecting
        };
        Ok(())
    }

    /// Offer a detected and refined board seen at `at`.
    pub fn offer(&mut self, observation: Observation, at: Duration) -> Result<Offer, CollectError> {
        self.expect_phase(Phase::Collecting)?;
        self.consecutive_misses = 0;

        let elapsed = at.saturating_sub(self.last_accepted);
        if elapsed < self.debounce {
            return Ok(Offer::Debounced {
                remaining: self.debounce - elapsed,
            });
        }

        let sample = CalibrationSample::new(Arc::clone(&self.pattern), observation, at)?;
        self.samples.push(sample);
        self.last_accepted = at;
        if self.samples.len() == self.target {
            self.phase = Phase::Satisfied;
        }
        Ok(Offer::Accepted {
            count: self.samples.len(),
            target: self.target,
        })
    }

    /// A frame without a board. Returns the length of the current miss run.
    pub fn record_miss(&mut self) -> usize {
        if self.phase == Phase::Collecting {
            self.consecutive_misses += 1;
        }
        self.consecutive_misses
    }

    /// Abort collection, discarding partial samples. Returns how many were
    /// collected.
    pub fn cancel(&mut self) -> usize {
        let collected = self.samples.len();
        if matches!(self.phase, Phase::Idle | Phase::Collecting) {
            self.phase = Phase::Cancelled;
            self.samples.clear();
        }
        collected
    }

    /// Hand over the full correspondence set. Only valid once satisfied.
    pub fn into_samples(self) -> Result<SampleSet, CollectError> {
        if self.phase != Phase::Satisfied {
            return Err(CollectError::NotSatisfied {
                collected: self.samples.len(),
                target: self.target,
            });
        }
        Ok(SampleSet::new(self.samples)?)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_satisfied(&self) -> bool {
        self.phase == Phase::Satisfied
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn consecutive_misses(&self) -> usize {
        self.consecutive_misses
    }

    pub fn pattern(&self) -> &Arc<ReferencePattern> {
        &self.pattern
    }
}
