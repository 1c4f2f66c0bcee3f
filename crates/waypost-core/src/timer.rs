//! Timer subsystem with pause-aware accrual
//!
//! Every clock keeps the running time it has accumulated and derives
//! `remaining` from `duration - accumulated`, so missed or irregular
//! `advance` calls never make a timer drift.
//!
//! - `TimerClock` - One countdown or interval clock
//! - `TimerSubsystem` - All clocks plus the global run state
//! - `ScheduleChange` - Wake-up requests for the host

use crate::error::{Error, Result};
use crate::ObjectId;
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle of a clock in the timer subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

impl TimerHandle {
    /// Get the raw handle value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

/// Behaviour when the duration is used up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimerKind {
    /// Fires once, then stays expired until restarted
    #[default]
    Countdown,
    /// Fires every `duration` while running
    Interval,
}

/// Status of a single clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimerStatus {
    /// Never started, or reset
    #[default]
    Idle,
    Running,
    /// Stopped; keeps its accumulated time
    Paused,
    /// A countdown that reached zero
    Expired,
}

/// Who is told when a clock fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerToken {
    /// A timer object of the cartridge
    Object(ObjectId),
    /// An anonymous timer added through `add_timer`
    Callback(u64),
}

/// One countdown or interval clock
#[derive(Debug, Clone, PartialEq)]
pub struct TimerClock {
    kind: TimerKind,
    duration: TimeDelta,
    accumulated: TimeDelta,
    status: TimerStatus,
    last_sample: Option<DateTime<Utc>>,
    token: TimerToken,
}

impl TimerClock {
    /// Create an idle clock
    pub fn new(kind: TimerKind, duration: TimeDelta, token: TimerToken) -> Self {
        Self {
            kind,
            duration,
            accumulated: TimeDelta::zero(),
            status: TimerStatus::Idle,
            last_sample: None,
            token,
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn token(&self) -> TimerToken {
        self.token
    }

    /// Running time accumulated since the last (re)start
    pub fn elapsed(&self) -> TimeDelta {
        self.accumulated
    }

    /// Time left before the clock fires, never negative
    pub fn remaining(&self) -> TimeDelta {
        (self.duration - self.accumulated).max(TimeDelta::zero())
    }

    /// Check if the clock is running
    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Add the running time since the last sample
    fn accrue(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_sample {
            let delta = now - last;
            if delta > TimeDelta::zero() {
                self.accumulated += delta;
            }
            self.last_sample = Some(last.max(now));
        }
    }
}

/// A clock that fired during `advance`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerExpiry {
    pub handle: TimerHandle,
    pub token: TimerToken,
    pub kind: TimerKind,
    pub at: DateTime<Utc>,
}

/// Change to the set of wake-ups the host should schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleChange {
    /// Wake the engine after `remaining`
    Armed {
        handle: TimerHandle,
        token: TimerToken,
        remaining: TimeDelta,
    },
    /// Forget any pending wake-up for the clock
    Disarmed { handle: TimerHandle },
}

/// All clocks of a session plus the global run state
#[derive(Debug, Clone, Default)]
pub struct TimerSubsystem {
    clocks: IndexMap<TimerHandle, TimerClock>,
    next_handle: u64,
    paused: bool,
    changes: Vec<ScheduleChange>,
}

impl TimerSubsystem {
    /// Create an empty subsystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an idle clock and return its handle
    pub fn add_timer(
        &mut self,
        kind: TimerKind,
        duration: TimeDelta,
        token: TimerToken,
    ) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.clocks
            .insert(handle, TimerClock::new(kind, duration, token));
        handle
    }

    /// Remove a clock; a pending expiry will never fire
    pub fn remove_timer(&mut self, handle: TimerHandle) -> Result<TimerClock> {
        let clock = self
            .clocks
            .shift_remove(&handle)
            .ok_or(Error::TimerNotFound(handle))?;
        if clock.is_running() && !self.paused {
            self.changes.push(ScheduleChange::Disarmed { handle });
        }
        Ok(clock)
    }

    /// Get a clock
    pub fn get(&self, handle: TimerHandle) -> Option<&TimerClock> {
        self.clocks.get(&handle)
    }

    fn clock_mut(&mut self, handle: TimerHandle) -> Result<&mut TimerClock> {
        self.clocks
            .get_mut(&handle)
            .ok_or(Error::TimerNotFound(handle))
    }

    /// Start or continue a clock
    ///
    /// Returns `false` when it was already running. An expired or idle clock
    /// starts again from its full duration.
    pub fn start(&mut self, handle: TimerHandle, now: DateTime<Utc>) -> Result<bool> {
        let paused = self.paused;
        let clock = self.clock_mut(handle)?;
        match clock.status {
            TimerStatus::Running => return Ok(false),
            TimerStatus::Idle | TimerStatus::Expired => clock.accumulated = TimeDelta::zero(),
            TimerStatus::Paused => {}
        }
        clock.status = TimerStatus::Running;
        clock.last_sample = Some(now);
        let change = ScheduleChange::Armed {
            handle,
            token: clock.token,
            remaining: clock.remaining(),
        };
        if !paused {
            self.changes.push(change);
        }
        Ok(true)
    }

    /// Stop a running clock, keeping its accumulated time
    ///
    /// Returns `false` when it was not running.
    pub fn stop(&mut self, handle: TimerHandle, now: DateTime<Utc>) -> Result<bool> {
        let paused = self.paused;
        let clock = self.clock_mut(handle)?;
        if !clock.is_running() {
            return Ok(false);
        }
        if !paused {
            clock.accrue(now);
        }
        clock.accumulated = clock.accumulated.min(clock.duration);
        clock.status = TimerStatus::Paused;
        clock.last_sample = None;
        if !paused {
            self.changes.push(ScheduleChange::Disarmed { handle });
        }
        Ok(true)
    }

    /// Return a clock to idle with nothing accumulated
    pub fn reset(&mut self, handle: TimerHandle) -> Result<()> {
        let paused = self.paused;
        let clock = self.clock_mut(handle)?;
        let was_running = clock.is_running();
        clock.accumulated = TimeDelta::zero();
        clock.status = TimerStatus::Idle;
        clock.last_sample = None;
        if was_running && !paused {
            self.changes.push(ScheduleChange::Disarmed { handle });
        }
        Ok(())
    }

    /// Change the duration; a running clock is rescheduled
    pub fn set_duration(&mut self, handle: TimerHandle, duration: TimeDelta) -> Result<()> {
        let paused = self.paused;
        let clock = self.clock_mut(handle)?;
        clock.duration = duration;
        if clock.is_running() && !paused {
            let change = ScheduleChange::Armed {
                handle,
                token: clock.token,
                remaining: clock.remaining(),
            };
            self.changes.push(change);
        }
        Ok(())
    }

    /// Accrue running time up to `now` and collect the clocks that fired
    ///
    /// Expiries are returned in registration order. Nothing accrues while the
    /// run state is paused.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Vec<TimerExpiry> {
        if self.paused {
            return Vec::new();
        }

        let mut fired = Vec::new();
        for (&handle, clock) in self.clocks.iter_mut() {
            if !clock.is_running() {
                continue;
            }
            clock.accrue(now);
            if clock.accumulated < clock.duration {
                continue;
            }

            match clock.kind {
                TimerKind::Countdown => {
                    clock.accumulated = clock.duration;
                    clock.status = TimerStatus::Expired;
                    clock.last_sample = None;
                    self.changes.push(ScheduleChange::Disarmed { handle });
                }
                TimerKind::Interval => {
                    // At most one firing per advance; overshoot carries over
                    let overshoot = clock.accumulated - clock.duration;
                    clock.accumulated = overshoot.min(clock.duration);
                    self.changes.push(ScheduleChange::Armed {
                        handle,
                        token: clock.token,
                        remaining: clock.remaining(),
                    });
                }
            }

            fired.push(TimerExpiry {
                handle,
                token: clock.token,
                kind: clock.kind,
                at: now,
            });
        }
        fired
    }

    /// Freeze every clock at `now`
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.paused {
            return;
        }
        for (&handle, clock) in self.clocks.iter_mut() {
            if clock.is_running() {
                clock.accrue(now);
                self.changes.push(ScheduleChange::Disarmed { handle });
            }
        }
        self.paused = true;
    }

    /// Unfreeze; running clocks continue from `now`
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if !self.paused {
            return;
        }
        self.paused = false;
        for (&handle, clock) in self.clocks.iter_mut() {
            if clock.is_running() {
                clock.last_sample = Some(now);
                self.changes.push(ScheduleChange::Armed {
                    handle,
                    token: clock.token,
                    remaining: clock.remaining(),
                });
            }
        }
    }

    /// Check if the run state is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Drain the schedule changes recorded since the last call
    pub fn take_changes(&mut self) -> Vec<ScheduleChange> {
        std::mem::take(&mut self.changes)
    }

    /// Iterate clocks in registration order
    pub fn iter(&self) -> impl Iterator<Item = (TimerHandle, &TimerClock)> {
        self.clocks.iter().map(|(h, c)| (*h, c))
    }

    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }
}
