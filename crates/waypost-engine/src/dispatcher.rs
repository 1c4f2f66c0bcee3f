//! Inbound operations: each one runs exactly one dispatch cycle

use crate::cycle::CycleKind;
use crate::error::{Error, Result};
use crate::event::UiEvent;
use crate::input::{InputAnswer, InputRequestId};
use crate::script::ScriptFault;
use crate::session::Session;
use chrono::{DateTime, Utc};
use waypost_core::{CommandId, ObjectId, TimerExpiry, TimerHandle, ZoneEvent, ZonePoint};

/// Which callback of an update failed
#[derive(Debug, Clone, PartialEq)]
pub enum FaultSource {
    Timer(TimerHandle),
    Zone(ObjectId),
}

/// A script host failure that did not stop the update
#[derive(Debug)]
pub struct CallbackFault {
    pub source: FaultSource,
    pub fault: ScriptFault,
}

/// Outcome of one `update` cycle
///
/// Expiries are listed in the order the timers were registered and were
/// delivered before any zone event.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub timer_expiries: Vec<TimerExpiry>,
    pub zone_events: Vec<ZoneEvent>,
    /// Failed callbacks; the remaining callbacks still ran
    pub faults: Vec<CallbackFault>,
}

impl UpdateReport {
    pub fn is_quiet(&self) -> bool {
        self.timer_expiries.is_empty() && self.zone_events.is_empty()
    }
}

fn fault(cycle: CycleKind) -> impl FnOnce(ScriptFault) -> Error {
    move |fault| Error::ScriptHostFault { cycle, fault }
}

impl Session {
    /// Advance timers and evaluate zones for a position sample
    ///
    /// `position` is `None` when the host only needs timers serviced or has
    /// no fix. Expired timers are delivered first, then zone transitions.
    pub fn update(&self, position: Option<ZonePoint>, now: DateTime<Utc>) -> Result<UpdateReport> {
        self.run_cycle(CycleKind::Update, Some(now), |script, cycle| {
            let timer_expiries = cycle.cartridge_mut().advance_timers(now)?;
            let zone_events = cycle.cartridge_mut().evaluate_position(position)?;
            let mut report = UpdateReport::default();

            for expiry in &timer_expiries {
                // An earlier callback may have removed this timer
                if cycle.cartridge().timers().get(expiry.handle).is_none() {
                    tracing::debug!(handle = %expiry.handle, "skipping expiry of removed timer");
                    continue;
                }
                if let Err(fault) = script.on_timer(expiry, cycle) {
                    tracing::warn!(handle = %expiry.handle, %fault, "timer callback failed");
                    report.faults.push(CallbackFault {
                        source: FaultSource::Timer(expiry.handle),
                        fault,
                    });
                }
            }
            for event in &zone_events {
                if let Err(fault) = script.on_zone(event, cycle) {
                    tracing::warn!(zone = %event.zone(), %fault, "zone callback failed");
                    report.faults.push(CallbackFault {
                        source: FaultSource::Zone(event.zone()),
                        fault,
                    });
                }
            }

            if position.is_some() {
                cycle.refresh_distance_display();
            }
            report.timer_expiries = timer_expiries;
            report.zone_events = zone_events;
            if !report.is_quiet() {
                cycle.refresh_ui();
            }
            Ok(report)
        })
    }

    /// Invoke a command the player chose
    pub fn invoke_command(&self, command: CommandId, target: Option<ObjectId>) -> Result<()> {
        self.run_cycle(CycleKind::Command, None, |script, cycle| {
            let (enabled, accepts) = {
                let cmd = cycle.cartridge().command(command)?;
                (cmd.enabled, cmd.target.accepts(target))
            };
            if !enabled {
                return Err(Error::CommandDisabled(command));
            }
            if !accepts {
                return Err(Error::InvalidCommandTarget { command, target });
            }
            if let Some(target) = target {
                cycle.cartridge().object(target)?;
            }
            tracing::debug!(%command, ?target, "command invoked");
            script.on_command(command, target, cycle).map_err(fault(CycleKind::Command))?;
            cycle.refresh_ui();
            Ok(())
        })
    }

    /// Resolve the pending input request
    ///
    /// Fails with `NoPendingInput` when `request` is not the open request.
    pub fn answer_input(&self, request: InputRequestId, answer: InputAnswer) -> Result<()> {
        self.run_cycle(CycleKind::Input, None, |script, cycle| {
            let request = cycle.resolve_input(request, &answer)?;
            tracing::debug!(id = %request.id, ?answer, "input resolved");
            script
                .on_input(&request, &answer, cycle)
                .map_err(fault(CycleKind::Input))?;
            cycle.refresh_ui();
            Ok(())
        })
    }

    /// Report a dialog or message box being closed
    pub fn notify_ui_event(&self, event: UiEvent) -> Result<()> {
        self.run_cycle(CycleKind::UiEvent, None, |script, cycle| {
            script.on_ui_event(&event, cycle).map_err(fault(CycleKind::UiEvent))?;
            cycle.refresh_ui();
            Ok(())
        })
    }

    /// Let the script prepare for a save, then ask the host to save
    pub fn request_save(&self) -> Result<()> {
        self.run_cycle(CycleKind::Save, None, |script, cycle| {
            script.on_save(cycle).map_err(fault(CycleKind::Save))?;
            cycle.save_game();
            Ok(())
        })
    }

    /// Start play
    pub fn request_start(&self) -> Result<()> {
        self.run_cycle(CycleKind::Start, None, |script, cycle| {
            script.on_start(cycle).map_err(fault(CycleKind::Start))?;
            cycle.refresh_ui();
            Ok(())
        })
    }

    /// Freeze every timer, e.g. while the host is in the background
    pub fn pause(&self, now: DateTime<Utc>) -> Result<()> {
        self.run_cycle(CycleKind::RunState, Some(now), |_, cycle| {
            cycle.cartridge_mut().pause_timers(now)?;
            tracing::info!("session paused");
            Ok(())
        })
    }

    pub fn resume(&self, now: DateTime<Utc>) -> Result<()> {
        self.run_cycle(CycleKind::RunState, Some(now), |_, cycle| {
            cycle.cartridge_mut().resume_timers(now)?;
            tracing::info!("session resumed");
            Ok(())
        })
    }
}
