//! A loaded cartridge together with its script host and host application

use crate::assets::{bind_media, AssetLibrary};
use crate::cycle::{Cycle, CycleGuard, CycleKind};
use crate::error::{Error, Result};
use crate::host::{Host, HostTimerId};
use crate::input::{InputRequest, InputRequestId, InputSlot, InputState};
use crate::script::ScriptHost;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::{Rc, Weak};
use waypost_core::{Cartridge, ObjectId, ObjectSpec, ScheduleChange, TimerHandle, ValueMap};
use waypost_format::{ContainerForm, LoadConfig, RawCartridge};

/// Name of the hidden item marking where the cartridge starts
pub const START_MARKER_NAME: &str = "The start of this cartridge";

/// Register the hidden item standing at the starting location
///
/// It carries the starting description and the cartridge icon so a host can
/// point the player at the start before any zone is active.
fn place_start_marker(cartridge: &mut Cartridge) -> Result<ObjectId> {
    let meta = cartridge.meta();
    let mut spec = ObjectSpec::named(START_MARKER_NAME)
        .with_description(meta.starting_description.clone())
        .at(meta.starting_location)
        .with_visible(false);
    spec.media = cartridge.icon();
    let id = cartridge.register_item(spec)?;
    tracing::debug!(marker = %id, "start marker placed");
    Ok(id)
}

/// Mutable state of a loaded session, reachable only inside a cycle
pub(crate) struct EngineState {
    cartridge: Cartridge,
    script: Box<dyn ScriptHost>,
    host: Box<dyn Host>,
    inputs: InputSlot,
    host_timers: IndexMap<TimerHandle, HostTimerId>,
    env: ValueMap,
}

struct Inner {
    cycle: Cell<Option<CycleKind>>,
    state: RefCell<Option<EngineState>>,
    assets: AssetLibrary,
    form: ContainerForm,
}

/// Handle to a running cartridge
///
/// Cloning the handle shares the session. Hosts that need to call back into
/// the session from their own callbacks should keep a `WeakSession`.
#[derive(Clone)]
pub struct Session {
    inner: Rc<Inner>,
}

/// Non-owning handle to a session
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<Inner>,
}

impl WeakSession {
    pub fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session { inner })
    }
}

// The cycle guard already serializes access; a failed borrow means a
// handle was used from inside a callback the guard cannot see.
fn borrow_conflict(kind: CycleKind) -> Error {
    Error::ReentrancyViolation {
        active: kind,
        attempted: kind,
    }
}

/// Mirror the cartridge's timer schedule into host wake-ups
fn sync_host_timers(
    cartridge: &mut Cartridge,
    host: &mut dyn Host,
    registered: &mut IndexMap<TimerHandle, HostTimerId>,
) {
    for change in cartridge.take_schedule_changes() {
        match change {
            ScheduleChange::Armed { handle, remaining, .. } => {
                if let Some(previous) = registered.shift_remove(&handle) {
                    host.cancel_timer(previous);
                }
                let id = host.register_timer(remaining, handle);
                tracing::trace!(%handle, ?id, "host wake-up registered");
                registered.insert(handle, id);
            }
            ScheduleChange::Disarmed { handle } => {
                if let Some(previous) = registered.shift_remove(&handle) {
                    host.cancel_timer(previous);
                }
            }
        }
    }
}

impl Session {
    /// Load a cartridge from container bytes
    ///
    /// On failure no session exists and nothing of the cartridge remains.
    pub fn load(
        bytes: &[u8],
        source_name: &str,
        config: &LoadConfig,
        script: Box<dyn ScriptHost>,
        host: Box<dyn Host>,
    ) -> Result<Self> {
        let raw = waypost_format::load_bytes(bytes, source_name, config)?;
        Self::load_raw(raw, script, host)
    }

    /// Load a cartridge file or unpacked archive directory
    pub fn load_path(
        path: impl AsRef<Path>,
        config: &LoadConfig,
        script: Box<dyn ScriptHost>,
        host: Box<dyn Host>,
    ) -> Result<Self> {
        let raw = waypost_format::load_path(path, config)?;
        Self::load_raw(raw, script, host)
    }

    /// Build a session from a parsed container
    ///
    /// The script host registers the cartridge's objects in a setup cycle,
    /// then container media is bound to the registered media objects.
    pub fn load_raw(
        raw: RawCartridge,
        mut script: Box<dyn ScriptHost>,
        mut host: Box<dyn Host>,
    ) -> Result<Self> {
        let RawCartridge {
            form,
            meta,
            script: payload,
            media,
            icon,
            splash,
            env,
            ..
        } = raw;

        let now = host.current_time();
        let mut cartridge = Cartridge::new(meta);
        let mut inputs = InputSlot::default();
        let mut host_timers = IndexMap::new();

        cartridge.begin_cycle()?;
        let setup = {
            let empty = AssetLibrary::default();
            let mut cycle = Cycle::new(
                CycleKind::Setup,
                now,
                &mut cartridge,
                &mut *host,
                &empty,
                &env,
                &mut inputs,
            );
            script
                .setup(&payload, &env, &mut cycle)
                .map_err(|fault| Error::ScriptHostFault {
                    cycle: CycleKind::Setup,
                    fault,
                })
        };
        let assets = setup
            .and_then(|()| bind_media(&mut cartridge, media, icon, splash))
            .and_then(|assets| {
                place_start_marker(&mut cartridge)?;
                Ok(assets)
            });
        sync_host_timers(&mut cartridge, &mut *host, &mut host_timers);
        cartridge.end_cycle();

        let assets = match assets {
            Ok(assets) => assets,
            Err(err) => {
                for (_, id) in host_timers.drain(..) {
                    host.cancel_timer(id);
                }
                tracing::warn!(error = %err, "cartridge setup failed");
                return Err(err);
            }
        };

        tracing::info!(
            name = %cartridge.meta().name,
            form = ?form,
            objects = cartridge.objects().count(),
            media = assets.len(),
            "cartridge loaded"
        );

        let state = EngineState {
            cartridge,
            script,
            host,
            inputs,
            host_timers,
            env,
        };
        Ok(Self {
            inner: Rc::new(Inner {
                cycle: Cell::new(None),
                state: RefCell::new(Some(state)),
                assets,
                form,
            }),
        })
    }

    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Container form the cartridge was loaded from
    pub fn form(&self) -> ContainerForm {
        self.inner.form
    }

    /// Check whether the cartridge is still loaded
    pub fn is_loaded(&self) -> bool {
        self.inner
            .state
            .try_borrow()
            .map(|state| state.is_some())
            .unwrap_or(true)
    }

    /// Kind of the cycle currently running, if any
    pub fn active_cycle(&self) -> Option<CycleKind> {
        self.inner.cycle.get()
    }

    /// Bytes of a media object
    ///
    /// Safe to call at any time, including from host callbacks.
    pub fn media_bytes(&self, media: waypost_core::ObjectId) -> Option<&[u8]> {
        self.inner.assets.get(media)
    }

    /// Read the cartridge between cycles
    pub fn with_cartridge<R>(&self, f: impl FnOnce(&Cartridge) -> R) -> Result<R> {
        self.inspect(|state| f(&state.cartridge))
    }

    /// The question waiting for an answer, if any
    pub fn pending_input(&self) -> Result<Option<InputRequest>> {
        self.inspect(|state| state.inputs.pending().cloned())
    }

    pub fn input_state(&self, id: InputRequestId) -> Result<Option<InputState>> {
        self.inspect(|state| state.inputs.state(id))
    }

    fn inspect<R>(&self, f: impl FnOnce(&EngineState) -> R) -> Result<R> {
        let _guard = CycleGuard::enter(&self.inner.cycle, CycleKind::Inspect)?;
        let slot = self
            .inner
            .state
            .try_borrow()
            .map_err(|_| borrow_conflict(CycleKind::Inspect))?;
        let state = slot.as_ref().ok_or(Error::NotLoaded)?;
        Ok(f(state))
    }

    /// Run one dispatch cycle
    ///
    /// Opens the cartridge for mutation, hands the script host and a `Cycle`
    /// to `f`, then mirrors timer schedule changes to the host and closes
    /// the cartridge again, whatever `f` returned.
    pub(crate) fn run_cycle<R>(
        &self,
        kind: CycleKind,
        now: Option<DateTime<Utc>>,
        f: impl FnOnce(&mut dyn ScriptHost, &mut Cycle<'_>) -> Result<R>,
    ) -> Result<R> {
        let _guard = CycleGuard::enter(&self.inner.cycle, kind)?;
        let mut slot = self.inner.state.try_borrow_mut().map_err(|_| borrow_conflict(kind))?;
        let state = slot.as_mut().ok_or(Error::NotLoaded)?;
        let EngineState {
            cartridge,
            script,
            host,
            inputs,
            host_timers,
            env,
        } = state;

        let now = now.unwrap_or_else(|| host.current_time());
        let host: &mut dyn Host = &mut **host;
        let _span = tracing::debug_span!("cycle", %kind).entered();
        cartridge.begin_cycle()?;
        let result = {
            let assets = &self.inner.assets;
            let mut cycle = Cycle::new(kind, now, cartridge, &mut *host, assets, env, inputs);
            f(&mut **script, &mut cycle)
        };
        sync_host_timers(cartridge, host, host_timers);
        cartridge.end_cycle();
        result
    }

    /// Tear the session down, cancelling every host wake-up
    ///
    /// Later calls on any handle of this session fail with `NotLoaded`.
    pub fn unload(&self) -> Result<()> {
        let _guard = CycleGuard::enter(&self.inner.cycle, CycleKind::Unload)?;
        let mut slot = self
            .inner
            .state
            .try_borrow_mut()
            .map_err(|_| borrow_conflict(CycleKind::Unload))?;
        let mut state = slot.take().ok_or(Error::NotLoaded)?;
        for (_, id) in state.host_timers.drain(..) {
            state.host.cancel_timer(id);
        }
        tracing::info!(name = %state.cartridge.meta().name, "cartridge unloaded");
        Ok(())
    }
}
