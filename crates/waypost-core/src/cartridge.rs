//! The cartridge: root owner of every object of a loaded game
//!
//! Objects live in one arena keyed by `ObjectId`; relations such as a zone's
//! contents or a task's parent are id lookups into it. Mutations are only
//! accepted while a dispatch cycle is open.

use crate::command::{Command, CommandSpec, CommandTarget};
use crate::error::{Error, Result};
use crate::geo::{vector_to_point, ZonePoint};
use crate::object::{
    Character, Container, Input, InputKind, Item, Media, MediaResource, ObjectKind, ObjectSpec,
    ShowObjects, Task, TaskState, TimerObject, ZObject, Zone, ZoneSpec,
};
use crate::timer::{ScheduleChange, TimerExpiry, TimerHandle, TimerKind, TimerSubsystem, TimerToken};
use crate::zone::{evaluate_zones, ZoneEvent, ZoneState};
use crate::{CommandId, ObjectId, Value, ValueMap};
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Descriptive data of a cartridge, taken from its container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CartridgeMeta {
    /// Activity type, e.g. "Tour Guide" or "Fiction"
    pub activity: String,
    pub author: String,
    pub description: String,
    pub guid: String,
    pub name: String,
    pub starting_location: ZonePoint,
    pub starting_description: String,
    pub url: String,
    /// Target device
    pub device: String,
    pub version: String,
    /// Name of the player the cartridge was compiled for
    pub user: String,
    pub completion_code: String,
    pub created: Option<DateTime<Utc>>,
}

/// Root of the object model
#[derive(Debug, Clone)]
pub struct Cartridge {
    meta: CartridgeMeta,
    objects: IndexMap<ObjectId, ZObject>,
    commands: IndexMap<CommandId, Command>,
    timers: TimerSubsystem,
    player: ObjectId,
    variables: ValueMap,
    complete: bool,
    icon: Option<ObjectId>,
    splash: Option<ObjectId>,
    next_object: u32,
    next_command: u32,
    next_callback: u64,
    media_count: u16,
    cycle_open: bool,
}

impl Cartridge {
    /// Create a cartridge holding only the player
    pub fn new(meta: CartridgeMeta) -> Self {
        let mut cartridge = Self {
            meta,
            objects: IndexMap::new(),
            commands: IndexMap::new(),
            timers: TimerSubsystem::new(),
            player: ObjectId::new(1),
            variables: ValueMap::new(),
            complete: false,
            icon: None,
            splash: None,
            next_object: 1,
            next_command: 1,
            next_callback: 1,
            media_count: 0,
            cycle_open: false,
        };
        let spec = ObjectSpec::named(cartridge.meta.user.clone());
        let player = ObjectKind::Character(Character { is_player: true });
        cartridge.player = cartridge.insert(spec, player);
        cartridge
    }

    // Cycle bracket

    /// Open a dispatch cycle, enabling mutation
    pub fn begin_cycle(&mut self) -> Result<()> {
        if self.cycle_open {
            return Err(Error::CycleAlreadyOpen);
        }
        self.cycle_open = true;
        Ok(())
    }

    /// Close the current dispatch cycle
    pub fn end_cycle(&mut self) {
        self.cycle_open = false;
    }

    /// Check if a dispatch cycle is open
    pub fn is_cycle_open(&self) -> bool {
        self.cycle_open
    }

    fn ensure_open(&self) -> Result<()> {
        if self.cycle_open {
            Ok(())
        } else {
            Err(Error::MutationOutsideCycle)
        }
    }

    // Lookup

    pub fn meta(&self) -> &CartridgeMeta {
        &self.meta
    }

    /// The player character
    pub fn player(&self) -> ObjectId {
        self.player
    }

    /// Last known position of the player
    pub fn player_position(&self) -> Option<ZonePoint> {
        self.objects.get(&self.player).and_then(|p| p.location)
    }

    /// Get an object
    pub fn get(&self, id: ObjectId) -> Option<&ZObject> {
        self.objects.get(&id)
    }

    /// Get an object or fail with `ObjectNotFound`
    pub fn object(&self, id: ObjectId) -> Result<&ZObject> {
        self.objects.get(&id).ok_or(Error::ObjectNotFound(id))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut ZObject> {
        self.objects.get_mut(&id).ok_or(Error::ObjectNotFound(id))
    }

    /// Iterate objects in registration order
    pub fn objects(&self) -> impl Iterator<Item = &ZObject> {
        self.objects.values()
    }

    /// Iterate zones in registration order
    pub fn zones(&self) -> impl Iterator<Item = (&ZObject, &Zone)> {
        self.objects
            .values()
            .filter_map(|o| o.as_zone().map(|z| (o, z)))
    }

    /// Find an object by name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .values()
            .find(|o| o.name.eq_ignore_ascii_case(name))
            .map(|o| o.id)
    }

    /// Get a command
    pub fn command(&self, id: CommandId) -> Result<&Command> {
        self.commands.get(&id).ok_or(Error::CommandNotFound(id))
    }

    /// Iterate commands in registration order
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn timers(&self) -> &TimerSubsystem {
        &self.timers
    }

    /// The timer object owning a clock, if it is not an anonymous timer
    pub fn timer_object(&self, handle: TimerHandle) -> Option<ObjectId> {
        match self.timers.get(handle)?.token() {
            TimerToken::Object(id) => Some(id),
            TimerToken::Callback(_) => None,
        }
    }

    /// Time left on a timer object
    pub fn remaining(&self, id: ObjectId) -> Result<TimeDelta> {
        let handle = self.timer_handle(id)?;
        self.timers
            .get(handle)
            .map(|c| c.remaining())
            .ok_or(Error::TimerNotFound(handle))
    }

    fn timer_handle(&self, id: ObjectId) -> Result<TimerHandle> {
        let object = self.object(id)?;
        object.timer_handle().ok_or(Error::WrongKind {
            id,
            expected: "timer",
            got: object.kind.tag(),
        })
    }

    pub fn variables(&self) -> &ValueMap {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Media shown as the cartridge icon
    pub fn icon(&self) -> Option<ObjectId> {
        self.icon
    }

    /// Media shown on the start screen
    pub fn splash(&self) -> Option<ObjectId> {
        self.splash
    }

    // Registration

    fn insert(&mut self, spec: ObjectSpec, kind: ObjectKind) -> ObjectId {
        let id = ObjectId::new(self.next_object);
        self.next_object += 1;
        let object = ZObject {
            id,
            name: spec.name,
            description: spec.description,
            visible: spec.visible,
            active: spec.active,
            media: spec.media,
            icon: spec.icon,
            container: spec.container,
            location: spec.location,
            current_distance: None,
            current_bearing: None,
            commands: Vec::new(),
            kind,
        };
        self.objects.insert(id, object);
        id
    }

    fn check_container(&self, container: Container) -> Result<()> {
        if let Container::Object(id) = container {
            self.object(id)?;
        }
        Ok(())
    }

    /// Register an item
    pub fn register_item(&mut self, spec: ObjectSpec) -> Result<ObjectId> {
        self.ensure_open()?;
        self.check_container(spec.container)?;
        Ok(self.insert(spec, ObjectKind::Item(Item::default())))
    }

    /// Register a non-player character
    pub fn register_character(&mut self, spec: ObjectSpec) -> Result<ObjectId> {
        self.ensure_open()?;
        self.check_container(spec.container)?;
        Ok(self.insert(spec, ObjectKind::Character(Character::default())))
    }

    /// Register a zone
    ///
    /// A zone with unusable geometry is still registered but never evaluated.
    pub fn register_zone(&mut self, spec: ObjectSpec, zone: ZoneSpec) -> Result<ObjectId> {
        self.ensure_open()?;
        let invalid_geometry = zone.boundary.validate().err();
        if let Some(reason) = &invalid_geometry {
            let err = Error::InvalidGeometry {
                zone: spec.name.clone(),
                reason: reason.clone(),
            };
            tracing::warn!(error = %err, "zone excluded from evaluation");
        }
        let original_point = zone
            .original_point
            .or_else(|| zone.boundary.centroid())
            .unwrap_or_default();
        let observed_active = spec.active;
        let kind = ObjectKind::Zone(Zone {
            boundary: zone.boundary,
            original_point,
            show_objects: zone.show_objects,
            proximity_range: zone.proximity_range,
            distance_range: zone.distance_range,
            state: ZoneState::NotInRange,
            invalid_geometry,
            observed_active,
        });
        Ok(self.insert(spec, kind))
    }

    /// Register a timer object with an idle clock
    pub fn register_timer(
        &mut self,
        spec: ObjectSpec,
        kind: TimerKind,
        duration: TimeDelta,
    ) -> Result<ObjectId> {
        self.ensure_open()?;
        let id = ObjectId::new(self.next_object);
        let handle = self.timers.add_timer(kind, duration, TimerToken::Object(id));
        Ok(self.insert(spec, ObjectKind::Timer(TimerObject { handle })))
    }

    /// Register a task, optionally below a parent task
    pub fn register_task(
        &mut self,
        spec: ObjectSpec,
        parent: Option<ObjectId>,
        state: TaskState,
    ) -> Result<ObjectId> {
        self.ensure_open()?;
        if let Some(parent) = parent {
            self.expect_task(parent)?;
        }
        Ok(self.insert(spec, ObjectKind::Task(Task { state, parent })))
    }

    /// Register a media object
    ///
    /// Media objects are numbered in registration order; the number is the
    /// object's index into a compiled container's media table.
    pub fn register_media(
        &mut self,
        spec: ObjectSpec,
        resources: Vec<MediaResource>,
    ) -> Result<ObjectId> {
        self.ensure_open()?;
        let index = self.media_count.checked_add(1).ok_or(Error::TooManyMedia)?;
        self.media_count = index;
        let media = Media {
            resources,
            asset_index: Some(index),
        };
        Ok(self.insert(spec, ObjectKind::Media(media)))
    }

    /// Register an input object
    pub fn register_input(
        &mut self,
        spec: ObjectSpec,
        question: impl Into<String>,
        kind: InputKind,
    ) -> Result<ObjectId> {
        self.ensure_open()?;
        let input = Input {
            question: question.into(),
            kind,
        };
        Ok(self.insert(spec, ObjectKind::Input(input)))
    }

    /// Register a command, owned by an object or by the cartridge itself
    pub fn register_command(
        &mut self,
        owner: Option<ObjectId>,
        spec: CommandSpec,
    ) -> Result<CommandId> {
        self.ensure_open()?;
        if let CommandTarget::With { allowed, .. } = &spec.target {
            for id in allowed {
                self.object(*id)?;
            }
        }
        let id = CommandId::new(self.next_command);
        if let Some(owner) = owner {
            self.object_mut(owner)?.commands.push(id);
        }
        self.next_command += 1;
        self.commands.insert(
            id,
            Command {
                id,
                owner,
                name: spec.name,
                text: spec.text,
                enabled: spec.enabled,
                visible: spec.visible,
                target: spec.target,
                empty_target_list_text: spec.empty_target_list_text,
            },
        );
        Ok(id)
    }

    // Mutation

    /// Move an object into a container
    pub fn move_to(&mut self, id: ObjectId, container: Container) -> Result<()> {
        self.ensure_open()?;
        self.object(id)?;
        if let Container::Object(target) = container {
            self.object(target)?;
            let mut next = Some(target);
            let mut steps = 0;
            while let Some(current) = next {
                if current == id {
                    return Err(Error::ContainmentCycle {
                        object: id,
                        container: target,
                    });
                }
                steps += 1;
                if steps > self.objects.len() {
                    break;
                }
                next = self.objects.get(&current).and_then(|o| o.container.object());
            }
        }
        self.object_mut(id)?.container = container;
        Ok(())
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> Result<()> {
        self.ensure_open()?;
        self.object_mut(id)?.visible = visible;
        Ok(())
    }

    /// Activate or deactivate an object; zones report the change on the next evaluation
    pub fn set_active(&mut self, id: ObjectId, active: bool) -> Result<()> {
        self.ensure_open()?;
        self.object_mut(id)?.active = active;
        Ok(())
    }

    pub fn set_name(&mut self, id: ObjectId, name: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.object_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_description(&mut self, id: ObjectId, description: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.object_mut(id)?.description = description.into();
        Ok(())
    }

    /// Set or clear an object's explicit location
    pub fn set_location(&mut self, id: ObjectId, location: Option<ZonePoint>) -> Result<()> {
        self.ensure_open()?;
        self.object_mut(id)?.location = location;
        Ok(())
    }

    pub fn set_locked(&mut self, id: ObjectId, locked: bool) -> Result<()> {
        self.ensure_open()?;
        let object = self.object_mut(id)?;
        match &mut object.kind {
            ObjectKind::Item(item) => {
                item.locked = locked;
                Ok(())
            }
            other => Err(Error::WrongKind {
                id,
                expected: "item",
                got: other.tag(),
            }),
        }
    }

    fn expect_task(&self, id: ObjectId) -> Result<&Task> {
        let object = self.object(id)?;
        object.as_task().ok_or(Error::WrongKind {
            id,
            expected: "task",
            got: object.kind.tag(),
        })
    }

    fn task_mut(&mut self, id: ObjectId) -> Result<&mut Task> {
        self.expect_task(id)?;
        match &mut self.object_mut(id)?.kind {
            ObjectKind::Task(task) => Ok(task),
            _ => Err(Error::ObjectNotFound(id)),
        }
    }

    pub fn set_task_state(&mut self, id: ObjectId, state: TaskState) -> Result<()> {
        self.ensure_open()?;
        self.task_mut(id)?.state = state;
        Ok(())
    }

    /// Re-parent a task; the parent links must stay a tree
    pub fn set_task_parent(&mut self, id: ObjectId, parent: Option<ObjectId>) -> Result<()> {
        self.ensure_open()?;
        self.expect_task(id)?;
        if let Some(parent) = parent {
            let mut next = Some(parent);
            while let Some(current) = next {
                if current == id {
                    return Err(Error::TaskCycle { task: id, parent });
                }
                next = self.expect_task(current)?.parent;
            }
        }
        self.task_mut(id)?.parent = parent;
        Ok(())
    }

    fn command_mut(&mut self, id: CommandId) -> Result<&mut Command> {
        self.commands.get_mut(&id).ok_or(Error::CommandNotFound(id))
    }

    pub fn set_command_enabled(&mut self, id: CommandId, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        self.command_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn set_command_visible(&mut self, id: CommandId, visible: bool) -> Result<()> {
        self.ensure_open()?;
        self.command_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.ensure_open()?;
        self.variables.insert(name.into(), value.into());
        Ok(())
    }

    pub fn set_complete(&mut self, complete: bool) -> Result<()> {
        self.ensure_open()?;
        self.complete = complete;
        Ok(())
    }

    /// Set the media objects used as icon and splash screen
    pub fn set_icon(&mut self, media: Option<ObjectId>) -> Result<()> {
        self.ensure_open()?;
        self.icon = media;
        Ok(())
    }

    pub fn set_splash(&mut self, media: Option<ObjectId>) -> Result<()> {
        self.ensure_open()?;
        self.splash = media;
        Ok(())
    }

    /// Apply an arbitrary change to an object
    ///
    /// The closure must not change the object's id or kind.
    pub fn with_object_mut<R>(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&mut ZObject) -> R,
    ) -> Result<R> {
        self.ensure_open()?;
        Ok(f(self.object_mut(id)?))
    }

    // Timers

    /// Start a timer object; returns `false` if it was already running
    pub fn start_timer(&mut self, id: ObjectId, now: DateTime<Utc>) -> Result<bool> {
        self.ensure_open()?;
        let handle = self.timer_handle(id)?;
        self.timers.start(handle, now)
    }

    /// Stop a timer object; returns `false` if it was not running
    pub fn stop_timer(&mut self, id: ObjectId, now: DateTime<Utc>) -> Result<bool> {
        self.ensure_open()?;
        let handle = self.timer_handle(id)?;
        self.timers.stop(handle, now)
    }

    pub fn reset_timer(&mut self, id: ObjectId) -> Result<()> {
        self.ensure_open()?;
        let handle = self.timer_handle(id)?;
        self.timers.reset(handle)
    }

    pub fn set_timer_duration(&mut self, id: ObjectId, duration: TimeDelta) -> Result<()> {
        self.ensure_open()?;
        let handle = self.timer_handle(id)?;
        self.timers.set_duration(handle, duration)
    }

    /// Add and start an anonymous timer
    pub fn add_timer(
        &mut self,
        kind: TimerKind,
        duration: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<TimerHandle> {
        self.ensure_open()?;
        let token = TimerToken::Callback(self.next_callback);
        self.next_callback += 1;
        let handle = self.timers.add_timer(kind, duration, token);
        self.timers.start(handle, now)?;
        Ok(handle)
    }

    /// Remove an anonymous timer without firing it
    pub fn remove_timer(&mut self, handle: TimerHandle) -> Result<()> {
        self.ensure_open()?;
        if let Some(id) = self.timer_object(handle) {
            return Err(Error::WrongKind {
                id,
                expected: "anonymous timer",
                got: "timer",
            });
        }
        self.timers.remove_timer(handle).map(|_| ())
    }

    /// Accrue running time and collect expiries
    pub fn advance_timers(&mut self, now: DateTime<Utc>) -> Result<Vec<TimerExpiry>> {
        self.ensure_open()?;
        Ok(self.timers.advance(now))
    }

    /// Freeze all clocks
    pub fn pause_timers(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.timers.pause(now);
        Ok(())
    }

    /// Unfreeze all clocks
    pub fn resume_timers(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.timers.resume(now);
        Ok(())
    }

    /// Drain pending wake-up changes for the host
    pub fn take_schedule_changes(&mut self) -> Vec<ScheduleChange> {
        self.timers.take_changes()
    }

    // Position

    /// Record a position sample and evaluate every zone
    ///
    /// With a known position the player is moved there and each located
    /// item and character gets its distance and bearing from the player.
    pub fn evaluate_position(&mut self, position: Option<ZonePoint>) -> Result<Vec<ZoneEvent>> {
        self.ensure_open()?;
        let events = evaluate_zones(&mut self.objects, position.as_ref());
        let Some(point) = position else {
            return Ok(events);
        };

        self.object_mut(self.player)?.location = Some(point);
        let vectors: Vec<_> = self
            .objects
            .values()
            .filter(|o| o.active && o.is_placeable() && !o.is_player())
            .filter(|o| o.container != Container::Player)
            .filter_map(|o| self.position_of(o.id).map(|pos| (o.id, vector_to_point(&point, &pos))))
            .collect();
        for (id, (distance, bearing)) in vectors {
            let object = self.object_mut(id)?;
            object.current_distance = Some(distance);
            object.current_bearing = Some(bearing);
        }
        Ok(events)
    }

    // Queries

    /// Position of an object: a zone's own point, or a located object's
    /// explicit location falling back to its container's position
    pub fn position_of(&self, id: ObjectId) -> Option<ZonePoint> {
        let mut current = self.objects.get(&id)?;
        for _ in 0..=self.objects.len() {
            if let Some(zone) = current.as_zone() {
                return Some(zone.original_point);
            }
            if !current.is_placeable() {
                return None;
            }
            if let Some(location) = current.location {
                return Some(location);
            }
            current = match current.container {
                Container::Nowhere => return None,
                Container::Player => self.objects.get(&self.player)?,
                Container::Object(parent) => self.objects.get(&parent)?,
            };
        }
        None
    }

    /// Check whether `object` is inside `container`
    ///
    /// For the player and a zone this is geometric containment of the last
    /// known position; otherwise the container chain is followed.
    pub fn contains(&self, container: ObjectId, object: ObjectId) -> bool {
        if object == self.player {
            if let Some(zone) = self.objects.get(&container).and_then(|o| o.as_zone()) {
                return match self.player_position() {
                    Some(point) => {
                        zone.invalid_geometry.is_none() && zone.boundary.contains(&point)
                    }
                    None => false,
                };
            }
        }

        let mut current = Some(object);
        for _ in 0..=self.objects.len() {
            let Some(id) = current else {
                return false;
            };
            if id == container {
                return true;
            }
            current = self.objects.get(&id).and_then(|o| match o.container {
                Container::Object(parent) => Some(parent),
                Container::Player => Some(self.player),
                Container::Nowhere => None,
            });
        }
        false
    }

    /// Objects whose container is `container`
    pub fn contents(&self, container: Container) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.container == container)
            .map(|o| o.id)
            .collect()
    }

    /// The player's inventory
    pub fn inventory(&self) -> Vec<ObjectId> {
        self.contents(Container::Player)
    }

    /// Active zones containing the object's position
    pub fn inside_of_zones(&self, id: ObjectId) -> Vec<ObjectId> {
        let Some(point) = self.position_of(id) else {
            return Vec::new();
        };
        self.zones()
            .filter(|(o, z)| o.active && z.invalid_geometry.is_none())
            .filter(|(_, z)| z.boundary.contains(&point))
            .map(|(o, _)| o.id)
            .collect()
    }

    /// Check whether the player can see an object
    ///
    /// The object must be active and visible and either carried by the
    /// player or inside an active zone whose `show_objects` rule matches
    /// the zone's state.
    pub fn is_visible(&self, id: ObjectId) -> bool {
        let Some(object) = self.objects.get(&id) else {
            return false;
        };
        if !(object.active && object.visible) {
            return false;
        }
        let container = match object.container {
            Container::Nowhere => return false,
            Container::Player => return true,
            Container::Object(c) => c,
        };
        let Some(holder) = self.objects.get(&container) else {
            return false;
        };
        let Some(zone) = holder.as_zone() else {
            return false;
        };
        if !holder.active {
            return false;
        }
        match zone.show_objects {
            ShowObjects::OnEnter => zone.state == ZoneState::Inside,
            ShowObjects::OnProximity => {
                matches!(zone.state, ZoneState::Inside | ZoneState::Proximity)
            }
            ShowObjects::Always => true,
        }
    }

    /// Items and characters the player can see, excluding the inventory
    pub fn visible_objects(&self) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.is_placeable() && !o.is_player())
            .filter(|o| o.container != Container::Player)
            .filter(|o| self.is_visible(o.id))
            .map(|o| o.id)
            .collect()
    }

    /// Visible, active tasks that are not complete
    pub fn active_tasks(&self) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.active && o.visible)
            .filter(|o| matches!(o.as_task(), Some(t) if t.state != TaskState::Complete))
            .map(|o| o.id)
            .collect()
    }

    /// Objects a command can currently be used with
    ///
    /// Candidates are the visible objects plus the inventory.
    pub fn command_targets(&self, id: CommandId) -> Result<Vec<ObjectId>> {
        let command = self.command(id)?;
        if !command.target.needs_target() {
            return Ok(Vec::new());
        }
        let mut candidates = self.visible_objects();
        candidates.extend(self.inventory().into_iter().filter(|o| self.is_visible(*o)));
        Ok(candidates
            .into_iter()
            .filter(|o| command.owner != Some(*o))
            .filter(|o| command.target.accepts(Some(*o)))
            .collect())
    }
}
