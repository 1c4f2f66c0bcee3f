//! Zone proximity evaluation
//!
//! Each position sample classifies every active zone by the distance from
//! the player to its boundary. Only a changed classification produces an
//! event, so repeating a sample is silent.
//!
//! - `ZoneState` - Proximity class of the player relative to a zone
//! - `classify` - Distance to class, using the zone's own thresholds
//! - `evaluate_zones` - One pass over all zones of a cartridge

use crate::geo::{Bearing, Distance, ZonePoint};
use crate::object::{ObjectKind, ZObject};
use crate::ObjectId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the player is relative to a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ZoneState {
    /// Beyond the distance range, or position unusable
    #[default]
    NotInRange,
    /// Beyond the proximity range but within the distance range
    Distant,
    /// Outside the boundary but within the proximity range
    Proximity,
    /// On or inside the boundary
    Inside,
}

impl ZoneState {
    pub fn name(&self) -> &'static str {
        match self {
            ZoneState::NotInRange => "NotInRange",
            ZoneState::Distant => "Distant",
            ZoneState::Proximity => "Proximity",
            ZoneState::Inside => "Inside",
        }
    }
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a distance to a zone boundary
///
/// Both ranges are inclusive upper bounds. A missing `distance_range` makes
/// every finite distance at least `Distant`.
pub fn classify(
    distance: Distance,
    proximity_range: Distance,
    distance_range: Option<Distance>,
) -> ZoneState {
    let d = distance.as_meters();
    if !d.is_finite() || d < 0.0 {
        return ZoneState::NotInRange;
    }
    if d == 0.0 {
        return ZoneState::Inside;
    }
    if d <= proximity_range.as_meters() {
        return ZoneState::Proximity;
    }
    match distance_range {
        Some(range) if d > range.as_meters() => ZoneState::NotInRange,
        _ => ZoneState::Distant,
    }
}

/// Coarse name of a state change, as seen by handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    Enter,
    Exit,
    Proximity,
    Distant,
    NotInRange,
}

/// A change of classification for one zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneTransition {
    pub zone: ObjectId,
    pub from: ZoneState,
    pub to: ZoneState,
}

impl ZoneTransition {
    /// Entering wins over leaving; leaving the inside wins over the new band
    pub fn kind(&self) -> TransitionKind {
        match (self.from, self.to) {
            (_, ZoneState::Inside) => TransitionKind::Enter,
            (ZoneState::Inside, _) => TransitionKind::Exit,
            (_, ZoneState::Proximity) => TransitionKind::Proximity,
            (_, ZoneState::Distant) => TransitionKind::Distant,
            (_, ZoneState::NotInRange) => TransitionKind::NotInRange,
        }
    }
}

/// Something the evaluator noticed about a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneEvent {
    Transition(ZoneTransition),
    /// The zone was activated or deactivated since the last pass
    ActiveChanged { zone: ObjectId, active: bool },
}

impl ZoneEvent {
    /// The zone the event is about
    pub fn zone(&self) -> ObjectId {
        match self {
            ZoneEvent::Transition(t) => t.zone,
            ZoneEvent::ActiveChanged { zone, .. } => *zone,
        }
    }
}

/// Evaluate every zone in registration order
///
/// Activation changes are reported whether or not the position is known.
/// Inactive zones and zones with invalid geometry keep their state.
pub fn evaluate_zones(
    objects: &mut IndexMap<ObjectId, ZObject>,
    position: Option<&ZonePoint>,
) -> Vec<ZoneEvent> {
    let mut events = Vec::new();

    for (&id, object) in objects.iter_mut() {
        let active = object.active;
        let ObjectKind::Zone(zone) = &mut object.kind else {
            continue;
        };
        if zone.invalid_geometry.is_some() {
            continue;
        }

        if zone.observed_active != active {
            zone.observed_active = active;
            events.push(ZoneEvent::ActiveChanged { zone: id, active });
        }
        if !active {
            continue;
        }
        let Some(point) = position else {
            continue;
        };

        let (distance, bearing) = if point.is_finite() {
            zone.boundary.vector_from(point)
        } else {
            (Distance::meters(f64::NAN), Bearing::default())
        };
        object.current_distance = Some(distance);
        object.current_bearing = Some(bearing);

        let state = classify(distance, zone.proximity_range, zone.distance_range);
        if state != zone.state {
            tracing::debug!(zone = %id, from = %zone.state, to = %state, "zone state changed");
            events.push(ZoneEvent::Transition(ZoneTransition {
                zone: id,
                from: zone.state,
                to: state,
            }));
            zone.state = state;
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{translate_point, Boundary};
    use crate::object::{Container, ShowObjects, Zone};

    fn circle_zone(id: u32, radius: f64) -> ZObject {
        ZObject {
            id: ObjectId::new(id),
            name: format!("zone {}", id),
            description: String::new(),
            visible: true,
            active: true,
            media: None,
            icon: None,
            container: Container::Nowhere,
            location: None,
            current_distance: None,
            current_bearing: None,
            commands: Vec::new(),
            kind: ObjectKind::Zone(Zone {
                boundary: Boundary::Circle {
                    center: ZonePoint::flat(0.0, 0.0),
                    radius: Distance::meters(radius),
                },
                original_point: ZonePoint::flat(0.0, 0.0),
                show_objects: ShowObjects::OnEnter,
                proximity_range: Distance::meters(40.0),
                distance_range: Some(Distance::meters(500.0)),
                state: ZoneState::NotInRange,
                invalid_geometry: None,
                observed_active: true,
            }),
        }
    }

    fn arena(zones: Vec<ZObject>) -> IndexMap<ObjectId, ZObject> {
        zones.into_iter().map(|z| (z.id, z)).collect()
    }

    fn state_of(objects: &IndexMap<ObjectId, ZObject>, id: u32) -> ZoneState {
        objects[&ObjectId::new(id)].as_zone().unwrap().state
    }

    /// A point `meters` east of the circle's center
    fn east(meters: f64) -> ZonePoint {
        translate_point(&ZonePoint::flat(0.0, 0.0), Distance::meters(meters), Bearing::new(90.0))
    }

    #[test]
    fn test_classify_threshold_fixtures() {
        let prox = Distance::meters(40.0);
        let range = Some(Distance::meters(500.0));
        assert_eq!(classify(Distance::meters(0.0), prox, range), ZoneState::Inside);
        assert_eq!(classify(Distance::meters(40.0), prox, range), ZoneState::Proximity);
        assert_eq!(classify(Distance::meters(50.0), prox, range), ZoneState::Distant);
        assert_eq!(classify(Distance::meters(1000.0), prox, range), ZoneState::NotInRange);
    }

    #[test]
    fn test_classify_unbounded_and_non_finite() {
        let prox = Distance::meters(40.0);
        assert_eq!(classify(Distance::meters(1.0e7), prox, None), ZoneState::Distant);
        assert_eq!(classify(Distance::meters(f64::NAN), prox, None), ZoneState::NotInRange);
        assert_eq!(
            classify(Distance::meters(f64::INFINITY), prox, None),
            ZoneState::NotInRange
        );
    }

    #[test]
    fn test_circle_positions() {
        let mut objects = arena(vec![circle_zone(1, 50.0)]);

        evaluate_zones(&mut objects, Some(&east(0.0)));
        assert_eq!(state_of(&objects, 1), ZoneState::Inside);

        // On the edge
        evaluate_zones(&mut objects, Some(&east(50.0)));
        assert_eq!(state_of(&objects, 1), ZoneState::Inside);

        evaluate_zones(&mut objects, Some(&east(80.0)));
        assert_eq!(state_of(&objects, 1), ZoneState::Proximity);

        evaluate_zones(&mut objects, Some(&east(200.0)));
        assert_eq!(state_of(&objects, 1), ZoneState::Distant);

        evaluate_zones(&mut objects, Some(&east(1050.0)));
        assert_eq!(state_of(&objects, 1), ZoneState::NotInRange);
    }

    #[test]
    fn test_repeated_sample_is_silent() {
        let mut objects = arena(vec![circle_zone(1, 50.0)]);
        let p = east(70.0);

        let first = evaluate_zones(&mut objects, Some(&p));
        assert_eq!(first.len(), 1);
        for _ in 0..5 {
            assert!(evaluate_zones(&mut objects, Some(&p)).is_empty());
        }
    }

    #[test]
    fn test_one_event_per_change() {
        let mut objects = arena(vec![circle_zone(1, 50.0)]);
        let events = evaluate_zones(&mut objects, Some(&east(10.0)));
        assert_eq!(
            events,
            vec![ZoneEvent::Transition(ZoneTransition {
                zone: ObjectId::new(1),
                from: ZoneState::NotInRange,
                to: ZoneState::Inside,
            })]
        );

        let events = evaluate_zones(&mut objects, Some(&east(2000.0)));
        assert_eq!(events.len(), 1);
        match events[0] {
            ZoneEvent::Transition(t) => assert_eq!(t.kind(), TransitionKind::Exit),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unknown_position_skips_zones() {
        let mut objects = arena(vec![circle_zone(1, 50.0)]);
        assert!(evaluate_zones(&mut objects, None).is_empty());
        assert_eq!(state_of(&objects, 1), ZoneState::NotInRange);
    }

    #[test]
    fn test_inactive_zone_keeps_state() {
        let mut objects = arena(vec![circle_zone(1, 50.0), circle_zone(2, 50.0)]);
        evaluate_zones(&mut objects, Some(&east(0.0)));

        objects.get_mut(&ObjectId::new(1)).unwrap().active = false;
        let events = evaluate_zones(&mut objects, Some(&east(5000.0)));
        assert_eq!(
            events[0],
            ZoneEvent::ActiveChanged {
                zone: ObjectId::new(1),
                active: false,
            }
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].zone(), ObjectId::new(2));
        assert_eq!(state_of(&objects, 1), ZoneState::Inside);
        assert_eq!(state_of(&objects, 2), ZoneState::NotInRange);
    }

    #[test]
    fn test_invalid_geometry_excluded() {
        let mut zone = circle_zone(1, 50.0);
        if let ObjectKind::Zone(z) = &mut zone.kind {
            z.invalid_geometry = Some("radius must be positive".to_string());
        }
        let mut objects = arena(vec![zone]);
        assert!(evaluate_zones(&mut objects, Some(&east(0.0))).is_empty());
    }

    #[test]
    fn test_distance_and_bearing_recorded() {
        let mut objects = arena(vec![circle_zone(1, 50.0)]);
        evaluate_zones(&mut objects, Some(&east(150.0)));
        let zone = &objects[&ObjectId::new(1)];
        let d = zone.current_distance.unwrap().as_meters();
        assert!((d - 100.0).abs() < 0.01);
        let b = zone.current_bearing.unwrap().degrees();
        assert!((b - 270.0).abs() < 0.01);
    }
}
