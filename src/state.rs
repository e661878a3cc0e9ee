use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::geo::Position;

/// Last observations for one airframe.
///
/// A fresh entry starts with nothing known. Position rows set `position`
/// and `position_time` together; velocity rows set `ground_speed` and
/// leave the fix untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftState {
    /// Last complete fix
    pub position: Option<Position>,
    /// Generation time of that fix
    pub position_time: Option<DateTime<Utc>>,
    /// Last reported ground speed in knots
    pub ground_speed: Option<u32>,
}

/// Per-aircraft state, keyed by the transponder hex identifier.
///
/// Owned by the aggregation task alone, so no locking. Entries are never
/// evicted; an aircraft that parked a week ago simply stops producing
/// samples through the staleness rule.
#[derive(Debug, Default)]
pub struct StateTracker {
    aircraft: HashMap<String, AircraftState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state for `icao`, creating an empty entry on first sight.
    pub fn get_or_create(&mut self, icao: &str) -> &mut AircraftState {
        self.aircraft.entry(icao.to_string()).or_default()
    }

    pub fn get(&self, icao: &str) -> Option<&AircraftState> {
        self.aircraft.get(icao)
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }
}
