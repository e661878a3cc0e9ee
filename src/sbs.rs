use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::geo::Position;

/// Fields in a BaseStation row: record type, transmission type, session,
/// hex ident, flight, two date/time pairs, callsign, altitude, ground
/// speed, track, latitude, longitude, vertical rate, squawk and the four
/// status flags.
const FIELD_COUNT: usize = 21;

const FEET_TO_METRES: f64 = 0.3048;

#[derive(Debug, Error, PartialEq)]
pub enum SbsError {
    #[error("not a transmission record")]
    NotTransmission,
    #[error("transmission type not tracked")]
    UntrackedType,
    #[error("expected {FIELD_COUNT} fields, found {found}")]
    FieldCount { found: usize },
    #[error("bad timestamp {0:?}")]
    Timestamp(String),
}

/// One decoded feed record. Position rows carry latitude, longitude and
/// altitude; velocity rows carry the ground speed. Every other field of
/// the feed row is dropped at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct SbsMessage {
    /// Generation time of the record, to the millisecond
    pub timestamp: DateTime<Utc>,
    /// Transponder hex identifier, treated as an opaque key
    pub icao: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Barometric altitude in metres, converted from the feed's feet
    pub altitude: Option<f64>,
    /// Ground speed in knots
    pub ground_speed: Option<u32>,
}

impl SbsMessage {
    /// The fix carried by this record, only when all three components are
    /// present.
    pub fn position(&self) -> Option<Position> {
        match (self.latitude, self.longitude, self.altitude) {
            (Some(latitude), Some(longitude), Some(altitude)) => Some(Position {
                latitude,
                longitude,
                altitude,
            }),
            _ => None,
        }
    }
}

/// Decodes one feed line, `None` for anything the monitor does not track.
///
/// Rows of a retained type that still fail to decode are logged at debug
/// level so a misbehaving feed can be diagnosed without flooding the log.
pub fn parse_line(line: &str) -> Option<SbsMessage> {
    match parse(line) {
        Ok(msg) => Some(msg),
        Err(SbsError::NotTransmission | SbsError::UntrackedType) => None,
        Err(err) => {
            debug!("rejected feed line ({}): {:?}", err, line);
            None
        }
    }
}

/// Decodes one feed line with the rejection reason.
///
/// Retained rows are `MSG` records of transmission type 2 or 3, which
/// carry positions, and type 4, which carries the ground speed. A row
/// without a readable generation timestamp is rejected outright since
/// every downstream computation needs it. Numeric payload fields decode
/// to `None` when empty or unreadable.
pub fn parse(line: &str) -> Result<SbsMessage, SbsError> {
    let fields: Vec<&str> = line.trim_end().split(',').collect();
    if fields.len() < FIELD_COUNT {
        return Err(SbsError::FieldCount {
            found: fields.len(),
        });
    }
    if fields[0] != "MSG" {
        return Err(SbsError::NotTransmission);
    }
    match fields[1] {
        "2" | "3" | "4" => {}
        _ => return Err(SbsError::UntrackedType),
    }

    let date = NaiveDate::parse_from_str(fields[5], "%Y/%m/%d")
        .map_err(|_| SbsError::Timestamp(format!("{} {}", fields[5], fields[6])))?;
    let time = NaiveTime::parse_from_str(fields[6], "%H:%M:%S%.f")
        .map_err(|_| SbsError::Timestamp(format!("{} {}", fields[5], fields[6])))?;

    Ok(SbsMessage {
        timestamp: date.and_time(time).and_utc(),
        icao: fields[3].to_string(),
        latitude: numeric_field(fields[13], "latitude"),
        longitude: numeric_field(fields[14], "longitude"),
        altitude: numeric_field::<f64>(fields[10], "altitude").map(|feet| feet * FEET_TO_METRES),
        ground_speed: numeric_field(fields[11], "ground_speed"),
    })
}

fn numeric_field<T: FromStr>(raw: &str, name: &str) -> Option<T> {
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!("dropping unreadable {} field {:?}", name, raw);
            None
        }
    }
}
