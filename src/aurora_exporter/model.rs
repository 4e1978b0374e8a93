// aurora_exporter - Prometheus metrics exporter for NOAA space weather
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::num::{ParseFloatError, ParseIntError};

const KP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Forecast window of a severity-scale record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizon {
    Current,
    Predicted,
    TwoDay,
    ThreeDay,
}

impl Horizon {
    /// All horizons in the order samples are emitted.
    pub const ALL: [Horizon; 4] = [Self::Current, Self::Predicted, Self::TwoDay, Self::ThreeDay];

    /// Key used for this horizon by the scales endpoint.
    pub fn key(self) -> &'static str {
        match self {
            Self::Current => "0",
            Self::Predicted => "1",
            Self::TwoDay => "2",
            Self::ThreeDay => "3",
        }
    }

    /// Label value (or metric name suffix) used for this horizon.
    pub fn label(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Predicted => "predicted",
            Self::TwoDay => "two_day",
            Self::ThreeDay => "three_day",
        }
    }

    /// Slot of this horizon in per-horizon arrays, matching the order of `ALL`.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RadioBlackout {
    #[serde(alias = "Scale", default)]
    pub scale: Option<String>,
    #[serde(alias = "Text", default)]
    pub text: Option<String>,
    #[serde(alias = "MinorProb", default)]
    pub minor_prob: Option<String>,
    #[serde(alias = "MajorProb", default)]
    pub major_prob: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SolarRadiation {
    #[serde(alias = "Scale", default)]
    pub scale: Option<String>,
    #[serde(alias = "Text", default)]
    pub text: Option<String>,
    #[serde(alias = "Prob", default)]
    pub prob: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Geomagnetic {
    #[serde(alias = "Scale", default)]
    pub scale: Option<String>,
    #[serde(alias = "Text", default)]
    pub text: Option<String>,
}

/// One severity-scale record from the scales endpoint.
///
/// Every field is optional since upstream omits or nulls them freely.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScaleEntry {
    #[serde(alias = "DateStamp", default)]
    pub date_stamp: Option<String>,
    #[serde(alias = "TimeStamp", default)]
    pub time_stamp: Option<String>,
    #[serde(alias = "R", default)]
    pub radio_blackout: Option<RadioBlackout>,
    #[serde(alias = "S", default)]
    pub solar_radiation: Option<SolarRadiation>,
    #[serde(alias = "G", default)]
    pub geomagnetic: Option<Geomagnetic>,
}

/// Decoded scales endpoint response with one optional slot per horizon.
///
/// Upstream keys the records by the strings `"0"` to `"3"`. Unknown keys are
/// dropped and missing keys leave their slot empty.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(from = "HashMap<String, ScaleEntry>")]
pub struct ScaleResponse {
    entries: [Option<ScaleEntry>; 4],
}

impl ScaleResponse {
    pub fn get(&self, horizon: Horizon) -> Option<&ScaleEntry> {
        self.entries[horizon.index()].as_ref()
    }

    /// Raw geomagnetic scale for a horizon, `None` if the record or the field is absent.
    pub fn geomagnetic_scale(&self, horizon: Horizon) -> Option<&str> {
        self.get(horizon)
            .and_then(|e| e.geomagnetic.as_ref())
            .and_then(|g| g.scale.as_deref())
    }
}

impl From<HashMap<String, ScaleEntry>> for ScaleResponse {
    fn from(mut raw: HashMap<String, ScaleEntry>) -> Self {
        let mut entries: [Option<ScaleEntry>; 4] = Default::default();
        for horizon in Horizon::ALL {
            entries[horizon.index()] = raw.remove(horizon.key());
        }

        Self { entries }
    }
}

/// One raw row of the Kp endpoint: timestamp, Kp, Kp fraction, running A, station count.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct KpRow(pub Vec<String>);

/// Chronological rows of the Kp endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct KpSeries(pub Vec<KpRow>);

impl KpSeries {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the series returning only the most recent row.
    pub fn into_latest(self) -> Option<KpRow> {
        self.0.into_iter().last()
    }
}

#[derive(Debug)]
pub enum FieldError {
    Missing(&'static str),
    Integer {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },
    Float {
        field: &'static str,
        value: String,
        source: ParseFloatError,
    },
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "missing field {}", field),
            Self::Integer { field, value, source } => write!(f, "invalid integer {:?} for {}: {}", value, field, source),
            Self::Float { field, value, source } => write!(f, "invalid float {:?} for {}: {}", value, field, source),
            Self::Timestamp { value, source } => write!(f, "invalid timestamp {:?}: {}", value, source),
        }
    }
}

impl error::Error for FieldError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Missing(_) => None,
            Self::Integer { source, .. } => Some(source),
            Self::Float { source, .. } => Some(source),
            Self::Timestamp { source, .. } => Some(source),
        }
    }
}

/// Parse a string encoded float the way the severity scales are encoded.
pub fn parse_float(field: &'static str, value: &str) -> Result<f64, FieldError> {
    value.parse::<f64>().map_err(|e| FieldError::Float {
        field,
        value: value.to_owned(),
        source: e,
    })
}

fn parse_int(field: &'static str, value: &str) -> Result<i32, FieldError> {
    value.parse::<i32>().map_err(|e| FieldError::Integer {
        field,
        value: value.to_owned(),
        source: e,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, FieldError> {
    NaiveDateTime::parse_from_str(value, KP_TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| FieldError::Timestamp {
            value: value.to_owned(),
            source: e,
        })
}

/// Parsed form of a single `KpRow`.
#[derive(Debug, Clone, PartialEq)]
pub struct KpMeasurement {
    pub timestamp: DateTime<Utc>,
    pub kp: i32,
    pub kp_fraction: f64,
    pub a_running: i32,
    pub station_count: i32,
}

impl KpMeasurement {
    /// Parse every column of the row, failing on the first one that doesn't convert.
    pub fn parse(row: &KpRow) -> Result<Self, FieldError> {
        let column = move |idx: usize, field: &'static str| row.0.get(idx).map(String::as_str).ok_or(FieldError::Missing(field));

        Ok(Self {
            timestamp: parse_timestamp(column(0, "time_tag")?)?,
            kp: parse_int("kp", column(1, "kp")?)?,
            kp_fraction: parse_float("kp_fraction", column(2, "kp_fraction")?)?,
            a_running: parse_int("a_running", column(3, "a_running")?)?,
            station_count: parse_int("station_count", column(4, "station_count")?)?,
        })
    }
}
