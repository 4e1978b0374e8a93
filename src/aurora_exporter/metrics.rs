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

use crate::model::{parse_float, Horizon, KpMeasurement, ScaleResponse};
use prometheus::core::Desc;
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const STORM_NAME: &str = "aurora_geomagnetic_storm";
const STORM_HELP: &str = "Geomagnetic storm index.";
const KP_NAME: &str = "planetary_k_index";
const KP_HELP: &str = "Planetary K index.";
const LABEL_TIMESCALE: &str = "timescale";

/// Which metrics the exporter produces and how horizons are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Storm gauge labeled by `timescale` plus the planetary K-index.
    Aurora,
    /// Storm gauge labeled by `timescale` only.
    Storm,
    /// One unlabeled storm gauge per horizon.
    Horizons,
}

impl Variant {
    /// True if this variant needs the Kp endpoint.
    pub fn kp_index(self) -> bool {
        matches!(self, Self::Aurora)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aurora => "aurora",
            Self::Storm => "storm",
            Self::Horizons => "horizons",
        })
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aurora" => Ok(Self::Aurora),
            "storm" => Ok(Self::Storm),
            "horizons" => Ok(Self::Horizons),
            _ => Err(format!("unknown variant {}, expected one of aurora, storm, horizons", s)),
        }
    }
}

/// Descriptors for the storm scale, either one labeled family or one family per horizon.
#[derive(Debug)]
pub enum StormDescriptors {
    Labeled(Desc),
    PerHorizon([Desc; 4]),
}

impl StormDescriptors {
    fn for_horizon(&self, horizon: Horizon) -> (&Desc, Option<&'static str>) {
        match self {
            Self::Labeled(desc) => (desc, Some(horizon.label())),
            Self::PerHorizon(descs) => (&descs[horizon.index()], None),
        }
    }
}

/// Static set of metric descriptors for a variant.
///
/// Built once at startup and never modified, so it can be shared between
/// concurrent scrapes without any locking.
#[derive(Debug)]
pub struct Descriptors {
    storm: StormDescriptors,
    kp: Option<Desc>,
}

impl Descriptors {
    pub fn new(variant: Variant) -> prometheus::Result<Self> {
        let storm = match variant {
            Variant::Aurora | Variant::Storm => StormDescriptors::Labeled(Desc::new(
                STORM_NAME.to_owned(),
                STORM_HELP.to_owned(),
                vec![LABEL_TIMESCALE.to_owned()],
                HashMap::new(),
            )?),
            Variant::Horizons => StormDescriptors::PerHorizon([
                horizon_desc(Horizon::Current)?,
                horizon_desc(Horizon::Predicted)?,
                horizon_desc(Horizon::TwoDay)?,
                horizon_desc(Horizon::ThreeDay)?,
            ]),
        };

        let kp = if variant.kp_index() {
            Some(Desc::new(
                KP_NAME.to_owned(),
                KP_HELP.to_owned(),
                Vec::new(),
                HashMap::new(),
            )?)
        } else {
            None
        };

        Ok(Self { storm, kp })
    }

    /// Every descriptor in the order families are exposed.
    pub fn all(&self) -> Vec<&Desc> {
        let mut out = match &self.storm {
            StormDescriptors::Labeled(desc) => vec![desc],
            StormDescriptors::PerHorizon(descs) => descs.iter().collect(),
        };

        out.extend(self.kp.as_ref());
        out
    }

    pub fn storm(&self) -> &StormDescriptors {
        &self.storm
    }

    pub fn kp(&self) -> Option<&Desc> {
        self.kp.as_ref()
    }
}

fn horizon_desc(horizon: Horizon) -> prometheus::Result<Desc> {
    Desc::new(
        format!("{}_{}", STORM_NAME, horizon.label()),
        format!("Geomagnetic storm index, {} horizon.", horizon.label().replace('_', " ")),
        Vec::new(),
        HashMap::new(),
    )
}

/// A single gauge value produced by a scrape.
#[derive(Debug, Clone)]
pub struct MetricSample<'a> {
    pub desc: &'a Desc,
    pub value: f64,
    pub label: Option<&'static str>,
    pub timestamp_ms: Option<i64>,
}

impl<'a> MetricSample<'a> {
    fn to_metric(&self) -> Metric {
        let mut gauge = Gauge::default();
        gauge.set_value(self.value);

        let mut metric = Metric::default();
        metric.set_gauge(gauge);

        if let (Some(name), Some(value)) = (self.desc.variable_labels.first(), self.label) {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.to_owned());
            metric.mut_label().push(pair);
        }

        if let Some(ts) = self.timestamp_ms {
            metric.set_timestamp_ms(ts);
        }

        metric
    }
}

/// Convert the geomagnetic scale of each horizon into a sample.
///
/// Horizons are handled independently: an absent record or field is skipped
/// quietly and an unparseable one is logged and skipped, neither prevents
/// samples for the remaining horizons.
pub fn storm_samples<'a>(descs: &'a StormDescriptors, scales: &ScaleResponse) -> Vec<MetricSample<'a>> {
    let mut out = Vec::with_capacity(Horizon::ALL.len());

    for horizon in Horizon::ALL {
        let raw = match scales.geomagnetic_scale(horizon) {
            Some(v) => v,
            None => {
                tracing::debug!(message = "no geomagnetic scale for horizon", horizon = %horizon);
                continue;
            }
        };

        match parse_float("geomagnetic_scale", raw) {
            Ok(value) => {
                let (desc, label) = descs.for_horizon(horizon);
                out.push(MetricSample {
                    desc,
                    value,
                    label,
                    timestamp_ms: None,
                });
            }
            Err(e) => {
                tracing::warn!(message = "failed to convert geomagnetic scale", horizon = %horizon, error = %e);
            }
        }
    }

    out
}

/// Sample for the planetary K-index, timestamped with the measurement time
/// rather than the scrape time.
pub fn kp_sample<'a>(desc: &'a Desc, kp: &KpMeasurement) -> MetricSample<'a> {
    MetricSample {
        desc,
        value: kp.kp_fraction,
        label: None,
        timestamp_ms: Some(kp.timestamp.timestamp_millis()),
    }
}

/// Group samples into gauge families, one per descriptor in `descs` order.
///
/// Descriptors without any samples are left out entirely since the text
/// format has no way to express an empty family.
pub fn families(descs: &[&Desc], samples: &[MetricSample<'_>]) -> Vec<MetricFamily> {
    let mut out = Vec::with_capacity(descs.len());

    for desc in descs {
        let metrics: Vec<Metric> = samples
            .iter()
            .filter(|s| s.desc.fq_name == desc.fq_name)
            .map(MetricSample::to_metric)
            .collect();

        if metrics.is_empty() {
            continue;
        }

        let mut family = MetricFamily::default();
        family.set_name(desc.fq_name.clone());
        family.set_help(desc.help.clone());
        family.set_field_type(MetricType::GAUGE);
        for m in metrics {
            family.mut_metric().push(m);
        }

        out.push(family);
    }

    out
}
