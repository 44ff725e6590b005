// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Weather descriptors used as outfit conditions
//!
//! Hourly forecast numbers are mapped onto descriptors such as
//! `Cold | Humid | Rain | Breezy | Overcast` (temperature, humidity,
//! precipitation, wind, sky). A day is summarised by its most frequent
//! hourly descriptor.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

use crate::store::{read_json, write_json};
use crate::Result;

/// Separator between descriptor fields
pub const SEPARATOR: &str = " | ";

/// Numeric categories with inclusive `(name, min, max)` bands; first match wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Temperature,
    Humidity,
    Wind,
    Sky,
}

const TEMPERATURE: &[(&str, f64, f64)] = &[
    ("Freezing", -50.0, 0.0),
    ("Cold", 0.0, 10.0),
    ("Cool", 10.0, 15.0),
    ("Mild", 15.0, 20.0),
    ("Warm", 20.0, 25.0),
    ("Hot", 25.0, 30.0),
    ("Very Hot", 30.0, 50.0),
];

const HUMIDITY: &[(&str, f64, f64)] = &[
    ("Dry", 0.0, 40.0),
    ("Moderate Humidity", 40.0, 60.0),
    ("Humid", 60.0, 75.0),
    ("Muggy", 75.0, 100.0),
];

const WIND: &[(&str, f64, f64)] = &[
    ("No Wind", 0.0, 0.0),
    ("Calm", 0.1, 10.0),
    ("Breezy", 10.0, 20.0),
    ("Windy", 20.0, 30.0),
    ("Gale", 30.0, 100.0),
];

// "Indoor" is a sky descriptor with no numeric band
const SKY: &[(&str, f64, f64)] = &[
    ("Clear", 0.0, 10.0),
    ("Partly Cloudy", 10.0, 30.0),
    ("Mostly Cloudy", 30.0, 70.0),
    ("Overcast", 70.0, 100.0),
];

impl Category {
    fn bands(self) -> &'static [(&'static str, f64, f64)] {
        match self {
            Category::Temperature => TEMPERATURE,
            Category::Humidity => HUMIDITY,
            Category::Wind => WIND,
            Category::Sky => SKY,
        }
    }
}

/// Descriptor whose band contains `value`
pub fn descriptor_for(value: f64, category: Category) -> Option<&'static str> {
    category
        .bands()
        .iter()
        .find(|(_, min, max)| value >= *min && value <= *max)
        .map(|(name, _, _)| *name)
}

/// Precipitation descriptor; any snow takes precedence over rain
pub fn precipitation_for(precip_mm: f64, snow_cm: f64) -> &'static str {
    if snow_cm > 0.0 {
        if snow_cm < 5.0 { "Snow" } else { "Heavy Snow" }
    } else if precip_mm == 0.0 {
        "No Precipitation"
    } else if precip_mm <= 2.0 {
        "Drizzle"
    } else if precip_mm <= 10.0 {
        "Rain"
    } else if precip_mm < 50.0 {
        "Heavy Rain"
    } else {
        "Thunderstorm"
    }
}

/// One forecast day, each field holding hourly values
///
/// Other forecast fields are ignored; a missing series counts as no hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyWeather {
    pub temp_c: Vec<f64>,
    pub humidity: Vec<f64>,
    pub precip_mm: Vec<f64>,
    pub snow_cm: Vec<f64>,
    pub wind_kph: Vec<f64>,
    pub cloud: Vec<f64>,
}

impl DailyWeather {
    fn hours(&self) -> usize {
        [
            self.temp_c.len(),
            self.humidity.len(),
            self.precip_mm.len(),
            self.snow_cm.len(),
            self.wind_kph.len(),
            self.cloud.len(),
        ]
        .into_iter()
        .min()
        .unwrap_or(0)
    }

    /// Descriptor for one hour, `None` when a value falls outside every band
    pub fn hour_descriptor(&self, hour: usize) -> Option<String> {
        let fields = [
            descriptor_for(*self.temp_c.get(hour)?, Category::Temperature)?,
            descriptor_for(*self.humidity.get(hour)?, Category::Humidity)?,
            precipitation_for(*self.precip_mm.get(hour)?, *self.snow_cm.get(hour)?),
            descriptor_for(*self.wind_kph.get(hour)?, Category::Wind)?,
            descriptor_for(*self.cloud.get(hour)?, Category::Sky)?,
        ];
        Some(fields.join(SEPARATOR))
    }

    /// Most frequent hourly descriptor
    ///
    /// A descriptor must occur at least twice; on a tie the one that reached
    /// the count first wins.
    pub fn dominant_descriptor(&self) -> Option<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut best: Option<(String, usize)> = None;

        for descriptor in (0..self.hours()).filter_map(|hour| self.hour_descriptor(hour)) {
            let count = counts.entry(descriptor.clone()).or_insert(0);
            *count += 1;

            let beats_best = match &best {
                Some((_, best_count)) => *count > *best_count,
                None => *count > 1,
            };
            if beats_best {
                best = Some((descriptor, *count));
            }
        }

        best.map(|(descriptor, _)| descriptor)
    }
}

/// Forecast cache: city -> days, `null` for cities the provider rejected
pub type WeatherCache = BTreeMap<String, Option<Vec<DailyWeather>>>;

/// Tally of observed day descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionTypes {
    pub counts: BTreeMap<String, usize>,
    pub days: usize,
    pub dropped_cities: usize,
}

/// Count the dominant descriptor of every cached day
pub fn condition_types(cache: &WeatherCache) -> ConditionTypes {
    let mut result = ConditionTypes::default();

    for days in cache.values() {
        let Some(days) = days else {
            result.dropped_cities += 1;
            continue;
        };
        for day in days {
            result.days += 1;
            if let Some(descriptor) = day.dominant_descriptor() {
                *result.counts.entry(descriptor).or_insert(0) += 1;
            }
        }
    }

    result
}

/// A preset condition offered to the classifier UI (`possible_conditions.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub temperature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    pub humidity: String,
    pub precipitation: String,
    pub wind: String,
    pub sky: String,
}

impl Condition {
    /// Descriptor fields, season excluded
    pub fn fields(&self) -> [&str; 5] {
        [
            self.temperature.as_str(),
            self.humidity.as_str(),
            self.precipitation.as_str(),
            self.wind.as_str(),
            self.sky.as_str(),
        ]
    }

    pub fn descriptor(&self) -> String {
        self.fields().join(SEPARATOR)
    }
}

/// For each preset, the observed descriptors differing in at most one field
pub fn close_matches<'a>(
    presets: &[Condition],
    observed: impl IntoIterator<Item = &'a str> + Clone,
) -> BTreeMap<String, Vec<String>> {
    presets
        .iter()
        .map(|preset| {
            let wanted = preset.fields();
            let matches = observed
                .clone()
                .into_iter()
                .filter(|candidate| {
                    let parts: Vec<&str> = candidate.split(SEPARATOR).collect();
                    let same = wanted
                        .iter()
                        .zip(parts.iter())
                        .filter(|(a, b)| a == b)
                        .count();
                    same + 1 >= wanted.len()
                })
                .map(String::from)
                .collect();
            (preset.descriptor(), matches)
        })
        .collect()
}

/// Observed descriptor counts, as stored in `condition_types.json`
pub const CONDITION_TYPES_FILE: &str = "condition_types.json";

/// Preset conditions read by the UI
pub const POSSIBLE_CONDITIONS_FILE: &str = "possible_conditions.json";

pub fn load_cache(path: &Path) -> Result<WeatherCache> {
    read_json(path)
}

pub fn load_condition_types(path: &Path) -> Result<BTreeMap<String, usize>> {
    read_json(path)
}

pub fn load_conditions(path: &Path) -> Result<Vec<Condition>> {
    read_json(path)
}

/// Summarise a forecast cache and write the counts to `output`
pub fn describe_cache(input: &Path, output: &Path) -> Result<ConditionTypes> {
    let cache = load_cache(input)?;
    let types = condition_types(&cache);
    write_json(output, &types.counts)?;

    info!(
        "Described {} days into {} condition types ({} cities without data)",
        types.days,
        types.counts.len(),
        types.dropped_cities
    );
    Ok(types)
}
