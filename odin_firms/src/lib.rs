/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */
#![allow(unused)]

/// ingestion and classification of near-real-time VIIRS fire detections retrieved from the
/// NASA Fire Information for Resource Management System (FIRMS) WFS service.
/// Detections flow through a strictly sequential pipeline
///   fetch -> normalize -> deduplicate -> area filter -> classify -> dataset
/// and the resulting (immutable) Dataset is served by a date-window query interface.

use std::{fmt, path::{Path,PathBuf}, str::FromStr};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Serialize,Deserialize,Serializer,Deserializer};
use odin_common::datetime::ser_short_rfc3339;

pub mod errors;
pub mod config;
pub mod fields;
pub mod fetch;
pub mod normalize;
pub mod dedup;
pub mod area;
pub mod classify;
pub mod dataset;
pub mod pipeline;
pub mod export;

use errors::{OdinFirmsError, Result, op_failed};

pub use config::*;
pub use dataset::{Dataset, DatasetStore, DateRange, DatasetSummary};
pub use pipeline::{Pipeline, PipelineState, RunReport, RunFailure, Fallback};

/* #region config loading ***************************************************************************************/

/// env var that can be used to override the directory in which we look up bare config file names
pub const CONFIG_DIR_ENV: &str = "ODIN_FIRMS_CONFIGS";

/// load a RON config. If `path` does not exist as given and is a bare file name we look it up in
/// $ODIN_FIRMS_CONFIGS and then in the `configs/` dir of this crate
pub fn load_config<C,P> (path: P) -> Result<C> where C: for <'a> Deserialize<'a>, P: AsRef<Path> {
    let path = resolve_config_path( path.as_ref())?;
    let data = std::fs::read(&path)?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}

/// load a [`FirmsPipelineConfig`], resolving relative file paths in it against the directory of the config file
pub fn load_pipeline_config<P> (path: P) -> Result<FirmsPipelineConfig> where P: AsRef<Path> {
    let path = resolve_config_path( path.as_ref())?;
    let mut config: FirmsPipelineConfig = load_config( &path)?;

    if let Some(dir) = path.parent() {
        config.resolve_paths( dir);
    }
    Ok(config)
}

fn resolve_config_path (path: &Path) -> Result<PathBuf> {
    if path.is_file() { return Ok(path.to_path_buf()) }

    if path.components().count() == 1 {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            candidates.push( Path::new(&dir).join(path))
        }
        candidates.push( Path::new(env!("CARGO_MANIFEST_DIR")).join("configs").join(path));

        if let Some(p) = candidates.into_iter().find(|p| p.is_file()) {
            return Ok(p)
        }
    }

    Err( op_failed!("config file not found: {:?}", path))
}

/* #endregion config loading */

/* #region Confidence *******************************************************************************************/

/// the canonical confidence vocabulary. Raw upstream codes never get past the normalizer
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum Confidence {
    Low,
    Nominal,
    High
}

impl Confidence {
    /// map upstream codes ("l","n","h", case insensitive) and canonical names to Confidence values
    pub fn from_code (s: &str) -> Option<Confidence> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("l") || s.eq_ignore_ascii_case("low") {
            Some(Confidence::Low)
        } else if s.eq_ignore_ascii_case("n") || s.eq_ignore_ascii_case("nominal") {
            Some(Confidence::Nominal)
        } else if s.eq_ignore_ascii_case("h") || s.eq_ignore_ascii_case("high") {
            Some(Confidence::High)
        } else {
            None
        }
    }

    pub fn as_str (&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Nominal => "nominal",
            Confidence::High => "high"
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/* #endregion Confidence */

/// the discrete severity bucket derived from brightness
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Serialize,Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:?}", self) }
}

/* #region AcqTime **********************************************************************************************/

/// acquisition time of day (UTC) with minute resolution. Serialized as zero-padded 24h "HHMM"
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct AcqTime {
    hour: u32,
    minute: u32
}

impl AcqTime {
    pub fn new (hour: u32, minute: u32) -> Option<AcqTime> {
        if hour < 24 && minute < 60 { Some( AcqTime{hour,minute} ) } else { None }
    }

    /// parse the numeric HHMM representation used by FIRMS, which drops leading zeros ("930" for 09:30)
    /// and sometimes comes as float ("930.0")
    pub fn from_hhmm (s: &str) -> Option<AcqTime> {
        let s = s.trim();
        let digits = match s.split_once('.') {
            Some((int,frac)) if frac.chars().all(|c| c == '0') => int,
            Some(_) => return None,
            None => s
        };
        if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None
        }

        let hhmm: u32 = digits.parse().ok()?;
        AcqTime::new( hhmm / 100, hhmm % 100)
    }

    #[inline] pub fn hour (&self)->u32 { self.hour }
    #[inline] pub fn minute (&self)->u32 { self.minute }

    pub fn to_naive_time (&self) -> NaiveTime {
        // hour/minute are range checked on construction
        NaiveTime::from_hms_opt( self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for AcqTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:02}{:02}", self.hour, self.minute) }
}

impl FromStr for AcqTime {
    type Err = String;
    fn from_str (s: &str) -> std::result::Result<Self,String> {
        AcqTime::from_hhmm(s).ok_or_else( || format!("invalid HHMM time '{s}'"))
    }
}

impl Serialize for AcqTime {
    fn serialize<S: Serializer> (&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str( &self.to_string())
    }
}

impl<'de> Deserialize<'de> for AcqTime {
    fn deserialize<D: Deserializer<'de>> (d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        AcqTime::from_hhmm(&s).ok_or_else( || serde::de::Error::custom( format!("invalid HHMM time '{s}'")))
    }
}

/* #endregion AcqTime */

/* #region Detection ********************************************************************************************/

/// a single normalized satellite fire observation. Sizes are kilometers, brightness is Kelvin.
/// The acquisition timestamp is derived from date and time once on construction, which is why it is not
/// directly settable
#[derive(Debug,Clone,PartialEq,Serialize)]
#[serde(rename_all="camelCase")]
pub struct Detection {
    pub latitude: f64,
    pub longitude: f64,
    pub acquisition_date: NaiveDate,
    pub acquisition_time: AcqTime,
    #[serde(serialize_with="ser_short_rfc3339")]
    acquisition_timestamp: DateTime<Utc>,
    pub brightness: f64,
    pub scan_size: f64,
    pub track_size: f64,
    pub confidence: Confidence,
    pub satellite: String,

    // optional fields that are passed through if the feed has them
    #[serde(rename="brightness2", skip_serializing_if="Option::is_none")]
    pub brightness_2: Option<f64>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub frp: Option<f64>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub daynight: Option<String>,
}

impl Detection {
    pub fn new (latitude: f64, longitude: f64, acquisition_date: NaiveDate, acquisition_time: AcqTime,
                brightness: f64, scan_size: f64, track_size: f64, confidence: Confidence, satellite: impl ToString) -> Self {
        let acquisition_timestamp = Utc.from_utc_datetime( &acquisition_date.and_time( acquisition_time.to_naive_time()));

        Detection {
            latitude, longitude, acquisition_date, acquisition_time, acquisition_timestamp,
            brightness, scan_size, track_size, confidence,
            satellite: satellite.to_string(),
            brightness_2: None, frp: None, daynight: None
        }
    }

    pub fn acquisition_timestamp (&self) -> DateTime<Utc> { self.acquisition_timestamp }
}

/// a detection augmented with its severity and estimated footprint area. Instances are created by the classifier
/// and not mutated afterwards.
/// Note that `estimated_area_acres` is a sensor footprint approximation (scan * track), not a burned area
#[derive(Debug,Clone,PartialEq,Serialize)]
#[serde(rename_all="camelCase")]
pub struct ClassifiedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    pub severity: Severity,
    pub estimated_area_acres: f64,

    /// mission name of the first matching area of interest (if area scoping is enabled)
    #[serde(skip_serializing_if="Option::is_none")]
    pub area_of_interest: Option<String>,
}

impl ClassifiedDetection {
    #[inline] pub fn acquisition_date (&self) -> NaiveDate { self.detection.acquisition_date }
}

/* #endregion Detection */
