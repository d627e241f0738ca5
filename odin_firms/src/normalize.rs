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
use std::{collections::BTreeMap, fmt};
use chrono::{DateTime, NaiveDate, Timelike};
use serde::Serialize;
use tracing::{debug, info};
use odin_common::geo::{is_valid_latitude, is_valid_longitude};

use crate::{AcqTime, Confidence, Detection, fields::{Field, RawRecord}};

/// reasons why a raw record did not make it into a Detection. These are not errors - defective records
/// are dropped and counted
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum RecordDefect {
    MissingField(Field),
    InvalidNumber(Field),
    InvalidCoordinate,
    InvalidDate,
    InvalidTime,
    UnknownConfidence,
}

impl fmt::Display for RecordDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordDefect::MissingField(field) => write!(f, "missing {field}"),
            RecordDefect::InvalidNumber(field) => write!(f, "invalid {field}"),
            RecordDefect::InvalidCoordinate => f.write_str("coordinate out of range"),
            RecordDefect::InvalidDate => f.write_str("invalid date"),
            RecordDefect::InvalidTime => f.write_str("invalid time"),
            RecordDefect::UnknownConfidence => f.write_str("unknown confidence code"),
        }
    }
}

#[derive(Debug,Clone,Default,Serialize)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub dropped: BTreeMap<String,usize>,
}

impl NormalizeReport {
    pub fn n_dropped (&self) -> usize { self.dropped.values().sum() }

    fn count (&mut self, defect: RecordDefect) {
        *self.dropped.entry( defect.to_string()).or_insert(0) += 1;
    }
}

/// turn a raw record into a canonical Detection
pub fn normalize (raw: &RawRecord) -> Result<Detection,RecordDefect> {
    if let Some(field) = raw.missing_required_field() {
        return Err( RecordDefect::MissingField(field))
    }

    let latitude = number( raw, Field::Latitude)?;
    let longitude = number( raw, Field::Longitude)?;
    if !(is_valid_latitude(latitude) && is_valid_longitude(longitude)) {
        return Err( RecordDefect::InvalidCoordinate)
    }

    let brightness = number( raw, Field::Brightness)?;
    let scan_size = number( raw, Field::Scan)?;
    let track_size = number( raw, Field::Track)?;

    let confidence = match raw.get(Field::Confidence) {
        Some(code) => Confidence::from_code(code).ok_or( RecordDefect::UnknownConfidence)?,
        None => return Err( RecordDefect::MissingField(Field::Confidence))
    };

    let (acquisition_date, acquisition_time) = acquisition_date_time(raw)?;

    let satellite = raw.get(Field::Satellite)
        .or( raw.satellite_hint.as_deref())
        .ok_or( RecordDefect::MissingField(Field::Satellite))?;

    let mut detection = Detection::new( latitude, longitude, acquisition_date, acquisition_time,
                                        brightness, scan_size, track_size, confidence, satellite);
    detection.brightness_2 = optional_number( raw, Field::Brightness2)?;
    detection.frp = optional_number( raw, Field::Frp)?;
    detection.daynight = raw.get(Field::DayNight).map(|s| s.to_string());

    Ok(detection)
}

/// normalize a sequence of raw records, dropping (and counting) defective ones
pub fn normalize_all<'a> (records: impl IntoIterator<Item=&'a RawRecord>) -> (Vec<Detection>, NormalizeReport) {
    let mut detections = Vec::new();
    let mut report = NormalizeReport::default();

    for raw in records {
        match normalize(raw) {
            Ok(d) => detections.push(d),
            Err(defect) => {
                debug!(%defect, "dropping record");
                report.count(defect);
            }
        }
    }
    report.accepted = detections.len();

    info!(accepted=report.accepted, dropped=report.n_dropped(), "normalized records");
    for (defect,n) in &report.dropped {
        info!(defect=%defect, count=n, "dropped records");
    }

    (detections, report)
}

fn number (raw: &RawRecord, field: Field) -> Result<f64,RecordDefect> {
    match raw.get(field) {
        Some(s) => parse_finite(s).ok_or( RecordDefect::InvalidNumber(field)),
        None => Err( RecordDefect::MissingField(field))
    }
}

fn optional_number (raw: &RawRecord, field: Field) -> Result<Option<f64>,RecordDefect> {
    match raw.get(field) {
        Some(s) => parse_finite(s).map(Some).ok_or( RecordDefect::InvalidNumber(field)),
        None => Ok(None)
    }
}

fn parse_finite (s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// date and time come from the ACQ_DATE / ACQ_TIME columns. Only if one of them is missing do we fall back to
/// the combined ACQ_DATETIME column. Present but unparseable values are defects, not fallback triggers
fn acquisition_date_time (raw: &RawRecord) -> Result<(NaiveDate,AcqTime),RecordDefect> {
    match (raw.get(Field::AcqDate), raw.get(Field::AcqTime)) {
        (Some(date), Some(time)) => {
            Ok( (parse_acq_date(date)?, parse_acq_time(time)?) )
        }
        (date, time) => {
            if let Some(dt) = raw.get(Field::AcqDateTime) {
                let (fb_date, fb_time) = parse_acq_datetime(dt)?;
                let date = match date { Some(d) => parse_acq_date(d)?, None => fb_date };
                let time = match time { Some(t) => parse_acq_time(t)?, None => fb_time };
                Ok( (date,time) )
            } else if date.is_none() {
                Err( RecordDefect::MissingField(Field::AcqDate))
            } else {
                Err( RecordDefect::MissingField(Field::AcqTime))
            }
        }
    }
}

/// "YYYY-MM-DD", also accepting '/' as separator
pub fn parse_acq_date (s: &str) -> Result<NaiveDate,RecordDefect> {
    let s = s.trim().replace('/', "-");
    NaiveDate::parse_from_str( &s, "%Y-%m-%d").map_err(|_| RecordDefect::InvalidDate)
}

pub fn parse_acq_time (s: &str) -> Result<AcqTime,RecordDefect> {
    AcqTime::from_hhmm(s).ok_or( RecordDefect::InvalidTime)
}

/// the upstream combined timestamp looks like "2025/01/10 09:30:00+00"
pub fn normalize_datetime_text (s: &str) -> String {
    let s = s.trim();
    let s = match s.strip_suffix("+00") {
        Some(prefix) => format!("{prefix}Z"),
        None => s.to_string()
    };
    s.replace(' ', "T").replace('/', "-")
}

pub fn parse_acq_datetime (s: &str) -> Result<(NaiveDate,AcqTime),RecordDefect> {
    let normalized = normalize_datetime_text(s);
    let dt = DateTime::parse_from_rfc3339( &normalized).map_err(|_| RecordDefect::InvalidDate)?.naive_utc();
    let time = AcqTime::new( dt.hour(), dt.minute()).ok_or( RecordDefect::InvalidTime)?;
    Ok( (dt.date(), time) )
}
