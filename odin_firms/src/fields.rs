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
/// the mapping between upstream column names and our canonical detection fields.
/// This table is the only place where upstream naming conventions are known - VIIRS WFS output, FIRMS area API
/// output ("bright_ti4") and our own CSV exports all go through it

use std::{collections::HashMap, fmt};
use lazy_static::lazy_static;
use tracing::debug;

use crate::errors::{OdinFirmsError, Result};

#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum Field {
    Latitude,
    Longitude,
    Brightness,
    Scan,
    Track,
    AcqDate,
    AcqTime,
    Confidence,
    Satellite,
    // optional
    Brightness2,
    Frp,
    DayNight,
    AcqDateTime,
}

pub struct FieldSpec {
    pub field: Field,
    /// accepted column names, upper case
    pub columns: &'static [&'static str],
    /// a record without this field (and without its fallback) is a defect
    pub required: bool,
    /// where the value can come from if the record does not have the column
    pub fallback: Option<FieldFallback>,
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum FieldFallback {
    /// derived from another field of the same record
    FromField(Field),
    /// the satellite id of the request that produced the record
    SatelliteHint,
}

pub const FIELD_MAP: &[FieldSpec] = &[
    FieldSpec { field: Field::Latitude,    columns: &["LATITUDE", "LAT"],                  required: true,  fallback: None },
    FieldSpec { field: Field::Longitude,   columns: &["LONGITUDE", "LON"],                 required: true,  fallback: None },
    FieldSpec { field: Field::Brightness,  columns: &["BRIGHTNESS", "BRIGHT_TI4"],         required: true,  fallback: None },
    FieldSpec { field: Field::Scan,        columns: &["SCAN", "SCANSIZE", "SCAN_SIZE"],    required: true,  fallback: None },
    FieldSpec { field: Field::Track,       columns: &["TRACK", "TRACKSIZE", "TRACK_SIZE"], required: true,  fallback: None },
    FieldSpec { field: Field::AcqDate,     columns: &["ACQ_DATE", "ACQUISITIONDATE"],      required: true,  fallback: Some(FieldFallback::FromField(Field::AcqDateTime)) },
    FieldSpec { field: Field::AcqTime,     columns: &["ACQ_TIME", "ACQUISITIONTIME"],      required: true,  fallback: Some(FieldFallback::FromField(Field::AcqDateTime)) },
    FieldSpec { field: Field::Confidence,  columns: &["CONFIDENCE"],                       required: true,  fallback: None },
    FieldSpec { field: Field::Satellite,   columns: &["SATELLITE"],                        required: true,  fallback: Some(FieldFallback::SatelliteHint) },
    FieldSpec { field: Field::Brightness2, columns: &["BRIGHTNESS_2", "BRIGHT_2", "BRIGHT_TI5", "BRIGHTNESS2"], required: false, fallback: None },
    FieldSpec { field: Field::Frp,         columns: &["FRP"],                              required: false, fallback: None },
    FieldSpec { field: Field::DayNight,    columns: &["DAYNIGHT"],                         required: false, fallback: None },
    FieldSpec { field: Field::AcqDateTime, columns: &["ACQ_DATETIME", "ACQ_DT", "ACQUISITIONTIMESTAMP"], required: false, fallback: None },
];

/// columns that are artifacts of how the upstream data was produced (pandas index columns, duplicated geometry)
const INCIDENTAL_COLUMNS: &[&str] = &["WKT", "GEOMETRY"];
const UNNAMED_PREFIX: &str = "UNNAMED:";

lazy_static! {
    static ref COLUMN_INDEX: HashMap<&'static str,Field> = {
        let mut map = HashMap::new();
        for spec in FIELD_MAP {
            for col in spec.columns { map.insert( *col, spec.field); }
        }
        map
    };
}

impl Field {
    /// the canonical field for a raw column header, which is trimmed and upper-cased before lookup
    pub fn for_column (name: &str) -> Option<Field> {
        let name = name.trim().trim_start_matches('\u{feff}').to_ascii_uppercase();
        if is_incidental_column(&name) {
            None
        } else {
            COLUMN_INDEX.get( name.as_str()).copied()
        }
    }

    pub fn spec (&self) -> &'static FieldSpec {
        // FIELD_MAP has one entry per variant, in declaration order
        &FIELD_MAP[*self as usize]
    }

    pub fn canonical_name (&self) -> &'static str { self.spec().columns[0] }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str( self.canonical_name()) }
}

pub fn is_incidental_column (upper_name: &str) -> bool {
    upper_name.starts_with(UNNAMED_PREFIX) || INCIDENTAL_COLUMNS.contains(&upper_name)
}

/// a raw upstream record in terms of canonical fields. Empty values are not stored
#[derive(Debug,Clone,Default)]
pub struct RawRecord {
    pub values: HashMap<Field,String>,

    /// the satellite id of the request this record came from (if any)
    pub satellite_hint: Option<String>,
}

impl RawRecord {
    pub fn get (&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(|s| s.as_str())
    }

    pub fn with (mut self, field: Field, value: impl ToString) -> Self {
        self.values.insert( field, value.to_string());
        self
    }

    /// the first required field (in FIELD_MAP order) for which we have neither a value nor a fallback
    pub fn missing_required_field (&self) -> Option<Field> {
        FIELD_MAP.iter()
            .filter( |spec| spec.required)
            .find( |spec| !self.values.contains_key(&spec.field) && !self.has_fallback(spec))
            .map( |spec| spec.field)
    }

    fn has_fallback (&self, spec: &FieldSpec) -> bool {
        match spec.fallback {
            Some(FieldFallback::FromField(field)) => self.values.contains_key(&field),
            Some(FieldFallback::SatelliteHint) => self.satellite_hint.is_some(),
            None => false
        }
    }
}

/// parse a CSV feed response into raw records. Column matching is case insensitive, unknown and incidental columns
/// are ignored. A response without latitude/longitude columns is not a feed (e.g. a HTML error page or an
/// exception report) and hence rejected as a whole
pub fn parse_feed_csv (text: &str, satellite_hint: Option<&str>) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns: Vec<Option<Field>> = reader.headers()?.iter().map( Field::for_column).collect();

    for required in [Field::Latitude, Field::Longitude] {
        if !columns.contains( &Some(required)) {
            return Err( OdinFirmsError::MalformedFeed( format!("no {} column", required)))
        }
    }

    let mut records = Vec::new();
    for res in reader.records() {
        let row = res?;
        let mut rec = RawRecord { values: HashMap::new(), satellite_hint: satellite_hint.map(|s| s.to_string()) };

        for (i,value) in row.iter().enumerate() {
            if let Some(Some(field)) = columns.get(i) {
                if !value.is_empty() {
                    rec.values.insert( *field, value.to_string());
                }
            }
        }
        records.push(rec);
    }

    debug!(n_records=records.len(), "parsed feed");
    Ok(records)
}
