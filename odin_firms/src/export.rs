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
/// batch mode output artifacts: GeoJSON FeatureCollections with point geometries, or flat CSV.
/// Both use the camelCase field names and the canonical confidence vocabulary of ClassifiedDetection

use std::{fmt, fs::File, io::{BufWriter, Write}, path::Path, str::FromStr};
use chrono::NaiveDate;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Serialize,Deserialize};
use tracing::info;
use odin_common::datetime::short_rfc3339_string;

use crate::{AcqTime, ClassifiedDetection, Confidence, OutputConfig, Severity, dataset::Dataset, errors::{OdinFirmsError, Result, op_failed}};

#[derive(Debug,Clone,Copy,PartialEq,Eq,Default,Serialize,Deserialize)]
pub enum OutputFormat {
    #[default]
    GeoJson,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str (s: &str) -> std::result::Result<Self,String> {
        match s.to_ascii_lowercase().as_str() {
            "geojson" | "json" => Ok(OutputFormat::GeoJson),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err( format!("unknown output format '{s}' (use geojson or csv)"))
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::GeoJson => f.write_str("geojson"),
            OutputFormat::Csv => f.write_str("csv"),
        }
    }
}

pub fn to_feature (cd: &ClassifiedDetection) -> Result<Feature> {
    let properties: JsonObject = match serde_json::to_value(cd)? {
        serde_json::Value::Object(map) => map,
        _ => return Err( op_failed!("detection does not serialize into object"))
    };
    let geometry = Geometry::new( Value::Point( vec![ cd.detection.longitude, cd.detection.latitude ]));

    Ok( Feature { bbox: None, geometry: Some(geometry), id: None, properties: Some(properties), foreign_members: None } )
}

pub fn to_feature_collection<'a> (detections: impl IntoIterator<Item=&'a ClassifiedDetection>) -> Result<FeatureCollection> {
    let features = detections.into_iter().map( to_feature).collect::<Result<Vec<Feature>>>()?;
    Ok( FeatureCollection { bbox: None, features, foreign_members: None } )
}

pub fn write_geojson (dataset: &Dataset, w: impl Write) -> Result<()> {
    let fc = to_feature_collection( dataset.detections())?;
    serde_json::to_writer( w, &fc)?;
    Ok(())
}

/// flat CSV record. We can't use ClassifiedDetection directly since csv does not support flattened structs
#[derive(Debug,Serialize)]
#[serde(rename_all="camelCase")]
struct CsvRow<'a> {
    latitude: f64,
    longitude: f64,
    acquisition_date: NaiveDate,
    acquisition_time: AcqTime,
    acquisition_timestamp: String,
    brightness: f64,
    scan_size: f64,
    track_size: f64,
    confidence: Confidence,
    satellite: &'a str,
    brightness2: Option<f64>,
    frp: Option<f64>,
    daynight: Option<&'a str>,
    severity: Severity,
    estimated_area_acres: f64,
    area_of_interest: Option<&'a str>,
}

impl <'a> From<&'a ClassifiedDetection> for CsvRow<'a> {
    fn from (cd: &'a ClassifiedDetection) -> Self {
        let d = &cd.detection;
        CsvRow {
            latitude: d.latitude,
            longitude: d.longitude,
            acquisition_date: d.acquisition_date,
            acquisition_time: d.acquisition_time,
            acquisition_timestamp: short_rfc3339_string( &d.acquisition_timestamp()),
            brightness: d.brightness,
            scan_size: d.scan_size,
            track_size: d.track_size,
            confidence: d.confidence,
            satellite: d.satellite.as_str(),
            brightness2: d.brightness_2,
            frp: d.frp,
            daynight: d.daynight.as_deref(),
            severity: cd.severity,
            estimated_area_acres: cd.estimated_area_acres,
            area_of_interest: cd.area_of_interest.as_deref(),
        }
    }
}

pub fn write_csv (dataset: &Dataset, w: impl Write) -> Result<()> {
    let mut writer = csv::Writer::from_writer(w);
    for cd in dataset.detections() {
        writer.serialize( CsvRow::from(cd))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_dataset (dataset: &Dataset, output: &OutputConfig) -> Result<()> {
    write_dataset_to_path( dataset, &output.path, output.format)
}

pub fn write_dataset_to_path (dataset: &Dataset, path: impl AsRef<Path>, format: OutputFormat) -> Result<()> {
    let path = path.as_ref();
    let mut w = BufWriter::new( File::create(path)?);
    match format {
        OutputFormat::GeoJson => write_geojson( dataset, &mut w)?,
        OutputFormat::Csv => write_csv( dataset, &mut w)?,
    }
    w.flush()?;

    info!(path=?path, %format, n_detections=dataset.len(), "wrote dataset");
    Ok(())
}
