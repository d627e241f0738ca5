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
use std::collections::HashSet;
use chrono::{DateTime, Utc};
use tracing::info;
use odin_common::quantize;

use crate::{Confidence, Detection};

// the precision of the upstream CSV format
const COORD_DECIMALS: i32 = 5;
const VALUE_DECIMALS: i32 = 2;

/// strict equality key of a detection. This is not a proximity match - two independent detections in the same
/// location are different if any of their measured values differ
#[derive(Debug,Clone,PartialEq,Eq,Hash)]
struct DetectionKey {
    lat: i64,
    lon: i64,
    timestamp: DateTime<Utc>,
    brightness: i64,
    scan: i64,
    track: i64,
    confidence: Confidence,
    satellite: String,
    brightness_2: Option<i64>,
    frp: Option<i64>,
    daynight: Option<String>,
}

impl From<&Detection> for DetectionKey {
    fn from (d: &Detection) -> Self {
        DetectionKey {
            lat: quantize( d.latitude, COORD_DECIMALS),
            lon: quantize( d.longitude, COORD_DECIMALS),
            timestamp: d.acquisition_timestamp(),
            brightness: quantize( d.brightness, VALUE_DECIMALS),
            scan: quantize( d.scan_size, VALUE_DECIMALS),
            track: quantize( d.track_size, VALUE_DECIMALS),
            confidence: d.confidence,
            satellite: d.satellite.clone(),
            brightness_2: d.brightness_2.map(|v| quantize( v, VALUE_DECIMALS)),
            frp: d.frp.map(|v| quantize( v, VALUE_DECIMALS)),
            daynight: d.daynight.clone(),
        }
    }
}

/// remove records that were reported more than once (overlapping query windows or satellite coverage).
/// The first occurrence is kept and the order of the remaining detections is preserved
pub fn deduplicate (detections: Vec<Detection>) -> Vec<Detection> {
    let n_in = detections.len();
    let mut seen: HashSet<DetectionKey> = HashSet::with_capacity(n_in);

    let unique: Vec<Detection> = detections.into_iter()
        .filter(|d| seen.insert( DetectionKey::from(d)))
        .collect();

    info!(n_in, n_unique=unique.len(), "removed duplicates");
    unique
}
