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
use serde::{Serialize,Deserialize};
use tracing::info;

use crate::{ClassifiedDetection, Detection, Severity, errors::{OdinFirmsError, Result, config_error}};

/// the factor we use to turn the scan * track product into acres.
/// Note this is the square meter conversion while scan and track are reported in km, i.e. the result is
/// only a relative footprint measure, not a burned area
pub const FOOTPRINT_ACRES_FACTOR: f64 = 0.000247105;

/// brightness (Kelvin) thresholds. Buckets are inclusive-low/exclusive-high:
///   b < medium -> Low,  medium <= b < high -> Medium,  b >= high -> High
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct SeverityThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for SeverityThresholds {
    fn default()->Self { SeverityThresholds { medium: 325.0, high: 350.0 } }
}

impl SeverityThresholds {
    pub fn validate (&self) -> Result<()> {
        if !(self.medium.is_finite() && self.high.is_finite()) {
            Err( config_error!("severity thresholds have to be finite"))
        } else if self.medium >= self.high {
            Err( config_error!("medium severity threshold {} not below high threshold {}", self.medium, self.high))
        } else {
            Ok(())
        }
    }

    pub fn severity (&self, brightness: f64) -> Severity {
        if brightness >= self.high {
            Severity::High
        } else if brightness >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

pub fn estimated_area_acres (scan_size: f64, track_size: f64) -> f64 {
    scan_size * track_size * FOOTPRINT_ACRES_FACTOR
}

pub fn classify (detection: Detection, thresholds: &SeverityThresholds, area_of_interest: Option<String>) -> ClassifiedDetection {
    let severity = thresholds.severity( detection.brightness);
    let estimated_area_acres = estimated_area_acres( detection.scan_size, detection.track_size);

    ClassifiedDetection { detection, severity, estimated_area_acres, area_of_interest }
}

/// classify a list of (detection, matched area name) pairs
pub fn classify_all (detections: Vec<(Detection,Option<String>)>, thresholds: &SeverityThresholds) -> Vec<ClassifiedDetection> {
    let classified: Vec<ClassifiedDetection> = detections.into_iter()
        .map( |(d,area)| classify( d, thresholds, area))
        .collect();

    let n_high = classified.iter().filter(|c| c.severity == Severity::High).count();
    let n_medium = classified.iter().filter(|c| c.severity == Severity::Medium).count();
    info!(n=classified.len(), n_high, n_medium, "classified detections");

    classified
}
