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
use std::{collections::BTreeMap, sync::{Arc, RwLock}};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use odin_common::datetime::{ser_short_rfc3339, utc_now};

use crate::{ClassifiedDetection, Confidence, Severity};

/// inclusive calendar date range
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug,Clone,Default,PartialEq,Serialize)]
#[serde(rename_all="camelCase")]
pub struct DatasetSummary {
    pub n_detections: usize,
    pub by_severity: BTreeMap<Severity,usize>,
    pub by_confidence: BTreeMap<Confidence,usize>,
    pub total_estimated_acres: f64,
    pub date_range: Option<DateRange>,
}

/// the immutable result of a successful pipeline run, which is what all date-window queries are executed on.
/// We keep detections in pipeline order and maintain a separate stable index sorted by acquisition date so that
/// queries are binary searches that return date-ascending results (ties in pipeline order)
#[derive(Debug,Serialize)]
pub struct Dataset {
    run_id: u64,
    #[serde(serialize_with="ser_short_rfc3339")]
    created: DateTime<Utc>,
    detections: Vec<ClassifiedDetection>,
    #[serde(skip)]
    by_date: Vec<usize>,
    date_range: Option<DateRange>,
}

impl Dataset {
    pub fn new (run_id: u64, detections: Vec<ClassifiedDetection>) -> Self {
        let mut by_date: Vec<usize> = (0..detections.len()).collect();
        by_date.sort_by_key( |&i| detections[i].acquisition_date()); // stable

        let date_range = match (by_date.first(), by_date.last()) {
            (Some(&first), Some(&last)) => Some( DateRange { start: detections[first].acquisition_date(), end: detections[last].acquisition_date() }),
            _ => None
        };

        Dataset { run_id, created: utc_now(), detections, by_date, date_range }
    }

    pub fn empty (run_id: u64) -> Self { Dataset::new( run_id, Vec::new()) }

    #[inline] pub fn run_id (&self) -> u64 { self.run_id }
    #[inline] pub fn created (&self) -> DateTime<Utc> { self.created }
    #[inline] pub fn len (&self) -> usize { self.detections.len() }
    #[inline] pub fn is_empty (&self) -> bool { self.detections.is_empty() }

    /// detections in pipeline order
    pub fn detections (&self) -> &[ClassifiedDetection] { &self.detections }

    /// min/max acquisition date of all detections, or None if the dataset is empty
    pub fn date_range (&self) -> Option<DateRange> { self.date_range }

    /// all detections acquired on or before `date`
    pub fn detections_up_to (&self, date: NaiveDate) -> Vec<&ClassifiedDetection> {
        let end = self.by_date.partition_point( |&i| self.detections[i].acquisition_date() <= date);
        self.by_date[..end].iter().map( |&i| &self.detections[i]).collect()
    }

    /// all detections acquired within [start,end] (both inclusive). Empty if start > end
    pub fn detections_in_range (&self, start: NaiveDate, end: NaiveDate) -> Vec<&ClassifiedDetection> {
        if start > end { return Vec::new() }

        let lo = self.by_date.partition_point( |&i| self.detections[i].acquisition_date() < start);
        let hi = self.by_date.partition_point( |&i| self.detections[i].acquisition_date() <= end);
        self.by_date[lo..hi].iter().map( |&i| &self.detections[i]).collect()
    }

    pub fn summary (&self) -> DatasetSummary {
        let mut summary = DatasetSummary { n_detections: self.len(), date_range: self.date_range, ..Default::default() };
        for d in &self.detections {
            *summary.by_severity.entry(d.severity).or_insert(0) += 1;
            *summary.by_confidence.entry(d.detection.confidence).or_insert(0) += 1;
            summary.total_estimated_acres += d.estimated_area_acres;
        }
        summary
    }
}

/// the "current" dataset slot that queries are served from. Datasets are only published as a whole, and a dataset
/// of an older run never replaces one of a newer run. Readers get an `Arc` snapshot that stays valid (and
/// unchanged) regardless of subsequent publishing.
/// Queries on an empty store return empty results
#[derive(Debug,Default)]
pub struct DatasetStore {
    current: RwLock<Option<Arc<Dataset>>>
}

impl DatasetStore {
    pub fn new () -> Self { DatasetStore { current: RwLock::new(None) } }

    /// returns false if the store already holds a dataset from a newer run
    pub fn publish (&self, dataset: Arc<Dataset>) -> bool {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());

        if let Some(ds) = current.as_ref() {
            if ds.run_id() > dataset.run_id() {
                warn!(run_id=dataset.run_id(), current_run_id=ds.run_id(), "not publishing outdated dataset");
                return false
            }
        }

        info!(run_id=dataset.run_id(), n_detections=dataset.len(), "published dataset");
        *current = Some(dataset);
        true
    }

    pub fn current (&self) -> Option<Arc<Dataset>> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn date_range (&self) -> Option<DateRange> {
        self.current().and_then( |ds| ds.date_range())
    }

    pub fn detections_up_to (&self, date: NaiveDate) -> Vec<ClassifiedDetection> {
        match self.current() {
            Some(ds) => ds.detections_up_to(date).into_iter().cloned().collect(),
            None => Vec::new()
        }
    }

    pub fn detections_in_range (&self, start: NaiveDate, end: NaiveDate) -> Vec<ClassifiedDetection> {
        match self.current() {
            Some(ds) => ds.detections_in_range( start, end).into_iter().cloned().collect(),
            None => Vec::new()
        }
    }
}
