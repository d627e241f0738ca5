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
use std::{fmt, sync::{Arc, Mutex, atomic::{AtomicU64, Ordering}}, time::{Duration, Instant}};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    Confidence, Detection, FirmsPipelineConfig,
    area::{AreaOfInterest, filter_within},
    classify::classify_all,
    dataset::{Dataset, DatasetStore, DateRange},
    dedup::deduplicate,
    errors::{OdinFirmsError, Result},
    fetch::{FeedTransport, Fetcher, HttpTransport},
    normalize::{NormalizeReport, normalize_all},
};

/// the run state machine:
///   Idle -> Fetching -> Normalizing -> Deduplicating -> GeoFiltering -> Classifying -> Ready
/// with Failed being reachable from Fetching (fatal fetch error) and Normalizing (no surviving records), and from
/// any state if the run times out
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize)]
pub enum PipelineState {
    Idle,
    Fetching,
    Normalizing,
    Deduplicating,
    GeoFiltering,
    Classifying,
    Ready,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:?}", self) }
}

/// what a caller can still show after a failed run
#[derive(Debug,Clone,PartialEq,Serialize)]
pub enum Fallback {
    /// there is no previous dataset - render empty state
    NothingToShow,
    /// the store keeps serving the last good dataset
    StaleDataAvailable { date_range: Option<DateRange> },
}

#[derive(Debug)]
pub struct RunFailure {
    pub run_id: u64,
    pub cause: OdinFirmsError,
    /// the state in which the run failed
    pub failed_in: PipelineState,
    pub fallback: Fallback,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} failed in state {}: {}", self.run_id, self.failed_in, self.cause)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.cause) }
}

#[derive(Debug,Clone,Serialize)]
#[serde(rename_all="camelCase")]
pub struct SourceFailureReport {
    pub source: String,
    pub error: String,
}

/// observability data of a successful run
#[derive(Debug,Clone,Serialize)]
#[serde(rename_all="camelCase")]
pub struct RunReport {
    pub run_id: u64,
    pub n_raw: usize,
    pub normalize: NormalizeReport,
    pub n_unique: usize,
    pub n_below_min_confidence: usize,
    pub n_in_area: usize,
    pub n_classified: usize,
    pub failed_sources: Vec<SourceFailureReport>,
    pub date_range: Option<DateRange>,
    pub published: bool,
    pub elapsed: Duration,
    pub transitions: Vec<PipelineState>,
}

pub struct Pipeline {
    config: FirmsPipelineConfig,
    fetcher: Fetcher,
    store: Arc<DatasetStore>,
    last_run_id: AtomicU64,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    /// this validates the config, i.e. configuration defects are reported before any run and never retried
    pub fn new (config: FirmsPipelineConfig, transport: Arc<dyn FeedTransport>, store: Arc<DatasetStore>) -> Result<Self> {
        config.validate()?;

        let fetcher = Fetcher::new( transport, config.retry.clone())
            .with_parallel_sources( config.parallel_sources)
            .with_require_all_sources( config.require_all_sources);

        Ok( Pipeline { config, fetcher, store, last_run_id: AtomicU64::new(0), state: Mutex::new(PipelineState::Idle) } )
    }

    /// a pipeline that fetches through HTTP
    pub fn with_http (config: FirmsPipelineConfig, store: Arc<DatasetStore>) -> Result<Self> {
        let transport = Arc::new( HttpTransport::new( HttpTransport::DEFAULT_REQUEST_TIMEOUT)?);
        Pipeline::new( config, transport, store)
    }

    pub fn config (&self) -> &FirmsPipelineConfig { &self.config }

    pub fn store (&self) -> &Arc<DatasetStore> { &self.store }

    /// the state of the most recent run
    pub fn state (&self) -> PipelineState { *self.state.lock().unwrap_or_else(|e| e.into_inner()) }

    /// execute one complete run. On success the new dataset has been published to the store. A failed run never
    /// changes the store
    pub async fn run (&self) -> std::result::Result<RunReport,RunFailure> {
        let run_id = self.last_run_id.fetch_add( 1, Ordering::SeqCst) + 1;
        let mut run = RunContext::new( run_id, &self.state);
        info!(run_id, "starting pipeline run");

        let res = match self.config.run_timeout {
            Some(timeout) => match tokio::time::timeout( timeout, self.execute( &mut run)).await {
                Ok(res) => res,
                Err(_) => Err( OdinFirmsError::Timeout(timeout))
            }
            None => self.execute( &mut run).await
        };

        match res {
            Ok(report) => Ok(report),
            Err(cause) => {
                let failed_in = run.current;
                run.transition( PipelineState::Failed);

                let fallback = match self.store.current() {
                    Some(ds) => Fallback::StaleDataAvailable { date_range: ds.date_range() },
                    None => Fallback::NothingToShow
                };
                error!(run_id, %failed_in, ?fallback, "pipeline run failed: {cause}");

                Err( RunFailure { run_id, cause, failed_in, fallback } )
            }
        }
    }

    async fn execute (&self, run: &mut RunContext<'_>) -> Result<RunReport> {
        let cfg = &self.config;
        let start = Instant::now();

        //--- Fetching
        run.transition( PipelineState::Fetching);
        let areas: Option<Vec<AreaOfInterest>> = match &cfg.areas {
            Some(area_cfg) => Some( self.fetcher.fetch_areas( area_cfg).await?),
            None => None
        };
        let fetched = self.fetcher.fetch( &cfg.sources).await?;
        let n_raw = fetched.n_records();
        let failed_sources: Vec<SourceFailureReport> = fetched.failures.iter()
            .map( |f| SourceFailureReport { source: f.source.clone(), error: f.error.to_string() })
            .collect();

        //--- Normalizing
        run.transition( PipelineState::Normalizing);
        let (detections, normalize) = normalize_all( fetched.records());
        drop(fetched);
        if detections.is_empty() {
            return Err( OdinFirmsError::NoRecords { dropped: normalize.n_dropped() })
        }

        //--- Deduplicating
        run.transition( PipelineState::Deduplicating);
        let detections = deduplicate( detections);
        let n_unique = detections.len();

        //--- GeoFiltering (confidence and area scoping)
        run.transition( PipelineState::GeoFiltering);
        let detections = filter_min_confidence( detections, cfg.min_confidence);
        let n_below_min_confidence = n_unique - detections.len();

        let scoped: Vec<(Detection,Option<String>)> = match &areas {
            Some(areas) => filter_within( detections, areas).into_iter()
                .map( |(d,idx)| (d, Some( areas[idx].mission_name.clone())))
                .collect(),
            None => detections.into_iter().map( |d| (d,None)).collect()
        };
        let n_in_area = scoped.len();

        //--- Classifying
        run.transition( PipelineState::Classifying);
        let classified = classify_all( scoped, &cfg.severity);
        let n_classified = classified.len();

        let dataset = Arc::new( Dataset::new( run.run_id, classified));
        let date_range = dataset.date_range();
        let published = self.store.publish( dataset);

        run.transition( PipelineState::Ready);
        let elapsed = start.elapsed();
        info!(run_id=run.run_id, n_raw, n_classified, ?elapsed, "pipeline run complete");

        Ok( RunReport {
            run_id: run.run_id, n_raw, normalize, n_unique, n_below_min_confidence, n_in_area, n_classified,
            failed_sources, date_range, published, elapsed, transitions: run.transitions.clone()
        })
    }
}

fn filter_min_confidence (detections: Vec<Detection>, min_confidence: Option<Confidence>) -> Vec<Detection> {
    match min_confidence {
        Some(min) => detections.into_iter().filter(|d| d.confidence >= min).collect(),
        None => detections
    }
}

/// per-run state tracking that also mirrors the current state into the pipeline
struct RunContext<'a> {
    run_id: u64,
    current: PipelineState,
    transitions: Vec<PipelineState>,
    shared: &'a Mutex<PipelineState>,
}

impl <'a> RunContext<'a> {
    fn new (run_id: u64, shared: &'a Mutex<PipelineState>) -> Self {
        RunContext { run_id, current: PipelineState::Idle, transitions: vec![PipelineState::Idle], shared }
    }

    fn transition (&mut self, next: PipelineState) {
        info!(run_id=self.run_id, from=%self.current, to=%next, "state transition");
        self.current = next;
        self.transitions.push(next);
        *self.shared.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }
}
