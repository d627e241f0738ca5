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

use std::{path::PathBuf, sync::{Arc, Mutex, atomic::{AtomicBool, AtomicUsize, Ordering}}, time::Duration};
use async_trait::async_trait;
use chrono::NaiveDate;
use odin_common::{datetime::millis, geo::GeoRect, net::OdinNetError};
use odin_firms::{
    load_pipeline_config, AreaSourceConfig, Confidence, DatasetStore, Fallback, FirmsPipelineConfig, Pipeline, PipelineState,
    RetryConfig, Severity, SourceConfig, WfsSourceConfig, DEFAULT_WFS_URL_SUFFIX,
    classify::SeverityThresholds,
    errors::OdinFirmsError,
    export::{OutputFormat, write_dataset, write_dataset_to_path},
    fetch::FeedTransport,
};

/// run with "cargo test --test test_pipeline -- --nocapture"

const HEADER: &str = "LATITUDE,LONGITUDE,BRIGHTNESS,SCAN,TRACK,ACQ_DATE,ACQ_TIME,SATELLITE,CONFIDENCE";

fn feed_body (rows: &[&str]) -> String {
    let mut s = String::from(HEADER);
    for r in rows { s.push('\n'); s.push_str(r) }
    s.push('\n');
    s
}

fn three_records () -> String {
    feed_body( &[
        "34.10,-118.50,300.0,0.39,0.36,2025-01-10,0930,N,l",
        "34.12,-118.45,330.0,0.41,0.37,2025-01-10,0930,N,n",
        "34.15,-118.55,360.0,0.52,0.42,2025-01-10,0930,N,h",
    ])
}

/// a feed that returns the same body for every request, or fails with 503 while `failing` is set
struct MockFeed {
    body: Mutex<String>,
    failing: AtomicBool,
    latency: Duration,
    n_requests: AtomicUsize,
}

impl MockFeed {
    fn new (body: String) -> Arc<Self> {
        Arc::new( MockFeed { body: Mutex::new(body), failing: AtomicBool::new(false), latency: Duration::ZERO, n_requests: AtomicUsize::new(0) })
    }

    fn failing () -> Arc<Self> {
        let feed = MockFeed { body: Mutex::new(String::new()), failing: AtomicBool::new(true), latency: Duration::ZERO, n_requests: AtomicUsize::new(0) };
        Arc::new(feed)
    }

    fn slow (body: String, latency: Duration) -> Arc<Self> {
        Arc::new( MockFeed { body: Mutex::new(body), failing: AtomicBool::new(false), latency, n_requests: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl FeedTransport for MockFeed {
    async fn get_text (&self, url: &str) -> Result<String,OdinNetError> {
        self.n_requests.fetch_add( 1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep( self.latency).await;
        }
        if self.failing.load( Ordering::SeqCst) {
            Err( OdinNetError::StatusError( url.to_string(), 503))
        } else {
            Ok( self.body.lock().unwrap().clone())
        }
    }
}


fn config (areas: bool) -> FirmsPipelineConfig {
    FirmsPipelineConfig {
        sources: vec![
            SourceConfig::Wfs( WfsSourceConfig {
                name: "la".to_string(),
                base_url: "https://firms.test/mapserver/wfs/USA".to_string(),
                url_suffix: DEFAULT_WFS_URL_SUFFIX.to_string(),
                bounds: GeoRect::from_wsen( -119.0, 33.5, -117.5, 34.5).unwrap(),
                satellites: vec!["snpp".to_string()],
                map_keys: vec!["KEY".to_string()],
            })
        ],
        retry: RetryConfig { max_attempts: 5, retry_delay: millis(2), request_delay: millis(2) },
        severity: SeverityThresholds::default(),
        areas: if areas { Some( AreaSourceConfig::File( PathBuf::from("tests/data/perimeters.geojson"))) } else { None },
        min_confidence: None,
        require_all_sources: false,
        parallel_sources: false,
        run_timeout: None,
        output: None,
    }
}

fn date (day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2025,1,day).unwrap() }

#[tokio::test]
async fn test_end_to_end () {
    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( config(true), MockFeed::new( three_records()), store.clone()).unwrap();
    assert_eq!( pipeline.state(), PipelineState::Idle);

    let report = pipeline.run().await.unwrap();
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    assert_eq!( pipeline.state(), PipelineState::Ready);
    assert_eq!( report.transitions, vec![
        PipelineState::Idle, PipelineState::Fetching, PipelineState::Normalizing, PipelineState::Deduplicating,
        PipelineState::GeoFiltering, PipelineState::Classifying, PipelineState::Ready
    ]);
    assert_eq!( report.n_classified, 3);
    assert!( report.published);

    let dataset = store.current().unwrap();
    let severities: Vec<Severity> = dataset.detections().iter().map(|c| c.severity).collect();
    let confidences: Vec<Confidence> = dataset.detections().iter().map(|c| c.detection.confidence).collect();
    assert_eq!( severities, vec![Severity::Low, Severity::Medium, Severity::High]);
    assert_eq!( confidences, vec![Confidence::Low, Confidence::Nominal, Confidence::High]);
    assert!( dataset.detections().iter().all(|c| c.area_of_interest.as_deref() == Some("PALISADES")));

    assert_eq!( store.detections_up_to( date(10)).len(), 3);
    assert_eq!( store.detections_up_to( date(9)).len(), 0);
    assert_eq!( store.date_range().map(|r| (r.start, r.end)), Some( (date(10), date(10))));
}

#[tokio::test]
async fn test_point_outside_area () {
    let body = feed_body( &[
        "34.10,-118.50,300.0,0.39,0.36,2025-01-10,0930,N,l",
        "34.12,-118.45,330.0,0.41,0.37,2025-01-10,0930,N,n",
        "34.05,-117.00,360.0,0.52,0.42,2025-01-10,0930,N,h",
    ]);

    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( config(true), MockFeed::new( body), store.clone()).unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!( report.n_in_area, 2);
    assert_eq!( store.current().unwrap().len(), 2);
}

#[tokio::test]
async fn test_without_areas () {
    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( config(false), MockFeed::new( three_records()), store.clone()).unwrap();
    pipeline.run().await.unwrap();

    let dataset = store.current().unwrap();
    assert_eq!( dataset.len(), 3);
    assert!( dataset.detections().iter().all(|c| c.area_of_interest.is_none()));
}

#[tokio::test]
async fn test_retry_exhaustion_fails_run () {
    let feed = MockFeed::failing();
    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( config(true), feed.clone(), store.clone()).unwrap();

    let failure = pipeline.run().await.unwrap_err();
    println!("{failure}");

    assert_eq!( feed.n_requests.load(Ordering::SeqCst), 5);
    assert_eq!( failure.failed_in, PipelineState::Fetching);
    assert_eq!( failure.fallback, Fallback::NothingToShow);
    assert_eq!( pipeline.state(), PipelineState::Failed);

    assert!( store.detections_up_to( date(10)).is_empty());
    assert!( store.date_range().is_none());
}

#[tokio::test]
async fn test_failed_run_keeps_previous_dataset () {
    let feed = MockFeed::new( three_records());
    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( config(false), feed.clone(), store.clone()).unwrap();

    let first = pipeline.run().await.unwrap();

    feed.failing.store( true, Ordering::SeqCst);
    let failure = pipeline.run().await.unwrap_err();

    match &failure.fallback {
        Fallback::StaleDataAvailable{date_range} => assert_eq!( date_range.map(|r| r.end), Some(date(10))),
        other => panic!("expected stale data, got {other:?}")
    }
    assert_eq!( store.current().unwrap().run_id(), first.run_id);
    assert_eq!( store.detections_up_to( date(10)).len(), 3);
}

#[tokio::test]
async fn test_no_surviving_records () {
    let body = feed_body( &[
        "34.10,-118.50,300.0,0.39,0.36,2025-01-10,0930,N,x",
        "34.12,-118.45,330.0,0.41,0.37,not-a-date,0930,N,n",
    ]);

    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( config(false), MockFeed::new( body), store.clone()).unwrap();
    let failure = pipeline.run().await.unwrap_err();

    assert_eq!( failure.failed_in, PipelineState::Normalizing);
    assert!( matches!( failure.cause, OdinFirmsError::NoRecords{ dropped: 2 }));
    assert!( store.current().is_none());
}

#[tokio::test]
async fn test_all_filtered_is_ready_but_empty () {
    let body = feed_body( &[ "34.05,-117.00,360.0,0.52,0.42,2025-01-10,0930,N,h" ]);

    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( config(true), MockFeed::new( body), store.clone()).unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!( report.n_classified, 0);
    assert_eq!( store.current().unwrap().len(), 0);
    assert!( store.date_range().is_none());
}

#[tokio::test]
async fn test_min_confidence () {
    let mut cfg = config(false);
    cfg.min_confidence = Some(Confidence::Nominal);

    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( cfg, MockFeed::new( three_records()), store.clone()).unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!( report.n_below_min_confidence, 1);
    assert!( store.current().unwrap().detections().iter().all(|c| c.detection.confidence >= Confidence::Nominal));
}

#[tokio::test]
async fn test_run_timeout () {
    let mut cfg = config(false);
    cfg.run_timeout = Some( millis(50));

    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( cfg, MockFeed::slow( three_records(), millis(2000)), store.clone()).unwrap();
    let failure = pipeline.run().await.unwrap_err();

    assert!( matches!( failure.cause, OdinFirmsError::Timeout(_)));
    assert_eq!( failure.failed_in, PipelineState::Fetching);
    assert!( store.current().is_none());
}

#[test]
fn test_config_defect_rejected_before_run () {
    let mut cfg = config(false);
    if let SourceConfig::Wfs(wfs) = &mut cfg.sources[0] {
        wfs.satellites = vec!["snpp".to_string(), "noaa20".to_string(), "noaa21".to_string()];
        wfs.map_keys = vec!["K1".to_string(), "K2".to_string()];
    }

    let feed = MockFeed::new( three_records());
    let res = Pipeline::new( cfg, feed.clone(), Arc::new( DatasetStore::new()));
    assert!( matches!( res, Err(OdinFirmsError::ConfigError(_))));
    assert_eq!( feed.n_requests.load(Ordering::SeqCst), 0);

    let mut cfg = config(false);
    cfg.retry.max_attempts = 0;
    assert!( Pipeline::new( cfg, MockFeed::new( three_records()), Arc::new( DatasetStore::new())).is_err());

    let mut cfg = config(false);
    cfg.sources.clear();
    assert!( Pipeline::new( cfg, MockFeed::new( three_records()), Arc::new( DatasetStore::new())).is_err());
}

#[tokio::test]
async fn test_local_csv_sources () {
    let cfg: FirmsPipelineConfig = load_pipeline_config("firms_local_csv.ron").unwrap();
    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( cfg, MockFeed::failing(), store.clone()).unwrap();

    let report = pipeline.run().await.unwrap();
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    assert_eq!( report.n_raw, 10);
    assert_eq!( report.normalize.accepted, 8);
    assert_eq!( report.n_unique, 6);
    assert_eq!( report.n_in_area, 5);

    let ds = store.current().unwrap();
    let summary = ds.summary();
    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    assert_eq!( summary.by_severity.get(&Severity::High), Some(&2));
    assert_eq!( summary.by_severity.get(&Severity::Medium), Some(&2));
    assert_eq!( summary.by_severity.get(&Severity::Low), Some(&1));
    assert_eq!( ds.date_range().map(|r| (r.start,r.end)), Some( (date(10), date(12))));

    assert_eq!( store.detections_in_range( date(11), date(12)).len(), 3);
    assert_eq!( ds.detections().iter().filter(|c| c.area_of_interest.as_deref() == Some("EATON")).count(), 2);
}

#[test]
fn test_parse_config_files () {
    let cfg: FirmsPipelineConfig = load_pipeline_config("firms_viirs_la.ron").unwrap();
    println!("{cfg:#?}");

    assert_eq!( cfg.retry.max_attempts, 5);
    assert_eq!( cfg.retry.retry_delay, Duration::from_secs(30));
    assert_eq!( cfg.retry.request_delay, Duration::from_secs(5));
    assert_eq!( cfg.run_timeout, Some( Duration::from_secs(15 * 60)));
    assert_eq!( cfg.min_confidence, Some(Confidence::Nominal));
    assert_eq!( cfg.output.as_ref().map(|o| o.format), Some(OutputFormat::GeoJson));
    assert!( cfg.validate().is_ok());

    match &cfg.sources[0] {
        SourceConfig::Wfs(wfs) => {
            assert_eq!( wfs.satellites, vec!["snpp", "noaa20"]);
            assert_eq!( wfs.url_suffix, DEFAULT_WFS_URL_SUFFIX);
            assert_eq!( wfs.bounds.south(), 33.5);
        }
        other => panic!("unexpected source {other:?}")
    }

    let cfg: FirmsPipelineConfig = load_pipeline_config("firms_local_csv.ron").unwrap();
    assert_eq!( cfg.sources.len(), 2);
    assert_eq!( cfg.retry.max_attempts, 5); // default
}

#[test]
fn test_config_paths_resolved () {
    for name in ["firms_viirs_la.ron", "firms_local_csv.ron"] {
        let cfg: FirmsPipelineConfig = load_pipeline_config( name).unwrap();

        if let Some(AreaSourceConfig::File(path)) = &cfg.areas {
            println!("{name} areas: {path:?}");
            assert!( path.is_absolute());
            assert!( path.is_file(), "{path:?}");
        }
        for src in &cfg.sources {
            if let SourceConfig::CsvFile{path,..} = src {
                println!("{name} source: {path:?}");
                assert!( path.is_file(), "{path:?}");
            }
        }
    }

    // absolute paths are kept as they are
    let mut cfg = config(false);
    let abs = std::env::temp_dir().join("perimeters.geojson");
    cfg.areas = Some( AreaSourceConfig::File( abs.clone()));
    cfg.resolve_paths( std::path::Path::new("/somewhere/else"));
    assert!( matches!( &cfg.areas, Some(AreaSourceConfig::File(p)) if *p == abs));
}

#[test]
fn test_output_overrides () {
    let cfg: FirmsPipelineConfig = load_pipeline_config("firms_viirs_la.ron").unwrap();

    let out = cfg.output_with( None, None).unwrap();
    assert_eq!( (out.path, out.format), (PathBuf::from("viirs_la_detections.geojson"), OutputFormat::GeoJson));

    let out = cfg.output_with( None, Some(OutputFormat::Csv)).unwrap();
    assert_eq!( (out.path, out.format), (PathBuf::from("viirs_la_detections.geojson"), OutputFormat::Csv));

    let out = cfg.output_with( Some( PathBuf::from("today.csv")), Some(OutputFormat::Csv)).unwrap();
    assert_eq!( out.path, PathBuf::from("today.csv"));

    let mut cfg = config(false);
    cfg.output = None;
    assert!( cfg.output_with( None, Some(OutputFormat::Csv)).is_none());
    assert_eq!( cfg.output_with( Some( PathBuf::from("x.geojson")), None).map(|o| o.format), Some(OutputFormat::GeoJson));
}

#[test]
fn test_invalid_bounds_in_config () {
    let text = r#"(
        sources: [ Wfs(( name: "x", base_url: "https://firms.test", bounds: ( west: -117.5, south: 33.5, east: -119.0, north: 34.5 ),
                         satellites: ["snpp"], map_keys: ["K"] )) ],
    )"#;
    let res: Result<FirmsPipelineConfig,_> = ron::from_str( text);
    assert!( res.is_err());
    println!("{}", res.unwrap_err());
}

#[tokio::test]
async fn test_export () {
    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::new( config(true), MockFeed::new( three_records()), store.clone()).unwrap();
    pipeline.run().await.unwrap();
    let ds = store.current().unwrap();

    let dir = std::env::temp_dir();
    let json_path = dir.join( format!("odin_firms_test_{}.geojson", std::process::id()));
    write_dataset_to_path( &ds, &json_path, OutputFormat::GeoJson).unwrap();

    let json: serde_json::Value = serde_json::from_str( &std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!( json["type"], "FeatureCollection");
    let features = json["features"].as_array().unwrap();
    assert_eq!( features.len(), 3);
    assert_eq!( features[0]["geometry"]["type"], "Point");
    assert_eq!( features[0]["geometry"]["coordinates"][0], -118.5);
    assert_eq!( features[0]["properties"]["confidence"], "low");
    assert_eq!( features[2]["properties"]["severity"], "High");
    assert_eq!( features[0]["properties"]["acquisitionTimestamp"], "2025-01-10T09:30:00Z");

    let csv_path = dir.join( format!("odin_firms_test_{}.csv", std::process::id()));
    let output = config(true).output_with( Some( csv_path.clone()), Some(OutputFormat::Csv)).unwrap();
    write_dataset( &ds, &output).unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    println!("{text}");
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!( header.starts_with("latitude,longitude,acquisitionDate,acquisitionTime,acquisitionTimestamp,brightness"));
    assert_eq!( lines.count(), 3);

    // exported CSV can be read back through the same field mapping
    let records = odin_firms::fields::parse_feed_csv( &text, None).unwrap();
    let (detections, report) = odin_firms::normalize::normalize_all( &records);
    assert_eq!( report.n_dropped(), 0);
    assert_eq!( detections[1].confidence, Confidence::Nominal);
    assert_eq!( detections[1].acquisition_time.to_string(), "0930");

    let _ = std::fs::remove_file(json_path);
    let _ = std::fs::remove_file(csv_path);
}
