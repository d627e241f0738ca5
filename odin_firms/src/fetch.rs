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
/// retrieval of raw FIRMS feed records.
/// Each WFS source is queried with one GET request per configured satellite, strictly in sequence and with a fixed
/// courtesy delay between requests. Each request has a bounded retry budget with a fixed delay between attempts.
/// Exhausting that budget fails the whole source (we don't return partial sources)

use std::{future::Future, path::Path, sync::Arc, time::Duration};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, error, info, warn};
use odin_common::{geo::GeoRect, net::{self, OdinNetError}};

use crate::{
    AreaSourceConfig, RetryConfig, SourceConfig, WfsSourceConfig,
    area::{AreaOfInterest, parse_areas_geojson},
    errors::{OdinFirmsError, Result, config_error},
    fields::{RawRecord, parse_feed_csv},
};

/* #region transport ********************************************************************************************/

/// the seam between the fetcher and the network, which lets us test retry behavior without servers
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn get_text (&self, url: &str) -> std::result::Result<String,OdinNetError>;
}

pub struct HttpTransport {
    client: Client
}

impl HttpTransport {
    /// per-request timeout. Note this is independent of the optional overall run timeout
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new (request_timeout: Duration) -> Result<Self> {
        let client = net::client_with_timeout( request_timeout)?;
        Ok( HttpTransport { client } )
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn get_text (&self, url: &str) -> std::result::Result<String,OdinNetError> {
        net::get_text( &self.client, url, &None).await
    }
}

/* #endregion transport */

/* #region retry ************************************************************************************************/

/// the tagged outcome of a single request attempt
#[derive(Debug)]
pub enum Attempt<T> {
    Ok(T),
    Retryable(OdinFirmsError),
    Fatal(OdinFirmsError),
}

impl <T> Attempt<T> {
    /// classify a network result into an attempt outcome
    pub fn from_net (res: std::result::Result<T,OdinNetError>) -> Self {
        match res {
            Ok(v) => Attempt::Ok(v),
            Err(e) if e.is_transient() => Attempt::Retryable( e.into()),
            Err(e) => Attempt::Fatal( e.into())
        }
    }
}

/// run `op` until it succeeds, returns a fatal error, or `max_attempts` is reached, sleeping `retry_delay` between
/// attempts. `op` gets the (1-based) attempt number
pub async fn with_retry<T,F,Fut> (retry: &RetryConfig, label: &str, mut op: F) -> Result<T>
    where F: FnMut(u32)->Fut, Fut: Future<Output=Attempt<T>>
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Attempt::Ok(v) => return Ok(v),
            Attempt::Fatal(e) => {
                error!(%label, attempt, "non-retryable failure: {e}");
                return Err(e)
            }
            Attempt::Retryable(e) => {
                if attempt < max_attempts {
                    warn!(%label, attempt, max_attempts, "attempt failed: {e}, retry in {:?}", retry.retry_delay);
                    tokio::time::sleep( retry.retry_delay).await;
                    attempt += 1;
                } else {
                    error!(%label, attempts=attempt, "giving up: {e}");
                    return Err( OdinFirmsError::SourceExhausted { source_name: label.to_string(), attempts: attempt, last_error: e.to_string() })
                }
            }
        }
    }
}

/* #endregion retry */

/// the raw records of one source/satellite request
#[derive(Debug,Clone)]
pub struct RawBatch {
    pub source: String,
    pub satellite: Option<String>,
    pub records: Vec<RawRecord>,
}

#[derive(Debug)]
pub struct SourceFailure {
    pub source: String,
    pub error: OdinFirmsError,
}

/// what we got from all sources. Only returned if the failure policy allows the run to continue
#[derive(Debug,Default)]
pub struct FetchOutcome {
    pub batches: Vec<RawBatch>,
    pub failures: Vec<SourceFailure>,
}

impl FetchOutcome {
    pub fn n_records (&self) -> usize { self.batches.iter().map(|b| b.records.len()).sum() }

    pub fn records (&self) -> impl Iterator<Item=&RawRecord> {
        self.batches.iter().flat_map(|b| b.records.iter())
    }
}

pub struct Fetcher {
    transport: Arc<dyn FeedTransport>,
    retry: RetryConfig,
    parallel_sources: bool,
    require_all_sources: bool,
}

impl Fetcher {
    pub fn new (transport: Arc<dyn FeedTransport>, retry: RetryConfig) -> Self {
        Fetcher { transport, retry, parallel_sources: false, require_all_sources: false }
    }

    pub fn with_parallel_sources (mut self, parallel: bool) -> Self { self.parallel_sources = parallel; self }

    pub fn with_require_all_sources (mut self, require_all: bool) -> Self { self.require_all_sources = require_all; self }

    /// fetch all sources. This fails if all sources failed, or if any source failed and we require all of them.
    /// Source configuration defects are reported before any request is made
    pub async fn fetch (&self, sources: &[SourceConfig]) -> Result<FetchOutcome> {
        for src in sources {
            validate_source( src)?;
        }

        let results: Vec<(String,Result<Vec<RawBatch>>)> = if self.parallel_sources {
            join_all( sources.iter().map( |src| async move { (src.name().to_string(), self.fetch_validated(src).await) })).await
        } else {
            let mut results = Vec::with_capacity(sources.len());
            for src in sources {
                results.push( (src.name().to_string(), self.fetch_validated(src).await) );
            }
            results
        };

        let mut outcome = FetchOutcome::default();
        for (source, res) in results {
            match res {
                Ok(mut batches) => outcome.batches.append(&mut batches),
                Err(error) => {
                    error!(%source, "source failed: {error}");
                    outcome.failures.push( SourceFailure { source, error })
                }
            }
        }

        if outcome.batches.is_empty() && !outcome.failures.is_empty() {
            return Err( OdinFirmsError::NoSourceData( failure_summary( &outcome.failures)))
        }
        if self.require_all_sources && !outcome.failures.is_empty() {
            return Err( OdinFirmsError::NoSourceData( failure_summary( &outcome.failures)))
        }

        info!(n_batches=outcome.batches.len(), n_records=outcome.n_records(), n_failed=outcome.failures.len(), "fetch complete");
        Ok(outcome)
    }

    pub async fn fetch_source (&self, src: &SourceConfig) -> Result<Vec<RawBatch>> {
        validate_source( src)?;
        self.fetch_validated( src).await
    }

    async fn fetch_validated (&self, src: &SourceConfig) -> Result<Vec<RawBatch>> {
        match src {
            SourceConfig::Wfs(wfs) => self.fetch_wfs( wfs).await,
            SourceConfig::CsvFile{name,path} => Ok( vec![ read_csv_source( name, path).await? ] )
        }
    }

    async fn fetch_wfs (&self, wfs: &WfsSourceConfig) -> Result<Vec<RawBatch>> {
        let mut batches = Vec::with_capacity( wfs.satellites.len());

        for (i,satellite) in wfs.satellites.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep( self.retry.request_delay).await;
            }

            let key = satellite_key( wfs, i)?;
            let url = request_url( wfs, i)?;
            let label = format!("{}/{}", wfs.name, satellite);
            debug!(source=%wfs.name, %satellite, url=%redact( &url, key), "requesting");

            let records = with_retry( &self.retry, &label, |_| {
                let url = url.clone();
                async move {
                    let res = self.transport.get_text( &url).await.map_err( |e| redact_error( e, key));
                    match Attempt::from_net( res) {
                        Attempt::Ok(text) => match parse_feed_csv( &text, Some(satellite)) {
                            Ok(records) => Attempt::Ok(records),
                            Err(e) => Attempt::Retryable(e) // truncated or error payload with success status
                        }
                        Attempt::Retryable(e) => Attempt::Retryable(e),
                        Attempt::Fatal(e) => Attempt::Fatal(e),
                    }
                }
            }).await?;

            info!(source=%wfs.name, %satellite, n_records=records.len(), "retrieved records");
            batches.push( RawBatch { source: wfs.name.clone(), satellite: Some(satellite.clone()), records });
        }

        Ok(batches)
    }

    /// get the area-of-interest perimeters, using the same retry policy for remote sources
    pub async fn fetch_areas (&self, cfg: &AreaSourceConfig) -> Result<Vec<AreaOfInterest>> {
        let text = match cfg {
            AreaSourceConfig::File(path) => tokio::fs::read_to_string(path).await?,
            AreaSourceConfig::Url(url) => {
                with_retry( &self.retry, "areas", |_| async move {
                    Attempt::from_net( self.transport.get_text( url).await)
                }).await?
            }
        };
        parse_areas_geojson( &text)
    }
}

/// locally stored feed exports are read as is. There is nothing to retry here
pub async fn read_csv_source (name: &str, path: &Path) -> Result<RawBatch> {
    let text = tokio::fs::read_to_string(path).await?;
    let records = parse_feed_csv( &text, None)?;
    info!(source=%name, path=?path, n_records=records.len(), "read records from file");

    Ok( RawBatch { source: name.to_string(), satellite: None, records } )
}

/// the WFS request URL for the satellite at index `idx`:
///   <base_url>/<map_key>/<url_suffix with satellite and bbox expanded>
pub fn request_url (wfs: &WfsSourceConfig, idx: usize) -> Result<String> {
    let satellite = wfs.satellites.get(idx).ok_or_else( || config_error!("source '{}' has no satellite #{}", wfs.name, idx))?;
    let suffix = wfs.url_suffix
        .replace("<satellite>", satellite)
        .replace("<bbox>", &bbox_param( &wfs.bounds));

    Ok( format!("{}/{}/{}", wfs.base_url.trim_end_matches('/'), satellite_key( wfs, idx)?, suffix) )
}

fn satellite_key (wfs: &WfsSourceConfig, idx: usize) -> Result<&str> {
    wfs.map_key(idx).ok_or_else( || config_error!("source '{}' has no map key for satellite #{}", wfs.name, idx))
}

fn validate_source (src: &SourceConfig) -> Result<()> {
    match src {
        SourceConfig::Wfs(wfs) => wfs.validate(),
        SourceConfig::CsvFile{..} => Ok(())
    }
}

/// the WFS 2.0 BBOX for EPSG:4326 has latitude first: minLat,minLon,maxLat,maxLon
pub fn bbox_param (bounds: &GeoRect) -> String {
    format!("{},{},{},{}", bounds.south(), bounds.west(), bounds.north(), bounds.east())
}

fn redact (url: &str, key: &str) -> String {
    if key.is_empty() { url.to_string() } else { url.replace(key, "***") }
}

/// map keys are path elements, i.e. they would show up in errors that report the request url
fn redact_error (e: OdinNetError, key: &str) -> OdinNetError {
    match e {
        OdinNetError::StatusError(url,status) => OdinNetError::StatusError( redact( &url, key), status),
        OdinNetError::InvalidUrl(msg) => OdinNetError::InvalidUrl( redact( &msg, key)),
        OdinNetError::HttpError(e) => OdinNetError::HttpError( e.without_url()),
    }
}

fn failure_summary (failures: &[SourceFailure]) -> String {
    failures.iter().map(|f| format!("{}: {}", f.source, f.error)).collect::<Vec<_>>().join("; ")
}
