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
use std::{collections::HashSet, path::{Path, PathBuf}, time::Duration};
use serde::{Serialize,Deserialize};
use tracing::warn;
use odin_common::{datetime::{deserialize_duration, deserialize_optional_duration, serialize_duration, serialize_optional_duration, secs}, geo::GeoRect};

use crate::{Confidence, classify::SeverityThresholds, errors::{OdinFirmsError, Result, config_error}, export::OutputFormat};

/// the WFS GetFeature query for the 24h VIIRS fire layers. "<satellite>" and "<bbox>" get expanded per request,
/// the map key is a path element that precedes this suffix
pub const DEFAULT_WFS_URL_SUFFIX: &str = "?SERVICE=WFS&REQUEST=GetFeature&VERSION=2.0.0&TYPENAME=ms:fires_<satellite>_24hrs&STARTINDEX=0&COUNT=100000&SRSNAME=urn:ogc:def:crs:EPSG::4326&BBOX=<bbox>&outputformat=csv";

fn default_url_suffix()->String { DEFAULT_WFS_URL_SUFFIX.to_string() }

/// top level configuration for a pipeline run
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct FirmsPipelineConfig {
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub severity: SeverityThresholds,

    /// perimeter polygons to scope detections. If not set all detections are kept
    #[serde(default)]
    pub areas: Option<AreaSourceConfig>,

    /// drop detections below this confidence (e.g. `nominal` to ignore `low`)
    #[serde(default)]
    pub min_confidence: Option<Confidence>,

    /// fail the run if any source gets exhausted. Otherwise we only fail if all sources do
    #[serde(default)]
    pub require_all_sources: bool,

    /// fetch sources concurrently. Requests within a source are always sequential
    #[serde(default)]
    pub parallel_sources: bool,

    #[serde(default, deserialize_with="deserialize_optional_duration", serialize_with="serialize_optional_duration")]
    pub run_timeout: Option<Duration>,

    #[serde(default)]
    pub output: Option<OutputConfig>,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub enum SourceConfig {
    Wfs(WfsSourceConfig),
    CsvFile { name: String, path: PathBuf },
}

impl SourceConfig {
    pub fn name (&self) -> &str {
        match self {
            SourceConfig::Wfs(wfs) => wfs.name.as_str(),
            SourceConfig::CsvFile{name,..} => name.as_str()
        }
    }
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct WfsSourceConfig {
    pub name: String,

    /// e.g. "https://firms.modaps.eosdis.nasa.gov/mapserver/wfs/USA"
    pub base_url: String,

    #[serde(default="default_url_suffix")]
    pub url_suffix: String,

    pub bounds: GeoRect,

    /// satellite ids as used in the WFS layer names ("snpp", "noaa20", "noaa21")
    pub satellites: Vec<String>,

    /// either one key for all satellites or (at least) one key per satellite, in satellite order.
    /// Keep these private - they are rate limited
    pub map_keys: Vec<String>,
}

impl WfsSourceConfig {
    /// the map key to use for the satellite at index `idx`, or None if there is no key for it
    pub fn map_key (&self, idx: usize) -> Option<&str> {
        if self.map_keys.len() == 1 { self.map_keys.first() } else { self.map_keys.get(idx) }.map(|k| k.as_str())
    }

    pub fn validate (&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err( config_error!("WFS source without name"))
        }
        if self.satellites.is_empty() {
            return Err( config_error!("source '{}' has no satellites", self.name))
        }
        if self.map_keys.is_empty() {
            return Err( config_error!("source '{}' has no map key", self.name))
        }
        if self.map_keys.len() > 1 {
            let n_sats = self.satellites.len();
            let n_keys = self.map_keys.len();
            if n_keys < n_sats {
                return Err( config_error!("source '{}' has {} map keys for {} satellites", self.name, n_keys, n_sats))
            }
            if n_keys > n_sats {
                warn!(source=%self.name, n_keys, n_sats, "ignoring extra map keys");
            }
        }
        if !self.url_suffix.contains("<satellite>") {
            return Err( config_error!("url_suffix of source '{}' has no <satellite> placeholder", self.name))
        }
        Ok(())
    }
}

/// bounded retry policy for upstream requests
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct RetryConfig {
    /// total number of attempts per request (including the first one)
    pub max_attempts: u32,

    /// delay between failed attempts
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub retry_delay: Duration,

    /// unconditional delay between consecutive requests of the same source
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub request_delay: Duration,
}

impl Default for RetryConfig {
    fn default()->Self {
        RetryConfig { max_attempts: 5, retry_delay: secs(30), request_delay: secs(5) }
    }
}

/// where to get the GeoJSON area-of-interest (perimeter) polygons from
#[derive(Debug,Clone,Serialize,Deserialize)]
pub enum AreaSourceConfig {
    File(PathBuf),
    Url(String),
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
}

impl FirmsPipelineConfig {
    /// check everything we can before doing any network access
    pub fn validate (&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err( config_error!("no sources configured"))
        }

        let mut names: HashSet<&str> = HashSet::new();
        for src in &self.sources {
            if !names.insert( src.name()) {
                return Err( config_error!("duplicated source name '{}'", src.name()))
            }
            if let SourceConfig::Wfs(wfs) = src {
                wfs.validate()?;
            }
        }

        if self.retry.max_attempts < 1 {
            return Err( config_error!("max_attempts has to be at least 1"))
        }

        self.severity.validate()
    }

    /// make relative source and area file paths relative to `base_dir` (the directory of the config file)
    pub fn resolve_paths (&mut self, base_dir: &Path) {
        for src in &mut self.sources {
            if let SourceConfig::CsvFile{path,..} = src {
                resolve_path( path, base_dir);
            }
        }
        if let Some(AreaSourceConfig::File(path)) = &mut self.areas {
            resolve_path( path, base_dir);
        }
    }

    /// the configured output with optional overrides for path and format. None if there is no output path
    pub fn output_with (&self, path: Option<PathBuf>, format: Option<OutputFormat>) -> Option<OutputConfig> {
        let configured = self.output.as_ref();
        let path = path.or_else( || configured.map(|o| o.path.clone()))?;
        let format = format.or_else( || configured.map(|o| o.format)).unwrap_or_default();
        Some( OutputConfig { path, format } )
    }
}

fn resolve_path (path: &mut PathBuf, base_dir: &Path) {
    if path.is_relative() {
        *path = base_dir.join( &*path);
    }
}
