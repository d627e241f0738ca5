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
use std::time::Duration;
use thiserror::Error;
use odin_common::{geo::GeoError, net::OdinNetError};

pub type Result<T> = std::result::Result<T, OdinFirmsError>;

#[derive(Error,Debug)]
pub enum OdinFirmsError {

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("csv error {0}")]
    CsvError( #[from] csv::Error),

    #[error("serde error {0}")]
    SerdeError( #[from] serde_json::Error),

    #[error("config parse error {0}")]
    RonError( #[from] ron::error::SpannedError),

    #[error("geojson error {0}")]
    GeoJsonError( #[from] geojson::Error),

    #[error("network error {0}")]
    NetError( #[from] OdinNetError),

    #[error("geo error {0}")]
    GeoError( #[from] GeoError),

    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("malformed feed response: {0}")]
    MalformedFeed(String),

    #[error("source {source_name} exhausted after {attempts} attempts, last error: {last_error}")]
    SourceExhausted { source_name: String, attempts: u32, last_error: String },

    #[error("no usable source: {0}")]
    NoSourceData(String),

    #[error("no records survived normalization ({dropped} dropped)")]
    NoRecords { dropped: usize },

    #[error("run did not complete within {0:?}")]
    Timeout(Duration),

    #[error("operation failed {0}")]
    OpFailedError(String),
}

macro_rules! op_failed {
    ($fmt:literal $(, $arg:expr )* ) => {
        OdinFirmsError::OpFailedError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use op_failed;

macro_rules! config_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        OdinFirmsError::ConfigError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use config_error;
