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
///! common utility functions for network operations

use std::time::Duration;
use reqwest::{header::HeaderMap, Client, Url};

use crate::define_error;

define_error!{ pub OdinNetError =
    HttpError( #[from] reqwest::Error ) : "http error: {0}",
    StatusError( String, u16 ) : "request to {0} failed with status {1}",
    InvalidUrl( String ) : "invalid url: {0}"
}

impl OdinNetError {
    /// answer if repeating the same request might succeed. Connection problems, timeouts, error status codes
    /// and truncated bodies are transient, malformed requests are not
    pub fn is_transient (&self)->bool {
        match self {
            OdinNetError::HttpError(e) => !e.is_builder(),
            OdinNetError::StatusError(..) => true,
            OdinNetError::InvalidUrl(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OdinNetError>;

/// a client with a per-request timeout, which turns hung connections into (transient) errors
pub fn client_with_timeout (timeout: Duration) -> Result<Client> {
    Ok( Client::builder().timeout(timeout).build()? )
}

/// retrieve the body of a HTTP GET request as text. Non-success status codes are reported as `StatusError`
/// Note the url is only reported in errors up to the path since query parameters might contain keys
pub async fn get_text (client: &Client, url: &str, opt_headers: &Option<HeaderMap>) -> Result<String> {
    let parsed = Url::parse(url).map_err( |e| OdinNetError::InvalidUrl( format!("{}: {e}", strip_query(url))))?;

    let mut req = client.get(parsed);
    if let Some(headermap) = &opt_headers {
        req = req.headers(headermap.clone())
    }

    let response = req.send().await?;
    let status = response.status();

    if status.is_success() {
        Ok( response.text().await? )
    } else {
        Err( OdinNetError::StatusError( strip_query(url).to_string(), status.as_u16()) )
    }
}

pub fn strip_query (url: &str)->&str {
    match url.find('?') {
        Some(idx) => &url[..idx],
        None => url
    }
}
