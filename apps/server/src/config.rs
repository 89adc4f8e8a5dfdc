// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.
//!
//! Cleaning defaults live in [`covclean_processing::Settings`]; this only
//! covers the HTTP side.

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum number of features accepted in one clean request.
    pub max_features: usize,
    /// Maximum request body size in MB.
    pub max_body_mb: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .unwrap_or(8080),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()
                .unwrap_or(300),
            max_features: std::env::var("MAX_FEATURES")
                .unwrap_or_else(|_| "100000".into())
                .parse()
                .unwrap_or(100_000),
            max_body_mb: std::env::var("MAX_BODY_MB")
                .unwrap_or_else(|_| "256".into())
                .parse()
                .unwrap_or(256),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
