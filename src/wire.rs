//! JSON request and response types for serving graphs over HTTP.
//!
//! Field names are camelCase on the wire:
//!
//! ```text
//! request:  { "function": "sin(x)", "minX": -10, "maxX": 10, "points": 100 }
//! response: { "points": [{ "x": .., "y": .. }, ..], "success": true, "error": null }
//! ```
//!
//! Missing `minX`, `maxX` and `points` take the defaults shown above. A failed
//! response maps to HTTP 400, a successful one to 200.

use serde::{Deserialize, Serialize};

use crate::errors::RequestError;
use crate::sampler::{Point, SampleRequest, SampleResult, Sampler};

fn default_min_x() -> f64 {
    -10.0
}

fn default_max_x() -> f64 {
    10.0
}

fn default_points() -> i64 {
    100
}

/// Body of a graph request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRequest {
    #[serde(default)]
    pub function: String,
    #[serde(default = "default_min_x")]
    pub min_x: f64,
    #[serde(default = "default_max_x")]
    pub max_x: f64,
    #[serde(default = "default_points")]
    pub points: i64,
}

impl Default for GraphRequest {
    fn default() -> Self {
        Self {
            function: String::new(),
            min_x: default_min_x(),
            max_x: default_max_x(),
            points: default_points(),
        }
    }
}

impl GraphRequest {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            ..Self::default()
        }
    }

    /// Parses a request body.
    pub fn from_json(body: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Checks the fields that can be rejected without compiling.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.function.trim().is_empty() {
            return Err(RequestError::MissingFunction);
        }
        // the width must be finite too: [-1e308, 1e308] overflows
        if !self.min_x.is_finite()
            || !self.max_x.is_finite()
            || !(self.max_x - self.min_x).is_finite()
        {
            return Err(RequestError::InvalidRange {
                min_x: self.min_x,
                max_x: self.max_x,
            });
        }
        if self.points < 1 {
            return Err(RequestError::InvalidPointCount(self.points));
        }
        Ok(())
    }

    /// Validates and converts into a sampler request.
    pub fn to_sample_request(&self) -> Result<SampleRequest, RequestError> {
        self.validate()?;
        Ok(SampleRequest {
            expression: self.function.clone(),
            min_x: self.min_x,
            max_x: self.max_x,
            // the cap applies later anyway
            requested_points: usize::try_from(self.points).unwrap_or(usize::MAX),
        })
    }
}

/// Body of a graph response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphResponse {
    pub points: Vec<Point>,
    pub success: bool,
    pub error: Option<String>,
}

impl GraphResponse {
    pub fn failure(error: &RequestError) -> Self {
        Self {
            points: Vec::new(),
            success: false,
            error: Some(error.to_string()),
        }
    }

    /// HTTP status for this response.
    pub fn status_code(&self) -> u16 {
        if self.success {
            200
        } else {
            400
        }
    }

    pub fn to_json(&self) -> Result<String, RequestError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<SampleResult> for GraphResponse {
    fn from(result: SampleResult) -> Self {
        Self {
            points: result.points,
            success: result.succeeded,
            error: result.error_message,
        }
    }
}

/// Handles one graph request with the default sampler.
pub fn calculate_graph(request: &GraphRequest) -> GraphResponse {
    calculate_graph_with(&Sampler::default(), request)
}

/// Handles one graph request with the given sampler.
pub fn calculate_graph_with(sampler: &Sampler, request: &GraphRequest) -> GraphResponse {
    match request.to_sample_request() {
        Ok(sample_request) => sampler.sample_request(&sample_request).into(),
        Err(e) => {
            log::debug!("rejected graph request: {}", e);
            GraphResponse::failure(&e)
        }
    }
}

/// Parses a JSON body and handles it; malformed bodies become a failed response.
pub fn calculate_graph_json(body: &str) -> GraphResponse {
    match GraphRequest::from_json(body) {
        Ok(request) => calculate_graph(&request),
        Err(e) => GraphResponse::failure(&e),
    }
}
