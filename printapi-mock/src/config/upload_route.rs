use std::{fmt, path::Path, str::FromStr};

use rama::telemetry::tracing;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_UPLOAD_PATH: &str = "/upload";

// served by the control api and panel
const RESERVED_PATHS: &[&str] = &[
    "/",
    "/health",
    "/printapi/ping",
    "/api/behavior",
    "/api/behavior/reset",
    "/api/inbox",
    "/api/inbox/clear",
    "/api/routes",
];

/// Methods the upload responder can be bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UploadMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl UploadMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            UploadMethod::Get => "GET",
            UploadMethod::Post => "POST",
            UploadMethod::Put => "PUT",
            UploadMethod::Patch => "PATCH",
            UploadMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for UploadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMethod(String);

impl fmt::Display for UnsupportedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported upload method '{}'", self.0)
    }
}

impl std::error::Error for UnsupportedMethod {}

impl FromStr for UploadMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(UploadMethod::Get),
            "POST" => Ok(UploadMethod::Post),
            "PUT" => Ok(UploadMethod::Put),
            "PATCH" => Ok(UploadMethod::Patch),
            "DELETE" => Ok(UploadMethod::Delete),
            _ => Err(UnsupportedMethod(s.to_owned())),
        }
    }
}

impl Serialize for UploadMethod {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// The (method, paths) pairs on which the upload responder is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRouteConfig {
    pub method: UploadMethod,
    pub paths: Vec<String>,
}

impl Default for UploadRouteConfig {
    fn default() -> Self {
        Self {
            method: UploadMethod::Post,
            paths: vec![DEFAULT_UPLOAD_PATH.to_owned()],
        }
    }
}

/// Loosely typed shape of the config file,
/// validated field by field in [`UploadRouteConfig::from_json`].
#[derive(Debug, Default, Deserialize)]
struct RawMockConfig {
    #[serde(default)]
    upload: Option<RawUploadConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUploadConfig {
    #[serde(default)]
    method: Option<Value>,
    #[serde(default)]
    path: Option<Value>,
    #[serde(default)]
    paths: Option<Value>,
}

impl UploadRouteConfig {
    /// Load the upload route from the JSON config file at `path`.
    ///
    /// This never fails: a missing or malformed config
    /// falls back to `POST /upload`.
    pub async fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::info!("no config file provided: use default upload route");
            return Self::default();
        };

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                tracing::info!(path = %path.display(), "load upload route config");
                Self::from_json(&content)
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    "failed to read config file; use default upload route: {err}"
                );
                Self::default()
            }
        }
    }

    /// Parse the upload route from the content of a JSON config file.
    pub fn from_json(content: &str) -> Self {
        let raw: RawMockConfig = match serde_json::from_str(content) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("invalid config file; use default upload route: {err}");
                return Self::default();
            }
        };

        let Some(upload) = raw.upload else {
            tracing::warn!("config file has no upload section; use default upload route");
            return Self::default();
        };

        let method = match upload.method {
            None => UploadMethod::default(),
            Some(Value::String(method)) => method.parse().unwrap_or_else(|err| {
                tracing::warn!("{err}; use {} instead", UploadMethod::default());
                UploadMethod::default()
            }),
            Some(other) => {
                tracing::warn!(
                    "upload method has to be a string, got {other}; use {} instead",
                    UploadMethod::default()
                );
                UploadMethod::default()
            }
        };

        let mut paths = Vec::new();
        for path in raw_paths(upload.paths, upload.path) {
            let path = normalize_path(&path);
            if RESERVED_PATHS.contains(&path.as_str()) {
                tracing::warn!("ignore upload path {path}: already served by the control api");
                continue;
            }
            if is_route_pattern(&path) {
                tracing::warn!("ignore upload path {path}: only literal paths are supported");
                continue;
            }
            if !paths.contains(&path) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            tracing::warn!("config file defines no usable upload path; use {DEFAULT_UPLOAD_PATH}");
            paths.push(DEFAULT_UPLOAD_PATH.to_owned());
        }

        Self { method, paths }
    }
}

// `paths` wins over `path` as long as it contains at least one usable path
fn raw_paths(paths: Option<Value>, path: Option<Value>) -> Vec<String> {
    if let Some(Value::Array(values)) = paths {
        let paths: Vec<_> = values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                other => {
                    tracing::warn!("ignore invalid upload path in config: {other}");
                    None
                }
            })
            .collect();
        if !paths.is_empty() {
            return paths;
        }
    }

    match path {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    }
}

// router syntax for captures and wildcards
fn is_route_pattern(path: &str) -> bool {
    path.contains(['{', '}', '*'])
        || path.split('/').any(|segment| segment.starts_with(':'))
}

fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
#[path = "upload_route_tests.rs"]
mod tests;
