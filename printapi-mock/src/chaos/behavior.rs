use std::{fmt, str::FromStr, sync::Arc};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ERROR_CODE: u16 = 500;

/// How upload requests are answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChaosMode {
    /// Accept the upload with a 200.
    #[default]
    Normal,
    /// Answer with the configured error status.
    Error,
    /// Record the request but never answer it.
    Timeout,
}

impl ChaosMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChaosMode::Normal => "normal",
            ChaosMode::Error => "error",
            ChaosMode::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ChaosMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChaosMode {
    type Err = InvalidMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(ChaosMode::Normal),
            "error" => Ok(ChaosMode::Error),
            "timeout" => Ok(ChaosMode::Timeout),
            _ => Err(InvalidMode),
        }
    }
}

/// Returned when a behavior update names a mode that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMode;

impl fmt::Display for InvalidMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("mode must be normal, error, or timeout")
    }
}

impl std::error::Error for InvalidMode {}

/// The chaos configuration applied to every upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Behavior {
    pub mode: ChaosMode,
    pub error_code: u16,
    pub error_message: Option<String>,
    pub delay_ms: u64,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            mode: ChaosMode::Normal,
            error_code: DEFAULT_ERROR_CODE,
            error_message: None,
            delay_ms: 0,
        }
    }
}

impl Behavior {
    /// Message used for error responses: the explicit override if set,
    /// otherwise the phrase belonging to [`Behavior::error_code`].
    pub fn effective_error_message(&self) -> String {
        match self.error_message.as_deref() {
            Some(message) => message.to_owned(),
            None => status_phrase(self.error_code),
        }
    }
}

/// Reason phrase for the error codes a document service typically returns.
///
/// Codes outside of the table are rendered as `Error <code>`.
pub fn status_phrase(code: u16) -> String {
    let phrase = match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        409 => "Conflict",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return format!("Error {code}"),
    };
    phrase.to_owned()
}

/// Partial behavior update as received from the control api.
///
/// Fields are kept loosely typed so that each one can be coerced on its own,
/// a `null` value is treated the same as a missing field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPatch {
    #[serde(default)]
    pub mode: Option<Value>,
    #[serde(default)]
    pub error_code: Option<Value>,
    #[serde(default)]
    pub error_message: Option<Value>,
    #[serde(default)]
    pub delay_ms: Option<Value>,
}

/// A [`BehaviorPatch`] which passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct BehaviorUpdate {
    mode: Option<ChaosMode>,
    error_code: Option<u16>,
    error_message: Option<Option<String>>,
    delay_ms: Option<u64>,
}

impl BehaviorPatch {
    fn validate(&self) -> Result<BehaviorUpdate, InvalidMode> {
        let mode = match &self.mode {
            None => None,
            Some(Value::String(s)) => Some(s.parse()?),
            Some(_) => return Err(InvalidMode),
        };

        Ok(BehaviorUpdate {
            mode,
            error_code: self.error_code.as_ref().map(coerce_error_code),
            error_message: self.error_message.as_ref().map(coerce_error_message),
            delay_ms: self.delay_ms.as_ref().map(coerce_delay_ms),
        })
    }
}

impl BehaviorUpdate {
    fn apply_to(&self, behavior: &mut Behavior) {
        if let Some(mode) = self.mode {
            behavior.mode = mode;
        }
        if let Some(error_code) = self.error_code {
            behavior.error_code = error_code;
        }
        if let Some(error_message) = &self.error_message {
            behavior.error_message = error_message.clone();
        }
        if let Some(delay_ms) = self.delay_ms {
            behavior.delay_ms = delay_ms;
        }
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    let number: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

// 1xx codes cannot be sent as a final response
fn coerce_error_code(value: &Value) -> u16 {
    value_as_f64(value)
        .map(f64::trunc)
        .filter(|code| (200.0..=999.0).contains(code))
        .map(|code| code as u16)
        .unwrap_or(DEFAULT_ERROR_CODE)
}

fn coerce_delay_ms(value: &Value) -> u64 {
    // saturating float cast, so negative values end up as 0
    value_as_f64(value).map(|ms| ms as u64).unwrap_or_default()
}

fn coerce_error_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Shared handle to the current [`Behavior`].
///
/// Reads are lock free, updates publish a new snapshot.
#[derive(Debug, Clone, Default)]
pub struct BehaviorStore {
    current: Arc<ArcSwap<Behavior>>,
}

impl BehaviorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Behavior {
        Behavior::clone(&self.current.load())
    }

    pub fn mode(&self) -> ChaosMode {
        self.current.load().mode
    }

    /// Apply the fields present in `patch`.
    ///
    /// An invalid mode rejects the entire patch, leaving the current
    /// behavior as it was.
    pub fn set(&self, patch: &BehaviorPatch) -> Result<Behavior, InvalidMode> {
        let update = patch.validate()?;

        let previous = self.current.rcu(|current| {
            let mut next = Behavior::clone(current);
            update.apply_to(&mut next);
            next
        });

        let mut next = Behavior::clone(&previous);
        update.apply_to(&mut next);
        Ok(next)
    }

    pub fn reset(&self) -> Behavior {
        let behavior = Behavior::default();
        self.current.store(Arc::new(behavior.clone()));
        behavior
    }
}

#[cfg(test)]
#[path = "behavior_tests.rs"]
mod tests;
