use std::time::Duration;

use rama::{
    http::{
        Request, Response, StatusCode,
        header::AUTHORIZATION,
        service::web::response::{IntoResponse, Json},
    },
    telemetry::tracing,
};
use serde_json::json;

use super::{
    behavior::{Behavior, BehaviorStore, ChaosMode},
    recorder::{NO_RESPONSE_STATUS, RequestDescriptor, RequestLog},
};
use crate::http::multipart;

const TIMEOUT_NOTE: &str = "timeout (no response sent)";
const ACCEPTED_MESSAGE: &str = "PDF received";

/// What an upload request is answered with, decided by the [`Behavior`]
/// active when the request started to be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Accept the upload.
    Accept,
    /// Answer with an error status and message.
    Fail { status: u16, message: String },
    /// Never answer.
    Hang,
}

impl UploadOutcome {
    pub fn from_behavior(behavior: &Behavior) -> Self {
        match behavior.mode {
            ChaosMode::Normal => UploadOutcome::Accept,
            ChaosMode::Error => UploadOutcome::Fail {
                status: behavior.error_code,
                message: behavior.effective_error_message(),
            },
            ChaosMode::Timeout => UploadOutcome::Hang,
        }
    }

    /// Status as recorded in the request log.
    pub fn response_status(&self) -> u16 {
        match self {
            UploadOutcome::Accept => StatusCode::OK.as_u16(),
            UploadOutcome::Fail { status, .. } => *status,
            UploadOutcome::Hang => NO_RESPONSE_STATUS,
        }
    }

    pub fn note(&self) -> Option<String> {
        match self {
            UploadOutcome::Accept => None,
            UploadOutcome::Fail { message, .. } => Some(format!("chaos: {message}")),
            UploadOutcome::Hang => Some(TIMEOUT_NOTE.to_owned()),
        }
    }
}

/// Answers upload requests according to the shared [`BehaviorStore`],
/// recording every request in the shared [`RequestLog`].
///
/// The same responder is bound to all configured upload routes.
#[derive(Debug, Clone)]
pub struct UploadResponder {
    behavior: BehaviorStore,
    log: RequestLog,
}

impl UploadResponder {
    pub fn new(behavior: BehaviorStore, log: RequestLog) -> Self {
        Self { behavior, log }
    }

    /// Handle a single upload request.
    ///
    /// In [`ChaosMode::Timeout`] the returned future never resolves,
    /// it is up to the client to give up on the request.
    pub async fn respond(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();

        let has_auth = parts.headers.contains_key(AUTHORIZATION);
        let attachment = multipart::read_attachment(&parts.headers, body).await;
        let descriptor = RequestDescriptor {
            method: parts.method.to_string(),
            path: parts.uri.path().to_owned(),
            attachment,
            has_auth,
        };

        // read once: changes made while delaying only affect later requests
        let behavior = self.behavior.get();
        if behavior.delay_ms > 0 {
            tracing::debug!(
                "delay upload request {} {} with {}ms",
                descriptor.method,
                descriptor.path,
                behavior.delay_ms
            );
            tokio::time::sleep(Duration::from_millis(behavior.delay_ms)).await;
        }

        let outcome = UploadOutcome::from_behavior(&behavior);
        let file_name = descriptor
            .attachment
            .as_ref()
            .map(|attachment| attachment.file_name.clone());

        let entry = self
            .log
            .record(descriptor, outcome.response_status(), outcome.note());
        tracing::info!(
            id = %entry.id,
            method = %entry.method,
            path = %entry.path,
            file_name = ?entry.file_name,
            has_auth = entry.has_auth,
            status = entry.response_status,
            "upload request recorded (mode: {})",
            behavior.mode,
        );

        match outcome {
            UploadOutcome::Accept => Json(json!({
                "ok": true,
                "message": ACCEPTED_MESSAGE,
                "filename": file_name,
            }))
            .into_response(),
            UploadOutcome::Fail { status, message } => {
                let status = StatusCode::from_u16(status).unwrap_or_else(|err| {
                    tracing::warn!("invalid chaos error code {status}: {err}; use 500 instead");
                    StatusCode::INTERNAL_SERVER_ERROR
                });
                (status, Json(json!({ "error": message }))).into_response()
            }
            UploadOutcome::Hang => {
                tracing::debug!("upload request {} left unanswered", entry.id);
                std::future::pending().await
            }
        }
    }
}
