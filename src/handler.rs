//! Request handlers for the two functions.
//!
//! Each handler receives its configuration and external clients already
//! constructed, and maps every outcome to a [`FunctionResponse`]. Failure
//! details from external services are logged here and never returned.

use crate::cleaner::{CleanerConfig, CleanupError, clean_bucket, expiry_cutoff};
use crate::config::{CleanupConfig, ConfigError};
use crate::github::{IssueTracker, IssuesEvent, is_issue_opened_event, post_comment, thanks_comment};
use crate::request::{FunctionRequest, FunctionResponse};
use crate::signature::{SIGNATURE_HEADER, verify_payload};
use crate::storage::{StorageError, StorageService};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde_json::json;

pub const API_KEY_HEADER: &str = "x-appwrite-key";

fn webhook_ok() -> FunctionResponse {
    FunctionResponse::new(200, json!({ "ok": true }))
}

fn webhook_error(status: u16, message: &str) -> FunctionResponse {
    FunctionResponse::new(status, json!({ "ok": false, "error": message }))
}

pub fn webhook_config_error(e: &ConfigError) -> FunctionResponse {
    webhook_error(500, &e.to_string())
}

pub struct WebhookHandler<T> {
    secret: String,
    tracker: T,
}

impl<T: IssueTracker> WebhookHandler<T> {
    pub fn new(secret: impl Into<String>, tracker: T) -> Self {
        Self {
            secret: secret.into(),
            tracker,
        }
    }

    pub async fn handle(&self, request: &FunctionRequest) -> FunctionResponse {
        if !verify_payload(
            self.secret.as_bytes(),
            &request.body,
            request.header(SIGNATURE_HEADER),
        ) {
            error!("Invalid signature");
            return webhook_error(401, "Invalid signature");
        }

        // A signed body that isn't an issues payload is just another event we ignore.
        let event = request
            .body
            .to_json()
            .and_then(|value| IssuesEvent::from_value(&value))
            .unwrap_or_default();

        if !is_issue_opened_event(request, &event) {
            info!("Received non-issue event - ignoring");
            return webhook_ok();
        }

        let comment = thanks_comment(event.author_login());
        match post_comment(
            &self.tracker,
            event.repository.as_ref(),
            event.issue.as_ref(),
            &comment,
        )
        .await
        {
            Ok(_) => webhook_ok(),
            Err(e) => {
                error!("Failed to post comment: {e:#}");
                webhook_error(500, "Failed to post comment")
            }
        }
    }
}

/// Handles a webhook delivery, or reports the configuration problem found at startup.
pub async fn handle_webhook<T: IssueTracker>(
    handler: Result<&WebhookHandler<T>, &ConfigError>,
    request: &FunctionRequest,
) -> FunctionResponse {
    match handler {
        Ok(handler) => handler.handle(request).await,
        Err(e) => webhook_config_error(e),
    }
}

fn cleanup_message(status: u16, message: &str) -> FunctionResponse {
    FunctionResponse::new(status, json!({ "message": message }))
}

fn cleanup_error(status: u16, message: &str) -> FunctionResponse {
    FunctionResponse::new(status, json!({ "error": message }))
}

pub fn cleanup_config_error(e: &ConfigError) -> FunctionResponse {
    cleanup_error(500, &e.to_string())
}

pub struct CleanupHandler<F> {
    config: CleanupConfig,
    cleaner: CleanerConfig,
    connect: F,
}

impl<F, S> CleanupHandler<F>
where
    F: Fn(&str) -> Result<S, StorageError>,
    S: StorageService,
{
    /// `connect` builds a storage client for the API key supplied with each request.
    pub fn new(config: CleanupConfig, connect: F) -> Self {
        Self {
            config,
            cleaner: CleanerConfig::default(),
            connect,
        }
    }

    pub async fn handle(&self, request: &FunctionRequest) -> FunctionResponse {
        self.handle_at(request, Utc::now()).await
    }

    pub async fn handle_at(&self, request: &FunctionRequest, now: DateTime<Utc>) -> FunctionResponse {
        let api_key = match request.header(API_KEY_HEADER) {
            Some(key) if !key.is_empty() => key,
            _ => {
                return cleanup_error(
                    401,
                    &format!("Missing API key in {API_KEY_HEADER} header"),
                );
            }
        };

        let storage = match (self.connect)(api_key) {
            Ok(storage) => storage,
            Err(e) => {
                error!("Error connecting to storage: {e}");
                return cleanup_error(500, "Failed to clean bucket");
            }
        };

        let result = match expiry_cutoff(now, self.config.retention_days.get()) {
            Ok(cutoff) => clean_bucket(&storage, &self.config.bucket_id, cutoff, &self.cleaner).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => cleanup_message(200, "Buckets cleaned"),
            Err(CleanupError::Validation(message)) => cleanup_error(400, &message),
            Err(e) => {
                error!("Error cleaning bucket: {}", e.detail());
                cleanup_error(500, "Failed to clean bucket")
            }
        }
    }
}

pub async fn handle_cleanup<F, S>(
    handler: Result<&CleanupHandler<F>, &ConfigError>,
    request: &FunctionRequest,
) -> FunctionResponse
where
    F: Fn(&str) -> Result<S, StorageError>,
    S: StorageService,
{
    match handler {
        Ok(handler) => handler.handle(request).await,
        Err(e) => cleanup_config_error(e),
    }
}
