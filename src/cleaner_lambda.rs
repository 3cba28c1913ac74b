use lambda_runtime::{LambdaEvent, service_fn};
use log::{error, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::error::Error;
use webhook_gc::config::{CleanupConfig, ConfigError, StorageEndpoint};
use webhook_gc::handler::{CleanupHandler, handle_cleanup};
use webhook_gc::request::{FunctionRequest, Payload};
use webhook_gc::storage::{AppwriteStorage, StorageError};
use webhook_gc::{APP_NAME, set_up_logger};

type LambdaError = Box<dyn Error + Send + Sync + 'static>;

/// Scheduled invocations carry the same headers an HTTP call would.
#[derive(Debug, Default, Deserialize)]
struct ScheduledInvocation {
    #[serde(default)]
    headers: HashMap<String, Value>,
}

/// Keeps string headers, and the first string of a multi-value header.
fn request_from_event(payload: Value) -> FunctionRequest {
    let invocation = match serde_json::from_value::<ScheduledInvocation>(payload) {
        Ok(invocation) => invocation,
        Err(e) => {
            warn!("Failed to decode invocation headers: {e}");
            ScheduledInvocation::default()
        }
    };

    let headers = invocation
        .headers
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(value) => Some((name, value)),
            Value::Array(values) => values
                .into_iter()
                .find_map(|v| v.as_str().map(str::to_string))
                .map(|value| (name, value)),
            _ => None,
        });

    FunctionRequest::new(headers, Payload::Empty)
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    set_up_logger(APP_NAME, module_path!(), false)?;

    let handler = build_handler();
    if let Err(e) = &handler {
        error!("Cleanup function is not configured: {e}");
    }

    let func = service_fn(|event: LambdaEvent<Value>| {
        let handler = &handler;
        async move { function(handler.as_ref(), event).await }
    });
    lambda_runtime::run(func).await?;
    Ok(())
}

fn build_handler()
-> Result<CleanupHandler<impl Fn(&str) -> Result<AppwriteStorage, StorageError>>, ConfigError> {
    let config = CleanupConfig::from_env()?;
    let endpoint = StorageEndpoint::from_env()?;

    Ok(CleanupHandler::new(config, move |api_key: &str| {
        AppwriteStorage::new(&endpoint, api_key)
    }))
}

async fn function<F>(
    handler: Result<&CleanupHandler<F>, &ConfigError>,
    event: LambdaEvent<Value>,
) -> Result<Value, LambdaError>
where
    F: Fn(&str) -> Result<AppwriteStorage, StorageError>,
{
    let request = request_from_event(event.payload);

    let response = handle_cleanup(handler, &request).await;

    Ok(json!({
        "statusCode": response.status,
        "headers": {"content-type": "application/json"},
        "body": response.body_string(),
    }))
}
