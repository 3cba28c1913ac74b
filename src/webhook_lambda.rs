use lambda_http::{Body, Error, Request, Response, run, service_fn};
use log::{error, info};
use webhook_gc::config::{ConfigError, WebhookConfig};
use webhook_gc::github::OctocrabTracker;
use webhook_gc::handler::{WebhookHandler, handle_webhook};
use webhook_gc::request::{FunctionRequest, FunctionResponse, Payload};
use webhook_gc::{APP_NAME, set_up_logger};

#[tokio::main]
async fn main() -> Result<(), Error> {
    set_up_logger(APP_NAME, module_path!(), false)?;

    let handler = build_handler();
    if let Err(e) = &handler {
        error!("Webhook function is not configured: {e}");
    }

    run(service_fn(|event: Request| {
        let handler = &handler;
        async move { function(handler.as_ref(), event).await }
    }))
    .await
}

fn build_handler() -> Result<WebhookHandler<OctocrabTracker>, ConfigError> {
    let config = WebhookConfig::from_env()?;
    let tracker = OctocrabTracker::new(&config.github_token).map_err(|e| ConfigError::Invalid {
        key: webhook_gc::config::GITHUB_TOKEN.to_string(),
        value: e.to_string(),
    })?;

    Ok(WebhookHandler::new(config.webhook_secret, tracker))
}

async fn function(
    handler: Result<&WebhookHandler<OctocrabTracker>, &ConfigError>,
    event: Request,
) -> Result<Response<Body>, Error> {
    let headers = event
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)));

    // The signature covers the bytes as delivered, so the body is never decoded here.
    let body = match event.body().as_ref() {
        [] => Payload::Empty,
        bytes => Payload::Raw(bytes.to_vec()),
    };

    let request = FunctionRequest::new(headers, body);
    let response = handle_webhook(handler, &request).await;
    info!("Webhook handled with status {}", response.status);

    into_http(response)
}

fn into_http(response: FunctionResponse) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(response.status)
        .header("content-type", "application/json")
        .body(Body::Text(response.body_string()))?)
}
