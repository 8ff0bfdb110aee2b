//! # Example: request/response with correlation ids
//!
//! A responder subscribes to `edgex/commands/request`; the caller sends
//! commands with [`Client::request`] and waits on
//! `edgex/commands/response/<correlation id>`.
//!
//! ```text
//! cargo run --example request_response --features memory
//! ```

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use messagebus::{
    Client, ClientConfig, ClientError, HandlerError, HandlerFn, MemoryTransport, MessageEnvelope,
    Payload,
};

const REQUEST_TOPIC: &str = "edgex/commands/request";
const RESPONSE_PREFIX: &str = "edgex/commands/response";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandRequest {
    device_id: String,
    command: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandResponse {
    device_id: String,
    success: bool,
    result: serde_json::Value,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = ClientConfig {
        client_id: "request-response-example".into(),
        ..ClientConfig::default()
    };
    let client = Arc::new(Client::new(cfg, Arc::new(MemoryTransport::new()))?);
    client.connect().await?;

    let weak = Arc::downgrade(&client);
    let responder = HandlerFn::named("responder", move |_topic: String, req: MessageEnvelope| {
        let weak = weak.clone();
        async move {
            let Some(client) = weak.upgrade() else {
                return Ok(());
            };
            let cmd: CommandRequest = req.decode_json()?;
            println!("[responder] {} <- {}", cmd.device_id, cmd.command);

            let body = CommandResponse {
                success: cmd.command == "read",
                result: json!({ "value": 42 }),
                device_id: cmd.device_id,
            };
            let payload = Payload::structured(&body).map_err(|e| HandlerError::fail(e.to_string()))?;
            let resp = MessageEnvelope::response_to(&req, payload)
                .map_err(|e| HandlerError::fail(e.to_string()))?;
            client
                .publish_message_envelope(&format!("{RESPONSE_PREFIX}/{}", req.correlation_id), resp)
                .await
                .map_err(|e| HandlerError::fail(e.to_string()))?;
            Ok::<(), HandlerError>(())
        }
    });
    client
        .subscribe_single(REQUEST_TOPIC, Arc::new(responder))
        .await?;

    for command in ["read", "reset"] {
        let req = CommandRequest {
            device_id: "sensor01".into(),
            command: command.into(),
        };
        let envelope = client.create_message_envelope(Payload::structured(&req)?, "")?;
        let id = envelope.correlation_id.clone();

        let resp = client
            .request(envelope, REQUEST_TOPIC, RESPONSE_PREFIX, Duration::from_secs(2))
            .await?;
        let body: CommandResponse = serde_json::from_slice(&resp.payload)?;
        println!("[caller] {id} -> success={} result={}", body.success, body.result);
    }

    // Nobody answers here.
    let orphan = client.create_message_envelope("ping", "")?;
    match client
        .request(orphan, "edgex/nobody", RESPONSE_PREFIX, Duration::from_millis(300))
        .await
    {
        Err(ClientError::Timeout { timeout }) => println!("[caller] timed out after {timeout:?}"),
        other => println!("[caller] unexpected: {other:?}"),
    }

    client.disconnect().await?;
    Ok(())
}
