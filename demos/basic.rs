//! # Example: sensor readings over a wildcard subscription
//!
//! Connects with retry, subscribes to `edgex/events/#`, publishes a few
//! structured readings and one malformed payload, drains the error channel,
//! prints the client info, then disconnects.
//!
//! ```text
//! RUST_LOG=messagebus=debug cargo run --example basic --features memory
//! ```

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use messagebus::{
    BackoffPolicy, Client, ClientConfig, HandlerError, HandlerFn, LogWriter, MemoryTransport,
    MessageEnvelope, Observer, Payload, RetryPolicy, TransportError,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensorData {
    device_id: String,
    sensor_type: String,
    value: f64,
    unit: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = ClientConfig::from_env().unwrap_or_else(|e| {
        println!("[config] {e}, using defaults");
        ClientConfig::default()
    });
    println!("[config] broker {}", cfg.to_bus_config().broker.url());

    let transport = Arc::new(MemoryTransport::new());
    // Simulate a broker that refuses the first connection.
    transport.fail_next_connects(1);

    let observers: Vec<Arc<dyn Observer>> = vec![Arc::new(LogWriter::new())];
    let client = Client::builder(cfg)
        .with_observers(observers)
        .build(transport.clone())?;

    let retry = RetryPolicy::new(
        5,
        BackoffPolicy::exponential(Duration::from_millis(200), Duration::from_secs(2)),
    );
    client.connect_with_retry(&retry).await?;

    let readings = HandlerFn::arc(|topic: String, env: MessageEnvelope| async move {
        let data: SensorData = env.decode_json()?;
        if data.value.is_nan() {
            return Err(HandlerError::fail("NaN reading"));
        }
        println!(
            "[handler] {topic}: {} {} = {}{}",
            data.device_id, data.sensor_type, data.value, data.unit
        );
        Ok::<(), HandlerError>(())
    });
    client.subscribe(["edgex/events/#"], readings).await?;

    for (device, kind, value, unit) in [
        ("sensor01", "temperature", 21.5, "C"),
        ("sensor02", "humidity", 48.0, "%"),
        ("sensor03", "pressure", 1013.2, "hPa"),
    ] {
        let reading = SensorData {
            device_id: device.into(),
            sensor_type: kind.into(),
            value,
            unit: unit.into(),
        };
        let topic = format!("edgex/events/device/{device}");
        client.publish(&topic, Payload::structured(&reading)?).await?;
    }

    // Not JSON: the handler fails, the subscription keeps going.
    client.publish("edgex/events/device/broken", "not json").await?;

    // Asynchronous provider failures land on the shared error channel.
    transport.inject_error(TransportError::Io {
        error: "link flapped".into(),
    });

    tokio::time::sleep(Duration::from_millis(200)).await;

    let errors = client.error_channel();
    while let Some(err) = errors.try_recv() {
        println!("[errors] {err}");
    }

    client.health_check()?;
    println!("[info] {:?}", client.client_info().to_map());
    println!("[version] {}", messagebus::version());

    client.disconnect().await?;
    println!("[main] disconnected");
    Ok(())
}
