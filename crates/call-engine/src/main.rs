//! Call Engine simulator
//!
//! Replays a JSON script of provider events and host requests through a
//! loopback provider, logging every host event and assignment change.
//!
//! # Usage
//!
//! ```text
//! CALL_ACCESS_TOKEN=... call-engine path/to/script.json
//! ```
//!
//! # Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing and the Prometheus metrics recorder
//! 3. Spawn the engine with a loopback provider
//! 4. Run the script, then shut the engine down
//! 5. Print the final snapshot and rendered metrics

#![warn(clippy::pedantic)]

use anyhow::{anyhow, Context};
use call_engine::actors::{CallEngine, Collaborators};
use call_engine::audio::NullAudioPlatform;
use call_engine::config::Config;
use call_engine::events::{ChannelObserver, HostNotification};
use call_engine::observability::init_metrics_recorder;
use call_engine::sim::{run_script, LoopbackProvider, Script, SimDevices};
use common::secret::SecretString;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| common::config::DEFAULT_LOG_FILTER.into());
    if config.logging.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(?config, "Starting call engine simulator");

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        anyhow!(e)
    })?;

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: call-engine <script.json>"))?;
    let json = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read script {path}"))?;
    let script = Script::from_json(&json).with_context(|| format!("invalid script {path}"))?;

    let token = config
        .access_token
        .clone()
        .unwrap_or_else(|| SecretString::from("loopback"));

    let provider = LoopbackProvider::new();
    let (observer, mut notifications) = ChannelObserver::new(config.event_buffer);
    let cancel_token = CancellationToken::new();
    let (handle, engine_task) = CallEngine::spawn(
        config,
        Collaborators {
            provider: Arc::new(provider.clone()),
            devices: Arc::new(SimDevices::new(true)),
            audio: Box::new(NullAudioPlatform::default()),
            observer: Arc::new(observer),
        },
        cancel_token.clone(),
    );

    let event_log = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            match notification {
                HostNotification::Event(event) => {
                    info!(target: "call.events", event = event.name(), payload = ?event.payload(), "Host event");
                }
                HostNotification::Notice(notice) => {
                    warn!(target: "call.events", message = %notice.message, accept = %notice.accept_label, "Error notice");
                }
            }
        }
    });

    let mut assignments = handle.assignments();
    let assignment_log = tokio::spawn(async move {
        while assignments.changed().await.is_ok() {
            let assignment = assignments.borrow_and_update().clone();
            info!(
                target: "call.sim",
                primary = ?assignment.primary.occupant.as_ref().map(ToString::to_string),
                side = assignment.side.len(),
                "Assignment published"
            );
        }
    });

    let outcome = run_script(&handle, &provider, &script, token).await;
    let final_assignment = handle.assignments().borrow().clone();

    cancel_token.cancel();
    engine_task.await.context("engine task failed")?;
    drop(handle);
    // Both loggers end once the engine's channels close.
    event_log.await.context("event logger failed")?;
    assignment_log.await.context("assignment logger failed")?;

    let snapshot = outcome.map_err(|e| anyhow!("script failed: {e}"))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!("{}", serde_json::to_string_pretty(&final_assignment)?);
    println!("{}", prometheus_handle.render());

    Ok(())
}
