//! Livecast console client.

mod commands;
mod config;
mod presenter;
mod simulated;

pub use config::AppConfig;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livecast_permissions::{PermissionGate, PermissionOutcome};
use livecast_rotation::RotationWatch;
use livecast_session::{AudioSourceFactory, SessionController, SessionError};

use commands::{Command, HELP};
use simulated::{ConsolePreview, SimulatedEngine, SimulatedPermissions, SimulatedRotationSensor};

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "livecast=debug,livecast_lib=debug,livecast_ipc=debug,livecast_permissions=debug,livecast_rotation=debug,livecast_session=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Walk the user through rationale prompts until the gate settles.
async fn resolve_permissions(gate: &PermissionGate) -> anyhow::Result<PermissionOutcome> {
    let mut outcome = gate
        .request_permissions()
        .await
        .context("requesting permissions")?;

    loop {
        match outcome {
            PermissionOutcome::NeedsRationale { pending, retry } => {
                println!("(dialog) Livecast needs {pending} to capture and stream.");
                outcome = retry.request().await;
            }
            settled => return Ok(settled),
        }
    }
}

/// Run the client until `quit` or end of input.
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    init_logging();
    info!("Livecast starting");

    let config = AppConfig::load(config_path.as_deref())?;

    let engine = Arc::new(SimulatedEngine::new());
    let controller = Arc::new(SessionController::new(
        engine.clone(),
        config.endpoint.clone(),
    ));
    controller.activate();

    let presenter = tokio::spawn(presenter::run(
        controller.state(),
        controller.subscribe_state(),
        controller.subscribe_errors(),
    ));

    let gate = PermissionGate::new(
        Arc::new(SimulatedPermissions::new()),
        config.permissions.clone(),
    );
    let outcome = resolve_permissions(&gate).await?;

    controller
        .configure(config.session.clone())
        .await
        .context("configuring engine")?;

    match controller
        .bind_capture_sources(&outcome, AudioSourceFactory::Microphone, &config.camera_id)
        .await
    {
        Ok(()) => {}
        Err(SessionError::PermissionDenied { permissions }) => {
            println!("(dialog) Streaming needs {permissions}. Grant them in settings and restart.");
            controller.release().await;
            presenter.abort();
            return Ok(());
        }
        Err(e) => return Err(e).context("binding capture sources"),
    }

    controller
        .bind_preview(Arc::new(ConsolePreview))
        .context("binding preview")?;

    let sensor = Arc::new(SimulatedRotationSensor::new());
    let mut rotation = RotationWatch::new(sensor.clone(), controller.clone());
    rotation.start().context("starting rotation watch")?;

    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(message) => {
                println!("{message}. {HELP}");
                continue;
            }
        };
        debug!(?command, "Console command");

        match command {
            Command::On => {
                // Connecting resolves in the background so `off` can cancel it.
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    match controller.toggle(true).await {
                        Ok(()) | Err(SessionError::ConnectFailed(_)) => {}
                        Err(e) => println!("(toast) {e}"),
                    }
                });
            }
            Command::Off => {
                if let Err(e) = controller.toggle(false).await {
                    warn!(error = %e, "Stop failed");
                }
            }
            Command::Rotate(angle) => sensor.rotate(angle),
            Command::Drop => engine.drop_link(),
            Command::Status => println!("{}", controller.state()),
            Command::Quit => break,
        }
    }

    rotation.stop();
    controller.release().await;
    presenter.abort();

    info!("Livecast stopped");
    Ok(())
}
