pub mod config;
pub mod connectivity;
pub mod controller;
pub mod device;
pub mod error;
pub mod hardware;
pub mod mqtt;

#[cfg(test)]
mod testing;

use std::rc::Rc;

use color_eyre::{eyre::eyre, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::SwitchConfig;
use crate::connectivity::network::SysfsNetwork;
use crate::controller::update::NoUpdates;
use crate::controller::{ControllerSettings, LoopExit, SwitchController, SwitchParts};
use crate::error::SwitchError;
use crate::hardware::gpio::Board;
use crate::hardware::system::{restart_process, SystemClock};
use crate::mqtt::broker::MqttBroker;
use crate::mqtt::topics::Identity;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = SwitchConfig::embedded()?;
    info!(
        "Loaded configuration for '{}' (broker {}:{})",
        config.device.name, config.broker.host, config.broker.port
    );

    let shutdown = CancellationToken::new();
    let loop_token = shutdown.clone();

    // The controller is built from Rc and boxed trait objects, so it lives and dies on the
    // blocking thread.
    let mut control_loop =
        tokio::task::spawn_blocking(move || run_switch(&config, &loop_token));

    let outcome = tokio::select! {
        outcome = &mut control_loop => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, stopping control loop");
            shutdown.cancel();
            control_loop.await
        }
    };

    match outcome.map_err(SwitchError::from)?? {
        LoopExit::Shutdown => {
            info!("Switch stopped");
            Ok(())
        }
        LoopExit::Restart(reason) => {
            warn!("Restarting process: {}", reason);
            let e = restart_process();
            Err(eyre!("Restart after '{}' failed: {}", reason, e))
        }
    }
}

fn run_switch(
    config: &SwitchConfig,
    shutdown: &CancellationToken,
) -> Result<LoopExit, SwitchError> {
    let identity = Identity::from_device_name(&config.device.name);
    let board = Board::open(&config.gpio)?;

    let parts = SwitchParts {
        clock: Rc::new(SystemClock::start()),
        relay: Box::new(board.relay),
        led: Box::new(board.led),
        button: Box::new(board.button),
        network: Box::new(SysfsNetwork::new(&config.network, &config.broker)),
        broker: Box::new(MqttBroker::new(identity.host_name(), &config.broker)),
        updates: Box::new(NoUpdates),
    };

    let mut controller =
        SwitchController::create(identity, ControllerSettings::from_config(config), parts).boot();
    Ok(controller.run(shutdown))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let directives = std::env::var("RUST_LOG").unwrap_or_default();
    FmtSubscriber::builder()
        .with_env_filter(log_filter(&directives))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// `RUST_LOG` directives, falling back to `info` when they do not parse
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|e| {
        eprintln!("Ignoring RUST_LOG '{}': {}", directives, e);
        EnvFilter::new("info")
    })
}
