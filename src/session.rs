//! Demo control session against the simulated machine
//!
//! Wires configuration, valve pins and the tool-change controller
//! together and exercises one round of automated changes. Stands in for
//! the firmware integration a real deployment supplies.

use anyhow::Context;
use atckit_atc::sim::{sim_valve, SimMachine};
use atckit_atc::AtcController;
use atckit_core::SpindleDriver;
use atckit_settings::AtcSpindleConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Run one control session: init, activate, a few tool changes, deactivate
///
/// With no config path the built-in example rack layout is used. A fatal
/// error latches the machine into the configuration-alarm state before it
/// propagates to the outer loop.
pub async fn run_once(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(p) => AtcSpindleConfig::load_from_file(p)
            .with_context(|| format!("loading ATC config from {}", p.display()))?,
        None => AtcSpindleConfig::default(),
    };

    let machine = SimMachine::shared();
    let (valve, _journal) = sim_valve(&config);
    let mut atc = AtcController::new(Arc::clone(&machine), config, valve);

    if let Err(e) = drive(&mut atc).await {
        warn!("Session failed, latching configuration alarm");
        machine.lock().await.enter_config_alarm();
        return Err(e);
    }
    Ok(())
}

async fn drive(atc: &mut AtcController<SimMachine>) -> anyhow::Result<()> {
    SpindleDriver::init(atc).await?;
    atc.activate().await?;

    for tool in 1..=2u8 {
        atc.tool_change(tool, false).await?;
        info!(tool = atc.current_tool(), "tool change complete");
    }

    // zero the held tool as the Z reference, as an external probe cycle
    // completing would
    atc.probe_notification().await;
    info!(tool = atc.zeroed_tool_index(), "tool zeroed");

    atc.deactivate().await?;
    info!("session complete");
    Ok(())
}
