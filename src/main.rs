use atckit::{init_logging, session, BUILD_DATE, VERSION};
use std::path::PathBuf;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging()?;
    info!("ATCKit {VERSION} (built {BUILD_DATE})");

    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // A fatal session error restarts the control loop once; a second
    // consecutive failure stalls instead of crash-looping, which could
    // leave the valve in an unsafe state.
    let mut tries = 0u32;
    loop {
        match session::run_once(config_path.as_deref()).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tries += 1;
                error!("Critical error in run cycle: {e:#}");
                if tries >= 2 {
                    error!("Stalling due to too many failures");
                    std::future::pending::<()>().await;
                }
                info!("Restarting control session");
            }
        }
    }
}
