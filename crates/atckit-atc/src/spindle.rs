//! Base on/off spindle driver
//!
//! Minimal spindle-like device: any non-zero speed is on. Activation and
//! deactivation insert the configured spin-up/spin-down dwells through the
//! executor so callers can rely on the spindle having settled. The ATC
//! controller composes this driver and delegates to it.

use atckit_core::{AtcError, MotionCommand, MotionExecutor, SpindleDriver};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// On/off spindle with spin-up and spin-down delays
pub struct OnOffSpindle<M: MotionExecutor> {
    machine: Arc<Mutex<M>>,
    spinup_ms: u64,
    spindown_ms: u64,
}

impl<M: MotionExecutor> OnOffSpindle<M> {
    /// Create a driver over the shared machine handle
    pub fn new(machine: Arc<Mutex<M>>, spinup_ms: u64, spindown_ms: u64) -> Self {
        Self {
            machine,
            spinup_ms,
            spindown_ms,
        }
    }

    /// Configured spin-down delay in milliseconds
    pub fn spindown_ms(&self) -> u64 {
        self.spindown_ms
    }

    async fn submit(&self, cmd: MotionCommand) -> Result<(), AtcError> {
        self.machine.lock().await.submit(cmd).await?;
        Ok(())
    }
}

#[async_trait]
impl<M: MotionExecutor> SpindleDriver for OnOffSpindle<M> {
    async fn init(&mut self) -> Result<(), AtcError> {
        debug!(
            spinup_ms = self.spinup_ms,
            spindown_ms = self.spindown_ms,
            "on/off spindle init"
        );
        Ok(())
    }

    async fn activate(&mut self) -> Result<(), AtcError> {
        self.submit(MotionCommand::SpindleOn).await?;
        self.submit(MotionCommand::Dwell {
            seconds: self.spinup_ms as f64 / 1000.0,
        })
        .await
    }

    async fn deactivate(&mut self) -> Result<(), AtcError> {
        self.submit(MotionCommand::SpindleOff).await?;
        self.submit(MotionCommand::Dwell {
            seconds: self.spindown_ms as f64 / 1000.0,
        })
        .await
    }

    async fn stop(&mut self) -> Result<(), AtcError> {
        self.submit(MotionCommand::SpindleOff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMachine;
    use atckit_core::MachineStateProvider;

    #[tokio::test]
    async fn test_activate_spins_up_then_dwells() {
        let machine = Arc::new(Mutex::new(SimMachine::new()));
        let mut spindle = OnOffSpindle::new(machine.clone(), 3000, 4000);

        spindle.activate().await.unwrap();
        {
            let m = machine.lock().await;
            assert!(m.modal().spindle_on);
            assert_eq!(
                m.log(),
                &[
                    MotionCommand::SpindleOn,
                    MotionCommand::Dwell { seconds: 3.0 }
                ]
            );
        }

        spindle.deactivate().await.unwrap();
        let m = machine.lock().await;
        assert!(!m.modal().spindle_on);
        assert_eq!(
            m.log()[2..],
            [
                MotionCommand::SpindleOff,
                MotionCommand::Dwell { seconds: 4.0 }
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_skips_the_spindown_dwell() {
        let machine = Arc::new(Mutex::new(SimMachine::new()));
        let mut spindle = OnOffSpindle::new(machine.clone(), 3000, 4000);

        spindle.stop().await.unwrap();
        let m = machine.lock().await;
        assert_eq!(m.log(), &[MotionCommand::SpindleOff]);
    }
}
