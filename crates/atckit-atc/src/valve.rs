//! Pneumatic valve actuation
//!
//! Owns the gripper valve and the two dust-off valves. The gripper write
//! is gated on the spindle being off; a timed dust-off blast drives a pin
//! high, dwells through the motion executor, and drops it again. Only the
//! toolsetter dust-off is fired during a change; the rack dust-off pin is
//! claimed and reported at init but has no blast step in the choreography.

use atckit_core::{AtcError, MotionCommand, MotionExecutor, OutputPin, PinAddress};
use tracing::error;

/// Duration of one dust-off air blast, seconds
pub const DUSTOFF_SECONDS: f64 = 0.5;

/// Binary actuation of the ATC gripper valve and the dust-off valves
pub struct ValveActuator {
    gripper: Box<dyn OutputPin>,
    rack_dustoff: Box<dyn OutputPin>,
    ets_dustoff: Box<dyn OutputPin>,
}

impl ValveActuator {
    /// Create an actuator from claimed output pins
    pub fn new(
        gripper: Box<dyn OutputPin>,
        rack_dustoff: Box<dyn OutputPin>,
        ets_dustoff: Box<dyn OutputPin>,
    ) -> Self {
        Self {
            gripper,
            rack_dustoff,
            ets_dustoff,
        }
    }

    /// Address of the gripper valve pin
    pub fn gripper_pin(&self) -> &PinAddress {
        self.gripper.address()
    }

    /// Addresses of the rack and toolsetter dust-off pins
    pub fn dustoff_pins(&self) -> (&PinAddress, &PinAddress) {
        (self.rack_dustoff.address(), self.ets_dustoff.address())
    }

    /// Open or close the gripper valve, synchronously
    ///
    /// Refuses without touching the pin if the spindle reports on.
    pub fn set_gripper(&mut self, open: bool, spindle_on: bool) -> Result<(), AtcError> {
        if spindle_on {
            error!("Spindle active when trying to operate ATC");
            return Err(AtcError::Safety {
                reason: "spindle active while operating the ATC valve".to_string(),
            });
        }
        self.gripper.write(open)?;
        Ok(())
    }

    /// Timed air blast at the toolsetter
    pub async fn blast_toolsetter<E>(&mut self, exec: &mut E) -> Result<(), AtcError>
    where
        E: MotionExecutor + ?Sized,
    {
        blast(self.ets_dustoff.as_mut(), exec).await
    }
}

async fn blast<E>(pin: &mut dyn OutputPin, exec: &mut E) -> Result<(), AtcError>
where
    E: MotionExecutor + ?Sized,
{
    pin.write(true)?;
    exec.submit(MotionCommand::Dwell {
        seconds: DUSTOFF_SECONDS,
    })
    .await?;
    pin.write(false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimMachine, SoftPin};
    use atckit_core::MachineStateProvider;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn actuator() -> (ValveActuator, Arc<Mutex<Vec<(String, bool)>>>) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let valve = ValveActuator::new(
            Box::new(SoftPin::new(PinAddress::new("gpio.4"), journal.clone())),
            Box::new(SoftPin::new(PinAddress::new("gpio.16"), journal.clone())),
            Box::new(SoftPin::new(PinAddress::new("gpio.27"), journal.clone())),
        );
        (valve, journal)
    }

    #[test]
    fn test_gripper_refused_while_spindle_on() {
        let (mut valve, journal) = actuator();
        let err = valve.set_gripper(true, true).unwrap_err();
        assert!(err.is_safety());
        assert!(journal.lock().is_empty());
    }

    #[test]
    fn test_gripper_writes_when_spindle_off() {
        let (mut valve, journal) = actuator();
        valve.set_gripper(true, false).unwrap();
        valve.set_gripper(false, false).unwrap();
        assert_eq!(
            *journal.lock(),
            vec![
                ("gpio.4".to_string(), true),
                ("gpio.4".to_string(), false)
            ]
        );
    }

    #[tokio::test]
    async fn test_blast_toggles_pin_around_dwell() {
        let (mut valve, journal) = actuator();
        let mut machine = SimMachine::new();
        valve.blast_toolsetter(&mut machine).await.unwrap();

        assert_eq!(
            *journal.lock(),
            vec![
                ("gpio.27".to_string(), true),
                ("gpio.27".to_string(), false)
            ]
        );
        assert_eq!(
            machine.log(),
            &[MotionCommand::Dwell {
                seconds: DUSTOFF_SECONDS
            }]
        );
        // the blast leaves modal state alone
        assert!(!machine.modal().spindle_on);
    }
}
