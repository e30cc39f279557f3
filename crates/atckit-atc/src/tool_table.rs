//! Static per-tool and toolsetter pickup coordinates
//!
//! Tool numbers: 0 is the NO_TOOL sentinel, 1..=4 are physical rack
//! slots, and MANUAL_CHG (one past the last slot) signals an
//! operator-assisted change. Table index 0 holds the toolsetter slot, so
//! slot indices line up with tool numbers for the physical slots.

use atckit_core::{ConfigError, Position};
use atckit_settings::AtcSpindleConfig;

/// Sentinel: the spindle currently holds no tool
pub const NO_TOOL: u8 = 0;

/// Number of physical rack slots
pub const TOOL_COUNT: u8 = 4;

/// Sentinel: operator-assisted change via valve toggle only
pub const MANUAL_CHG: u8 = TOOL_COUNT + 1;

/// Table index of the toolsetter (electronic tool setter) slot
pub const ETS_INDEX: u8 = 0;

/// One pickup location plus its measured length offset
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToolSlot {
    /// Pickup/drop location in machine coordinates
    pub mpos: Position,
    /// Measured Z from the toolsetter; meaningful only once a reference
    /// tool has been zeroed
    pub offset_z: f64,
}

/// The parsed rack: toolsetter slot at index 0, rack slots 1..=TOOL_COUNT
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolPositionTable {
    slots: [ToolSlot; TOOL_COUNT as usize + 1],
}

impl ToolPositionTable {
    /// Parse the toolsetter and every rack slot position from config
    ///
    /// Each position list must have exactly 3 coordinates; any violation
    /// aborts with the offending key.
    pub fn from_config(config: &AtcSpindleConfig) -> Result<Self, ConfigError> {
        let mut slots = [ToolSlot::default(); TOOL_COUNT as usize + 1];

        slots[ETS_INDEX as usize].mpos = parse_triple("ets_mpos_mm", &config.ets_mpos_mm)?;
        for (i, (key, mpos)) in config.tool_mpos().into_iter().enumerate() {
            slots[i + 1].mpos = parse_triple(key, mpos)?;
        }

        Ok(Self { slots })
    }

    /// The toolsetter slot
    pub fn ets(&self) -> &ToolSlot {
        &self.slots[ETS_INDEX as usize]
    }

    /// Slot for a tool number (0 = toolsetter slot, 1..=TOOL_COUNT = rack)
    pub fn slot(&self, tool_num: u8) -> &ToolSlot {
        debug_assert!(tool_num <= TOOL_COUNT, "tool number out of table: {tool_num}");
        &self.slots[tool_num as usize]
    }

    /// Mutable slot access, same indexing as `slot`
    pub fn slot_mut(&mut self, tool_num: u8) -> &mut ToolSlot {
        debug_assert!(tool_num <= TOOL_COUNT, "tool number out of table: {tool_num}");
        &mut self.slots[tool_num as usize]
    }
}

fn parse_triple(key: &str, mpos: &[f64]) -> Result<Position, ConfigError> {
    if mpos.len() != 3 {
        return Err(ConfigError::BadPositionList {
            key: key.to_string(),
            len: mpos.len(),
        });
    }
    Ok(Position::new(mpos[0], mpos[1], mpos[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_config_triples() {
        let config = AtcSpindleConfig::default();
        let table = ToolPositionTable::from_config(&config).unwrap();

        assert_eq!(table.ets().mpos, Position::new(157.0, 142.0, -31.0));
        assert_eq!(table.slot(1).mpos, Position::new(197.0, 142.0, -26.0));
        assert_eq!(table.slot(4).mpos, Position::new(317.0, 142.0, -26.0));
    }

    #[test]
    fn test_bad_arity_names_the_key() {
        let config = AtcSpindleConfig {
            tool2_mpos_mm: vec![237.0],
            ..Default::default()
        };
        assert_eq!(
            ToolPositionTable::from_config(&config),
            Err(ConfigError::BadPositionList {
                key: "tool2_mpos_mm".to_string(),
                len: 1,
            })
        );
    }

    #[test]
    fn test_offsets_default_to_zero() {
        let table = ToolPositionTable::from_config(&AtcSpindleConfig::default()).unwrap();
        assert_eq!(table.slot(3).offset_z, 0.0);
    }
}
