//! Vacuum exposure. Until atmospherics exist this keeps entities from
//! drifting through space unharmed: unprotected entities take periodic
//! oxygen damage through the injected sink.

/// Damage per exposure tick.
pub const EXPOSURE_DAMAGE: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub eva_capable: bool,
}

/// Just the slots the exposure check cares about.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inventory {
    pub head: Option<Item>,
    pub suit: Option<Item>,
}

impl Inventory {
    /// Pure query against current inventory state, evaluated every call.
    pub fn is_eva_compatible(&self) -> bool {
        matches!(
            (self.head, self.suit),
            (Some(head), Some(suit)) if head.eva_capable && suit.eva_capable
        )
    }
}

/// Where exposure damage lands; health bookkeeping is outside this crate.
pub trait DamageSink {
    fn apply_oxygen_damage(&mut self, entity_id: u32, amount: u32);
}
