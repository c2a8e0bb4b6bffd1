use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AdjustmentType {
    Initial = 0,
    Match = 1,
    Decay = 2
}

impl TryFrom<i32> for AdjustmentType {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AdjustmentType::Initial),
            1 => Ok(AdjustmentType::Match),
            2 => Ok(AdjustmentType::Decay),
            _ => Err(())
        }
    }
}
