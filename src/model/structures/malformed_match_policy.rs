use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// What the batch assembler does with a match that fails validation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MalformedMatchPolicy {
    /// Report the match and leave it out of the batch
    #[default]
    Skip,
    /// Abort the whole batch
    Fail
}
