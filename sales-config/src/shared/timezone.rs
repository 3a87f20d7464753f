use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_utc_offset_hours() -> i32 {
    TimezoneConfig::SAO_PAULO_UTC_OFFSET_HOURS
}

/// Wall-clock offset used for the run date, `created_at` stamps and log timestamps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimezoneConfig {
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl TimezoneConfig {
    /// São Paulo has observed UTC-3 all year since daylight saving time was abolished in 2019.
    pub const SAO_PAULO_UTC_OFFSET_HOURS: i32 = -3;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(ValidationError::UtcOffsetOutOfRange(self.utc_offset_hours));
        }

        Ok(())
    }
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}
