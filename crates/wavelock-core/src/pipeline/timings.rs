//! Per-stage wall-clock timings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde helper: `Duration` as fractional seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| serde::de::Error::custom("stage time must be finite and non-negative"))
    }
}

/// Elapsed time of each timed stage, reported in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    /// Compression plus quality evaluation.
    #[serde(with = "duration_secs")]
    pub compression: Duration,
    /// Key derivation, encryption and blob write.
    #[serde(with = "duration_secs")]
    pub encryption: Duration,
    /// Embedding (including any retry) and the size audit.
    #[serde(with = "duration_secs")]
    pub metadata_embedding: Duration,
    #[serde(with = "duration_secs")]
    pub upload: Duration,
    #[serde(with = "duration_secs")]
    pub overall: Duration,
}
