use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{Error, InternalResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Log every dispatched operation at debug level.
    #[serde(default)]
    pub trace_ops: bool,

    /// Period used by the tokio timer service to emulate per-frame
    /// callbacks. Hosts with a real frame clock supply their own
    /// [`TimerService`](crate::host::TimerService).
    #[serde(default = "default_frame_interval", with = "duration_ms")]
    pub frame_interval: Duration,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            trace_ops: false,
            frame_interval: default_frame_interval(),
        }
    }
}

impl InterpreterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        let file = File::open(path).map_err(|e| Error::Config(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::Config(e.to_string()))
    }
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(16)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
