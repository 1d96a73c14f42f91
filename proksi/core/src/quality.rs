use std::time::Duration;

/// Fraction of recent probes that succeeded, in `[0.0, 1.0]`.
pub type Uptime = f64;

/// Empirical reachability measurements for one endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quality {
    #[serde(with = "duration_as_millis")]
    pub latency: Duration,
    pub uptime: Uptime,
}

impl Quality {
    pub fn new(latency: Duration, uptime: Uptime) -> Self {
        Self { latency, uptime }
    }
}

mod duration_as_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
