use rand::rngs::ThreadRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a plot's measurements were collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    Sensor,
    Drone,
    Manual,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [DataSource::Sensor, DataSource::Drone, DataSource::Manual];

    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Sensor => "Sensor",
            DataSource::Drone => "Drone",
            DataSource::Manual => "Manual",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplies a `Data_Source` for rows that do not name one.
pub trait SourcePolicy {
    fn default_source(&mut self, plot_id: &str) -> DataSource;
}

/// Picks uniformly at random from [`DataSource::ALL`].
///
/// Re-ingesting the same row may therefore store a different source.
pub struct RandomSource<R: Rng = ThreadRng> {
    rng: R,
}

impl RandomSource<ThreadRng> {
    pub fn new() -> Self {
        RandomSource {
            rng: rand::thread_rng(),
        }
    }
}

impl Default for RandomSource<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandomSource<R> {
    pub fn with_rng(rng: R) -> Self {
        RandomSource { rng }
    }
}

impl<R: Rng> SourcePolicy for RandomSource<R> {
    fn default_source(&mut self, _plot_id: &str) -> DataSource {
        DataSource::ALL[self.rng.gen_range(0..DataSource::ALL.len())]
    }
}

/// Always answers with the same source.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub DataSource);

impl SourcePolicy for FixedSource {
    fn default_source(&mut self, _plot_id: &str) -> DataSource {
        self.0
    }
}

impl<P: SourcePolicy + ?Sized> SourcePolicy for &mut P {
    fn default_source(&mut self, plot_id: &str) -> DataSource {
        (**self).default_source(plot_id)
    }
}
