use serde::{Deserialize, Serialize};
use tracing::info;

use crate::reading::TemperatureReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlugCommand {
    On,
    Off,
}

impl PlugCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

/// Comfort band bounds in Fahrenheit. `None` disables that side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Thresholds {
    pub temp_min_f: Option<f64>,
    pub temp_max_f: Option<f64>,
}

impl Thresholds {
    pub fn evaluate(&self, reading: TemperatureReading) -> Option<PlugCommand> {
        evaluate(reading, self.temp_min_f, self.temp_max_f)
    }
}

/// Maps a reading onto a plug command.
///
/// Rules run in order and the later one wins:
/// 1. `temp_max` set and the reading failed or is at/above it: `Off`.
/// 2. `temp_min` set and the reading is valid and at/below it: `On`.
///
/// A failed reading therefore switches the plug off when a maximum exists and
/// never switches it on. With `min >= max` both rules can fire and `On` wins.
/// No prior plug state is consulted.
pub fn evaluate(
    reading: TemperatureReading,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
) -> Option<PlugCommand> {
    let mut command = None;

    if let Some(max) = temp_max {
        match reading {
            TemperatureReading::Failed => {
                info!("no valid reading with max {max} configured; proposing off");
                command = Some(PlugCommand::Off);
            }
            TemperatureReading::Valid { fahrenheit } if fahrenheit >= max => {
                info!("reading {fahrenheit} at or above max {max}; proposing off");
                command = Some(PlugCommand::Off);
            }
            TemperatureReading::Valid { .. } => {}
        }
    }

    if let (Some(min), Some(fahrenheit)) = (temp_min, reading.fahrenheit()) {
        if fahrenheit <= min {
            info!("reading {fahrenheit} at or below min {min}; proposing on");
            command = Some(PlugCommand::On);
        }
    }

    command
}
