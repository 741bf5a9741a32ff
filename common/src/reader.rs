use std::{collections::HashMap, time::Duration};

use tracing::{error, info, warn};

use crate::{
    error::{Interrupted, SensorError},
    reading::TemperatureReading,
};

/// Values reported by a sensor for one device in a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorData {
    pub temperature_celsius: f64,
    pub humidity_percent: Option<f64>,
    pub pressure_pa: Option<f64>,
    pub battery_mv: Option<u16>,
}

/// Single-shot query against a sensor transport.
///
/// The returned map is keyed by sensor identifier. It may be empty or miss the
/// requested identifier; the reader treats that as a failed attempt.
pub trait SensorSource {
    fn get_reading(&mut self, sensor_id: &str) -> Result<HashMap<String, SensorData>, SensorError>;
}

/// Blocking wait between failed attempts.
pub trait Pause {
    fn pause(&mut self, duration: Duration) -> Result<(), Interrupted>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            pause: Duration::from_secs(5),
        }
    }
}

pub struct TemperatureReader<S, P> {
    source: S,
    pause: P,
    policy: RetryPolicy,
}

impl<S: SensorSource, P: Pause> TemperatureReader<S, P> {
    pub fn new(source: S, pause: P, policy: RetryPolicy) -> Self {
        Self {
            source,
            pause,
            policy,
        }
    }

    #[cfg(test)]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    #[cfg(test)]
    pub(crate) fn pauser(&self) -> &P {
        &self.pause
    }

    /// Reads the sensor, retrying transient failures up to the attempt budget.
    ///
    /// Only an operator interrupt escapes as an error; every other failure is
    /// folded into [`TemperatureReading::Failed`].
    pub fn read(&mut self, sensor_id: &str) -> Result<TemperatureReading, Interrupted> {
        let attempts = self.policy.attempts.max(1);

        for attempt in 1..=attempts {
            info!("sensor read attempt {attempt}/{attempts} for {sensor_id}");

            match self.read_once(sensor_id) {
                Ok(celsius) => {
                    let reading = TemperatureReading::from_celsius(celsius);
                    if let Some(fahrenheit) = reading.fahrenheit() {
                        info!("temperature in fahrenheit: {fahrenheit:.2}");
                    }
                    return Ok(reading);
                }
                Err(SensorError::Interrupted) => {
                    warn!("sensor read interrupted on attempt {attempt}");
                    return Err(Interrupted);
                }
                Err(err) => warn!("sensor read attempt {attempt} failed: {err}"),
            }

            if attempt < attempts {
                info!("retrying sensor read in {}s", self.policy.pause.as_secs());
                self.pause.pause(self.policy.pause)?;
            }
        }

        error!("all {attempts} sensor read attempts failed for {sensor_id}");
        Ok(TemperatureReading::Failed)
    }

    fn read_once(&mut self, sensor_id: &str) -> Result<f64, SensorError> {
        let snapshot = self.source.get_reading(sensor_id)?;
        let data = snapshot
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(sensor_id))
            .map(|(_, data)| data)
            .ok_or_else(|| SensorError::NoData(sensor_id.to_string()))?;

        if data.temperature_celsius.is_finite() {
            Ok(data.temperature_celsius)
        } else {
            Err(SensorError::Transport(format!(
                "non-finite temperature {}",
                data.temperature_celsius
            )))
        }
    }
}
