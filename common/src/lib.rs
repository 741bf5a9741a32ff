pub mod config;
pub mod error;
pub mod plug;
pub mod policy;
pub mod reader;
pub mod reading;
pub mod schedule;
pub mod window;

pub use config::{ControllerConfig, SensorConfig};
pub use error::{ConfigError, Interrupted, PlugError, RunError, SensorError, WindowError};
pub use plug::{PlugActuator, PlugStatus};
pub use policy::{PlugCommand, Thresholds};
pub use reader::{Pause, RetryPolicy, SensorData, SensorSource, TemperatureReader};
pub use reading::{celsius_to_fahrenheit, TemperatureReading};
pub use schedule::{ActuationResult, Schedule, ScheduleRunner, ThermostatEntry};
pub use window::HourWindow;
