pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Outcome of one temperature read. A failed read never carries a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureReading {
    Valid { fahrenheit: f64 },
    Failed,
}

impl TemperatureReading {
    pub fn from_celsius(celsius: f64) -> Self {
        Self::Valid {
            fahrenheit: celsius_to_fahrenheit(celsius),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn fahrenheit(&self) -> Option<f64> {
        match self {
            Self::Valid { fahrenheit } => Some(*fahrenheit),
            Self::Failed => None,
        }
    }
}
