use std::fmt;

use crate::{error::PlugError, policy::PlugCommand};

/// Status reported by a plug backend. Logged, never used for decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlugStatus {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl PlugStatus {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            output: output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl fmt::Display for PlugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "exit {code}")?,
            None => write!(f, "terminated by signal")?,
        }
        let output = self.output.trim();
        if !output.is_empty() {
            write!(f, ": {output}")?;
        }
        Ok(())
    }
}

/// Smart plug control surface.
pub trait PlugActuator {
    fn set_state(&mut self, alias: &str, command: PlugCommand) -> Result<PlugStatus, PlugError>;

    fn query_state(&mut self, alias: &str) -> Result<PlugStatus, PlugError>;
}
