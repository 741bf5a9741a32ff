use std::{process::Output, sync::Arc};

use thermostat_common::{PlugActuator, PlugCommand, PlugError, PlugStatus};
use thermostat_sensor::InterruptSignal;
use tokio::{process::Command, runtime::Runtime};
use tracing::{debug, warn};

/// Drives a Kasa smart plug through the `kasa` command line tool.
///
/// Arguments are passed directly to the process, never through a shell. A
/// raised interrupt kills the running tool and fails the call.
pub struct KasaCli {
    program: String,
    runtime: Arc<Runtime>,
    interrupt: InterruptSignal,
}

impl KasaCli {
    pub fn new(program: impl Into<String>, runtime: Arc<Runtime>, interrupt: InterruptSignal) -> Self {
        Self {
            program: program.into(),
            runtime,
            interrupt,
        }
    }

    fn args(alias: &str, command: Option<PlugCommand>) -> Vec<String> {
        let mut args = vec!["--alias".to_string(), alias.to_string(), "--plug".to_string()];
        if let Some(command) = command {
            args.push(command.as_str().to_string());
        }
        args
    }

    fn execute(&self, args: Vec<String>) -> Result<PlugStatus, PlugError> {
        debug!("running {} {}", self.program, args.join(" "));
        let mut command = Command::new(&self.program);
        command.args(&args).kill_on_drop(true);

        let output = self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = self.interrupt.raised() => {
                    warn!("interrupted; abandoning `{}`", self.program);
                    Err(PlugError::Interrupted)
                }
                output = command.output() => output.map_err(|source| PlugError::Spawn {
                    program: self.program.clone(),
                    source,
                }),
            }
        })?;
        Ok(status_from_output(output))
    }
}

impl PlugActuator for KasaCli {
    fn set_state(&mut self, alias: &str, command: PlugCommand) -> Result<PlugStatus, PlugError> {
        self.execute(Self::args(alias, Some(command)))
    }

    fn query_state(&mut self, alias: &str) -> Result<PlugStatus, PlugError> {
        self.execute(Self::args(alias, None))
    }
}

fn status_from_output(output: Output) -> PlugStatus {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }

    PlugStatus {
        exit_code: output.status.code(),
        output: text,
    }
}
