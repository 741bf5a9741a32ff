use thermostat_common::{PlugActuator, PlugCommand, PlugError, PlugStatus};
use tracing::info;

/// Logs plug commands without sending them anywhere.
#[derive(Debug, Default)]
pub struct DryRunPlug;

impl PlugActuator for DryRunPlug {
    fn set_state(&mut self, alias: &str, command: PlugCommand) -> Result<PlugStatus, PlugError> {
        info!("dry run: would turn {} `{alias}`", command.as_str());
        Ok(PlugStatus::success("dry run"))
    }

    fn query_state(&mut self, alias: &str) -> Result<PlugStatus, PlugError> {
        info!("dry run: would query `{alias}`");
        Ok(PlugStatus::success("dry run"))
    }
}
