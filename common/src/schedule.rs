use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    error::{ConfigError, Interrupted, PlugError, RunError},
    plug::PlugActuator,
    policy::{PlugCommand, Thresholds},
    reader::{Pause, SensorSource, TemperatureReader},
    window::HourWindow,
};

/// One time-windowed rule with independent on/off thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermostatEntry {
    #[serde(default)]
    pub temp_min_f: Option<f64>,
    #[serde(default)]
    pub temp_max_f: Option<f64>,
    pub hour_start: u8,
    pub hour_end: u8,
}

impl ThermostatEntry {
    /// Entry active at every hour, used when thresholds come from the command line.
    pub fn always(thresholds: Thresholds) -> Self {
        let window = HourWindow::always();
        Self {
            temp_min_f: thresholds.temp_min_f,
            temp_max_f: thresholds.temp_max_f,
            hour_start: window.hour_start,
            hour_end: window.hour_end,
        }
    }

    pub fn window(&self) -> HourWindow {
        HourWindow {
            hour_start: self.hour_start,
            hour_end: self.hour_end,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            temp_min_f: self.temp_min_f,
            temp_max_f: self.temp_max_f,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        HourWindow::new(self.hour_start, self.hour_end).map_err(|err| err.to_string())?;
        for (name, value) in [("temp_min_f", self.temp_min_f), ("temp_max_f", self.temp_max_f)] {
            if value.is_some_and(|value| !value.is_finite()) {
                return Err(format!("{name} must be a finite number"));
            }
        }
        Ok(())
    }
}

/// Ordered list of entries; the first whose window holds the current hour runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schedule {
    pub entries: Vec<ThermostatEntry>,
}

impl Schedule {
    /// Accepts either a single entry object or an array of entries.
    ///
    /// The document shape is picked from its first token so field-level
    /// errors (missing `hour_start`, wrong types) keep their line and column.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries = if raw.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<ThermostatEntry>>(raw)?
        } else {
            vec![serde_json::from_str::<ThermostatEntry>(raw)?]
        };
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let schedule = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, entry) in self.entries.iter().enumerate() {
            entry
                .validate()
                .map_err(|reason| ConfigError::Invalid(format!("schedule entry {index}: {reason}")))?;
        }
        Ok(())
    }
}

/// Outcome of one evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuationResult {
    pub entry_index: usize,
    pub temperature_f: Option<f64>,
    pub command: Option<PlugCommand>,
}

pub struct ScheduleRunner<S, P, A> {
    reader: TemperatureReader<S, P>,
    plug: A,
    interrupted: Box<dyn Fn() -> bool>,
}

impl<S: SensorSource, P: Pause, A: PlugActuator> ScheduleRunner<S, P, A> {
    pub fn new(reader: TemperatureReader<S, P>, plug: A) -> Self {
        Self {
            reader,
            plug,
            interrupted: Box::new(|| false),
        }
    }

    /// Polled around every plug call so an interrupt that lands while the
    /// plug is being driven still aborts the run.
    pub fn with_interrupt_check(mut self, interrupted: impl Fn() -> bool + 'static) -> Self {
        self.interrupted = Box::new(interrupted);
        self
    }

    #[cfg(test)]
    pub(crate) fn reader(&self) -> &TemperatureReader<S, P> {
        &self.reader
    }

    #[cfg(test)]
    pub(crate) fn plug(&self) -> &A {
        &self.plug
    }

    fn check_interrupt(&self) -> Result<(), Interrupted> {
        if (self.interrupted)() {
            warn!("interrupt pending; aborting before further plug commands");
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Runs the first entry whose window contains `current_hour`.
    ///
    /// Returns `Ok(None)` without touching the sensor or plug when nothing
    /// matches. Plug failures are logged and do not fail the run.
    pub fn run(
        &mut self,
        entries: &[ThermostatEntry],
        sensor_id: &str,
        plug_alias: &str,
        current_hour: u8,
    ) -> Result<Option<ActuationResult>, RunError> {
        for (index, entry) in entries.iter().enumerate() {
            if !entry.window().contains(current_hour)? {
                continue;
            }

            let window = entry.window();
            info!(
                "schedule entry {index} ({}..{}{}) matches hour {current_hour}",
                window.hour_start,
                window.hour_end,
                if window.wraps_midnight() { ", wraps midnight" } else { "" }
            );
            let result = self.evaluate(index, entry, sensor_id, plug_alias)?;
            return Ok(Some(result));
        }

        info!("no schedule entry matches hour {current_hour}");
        Ok(None)
    }

    fn evaluate(
        &mut self,
        index: usize,
        entry: &ThermostatEntry,
        sensor_id: &str,
        plug_alias: &str,
    ) -> Result<ActuationResult, RunError> {
        let thresholds = entry.thresholds();
        info!(
            "running with min max range: {:?} - {:?}",
            thresholds.temp_min_f, thresholds.temp_max_f
        );

        let reading = self.reader.read(sensor_id)?;
        if !reading.is_ok() {
            warn!("no valid temperature; treating as a sensor failure");
        }
        let command = thresholds.evaluate(reading);

        self.check_interrupt()?;
        match command {
            Some(command) => {
                info!("attempting to turn {} `{plug_alias}`", command.as_str());
                match self.plug.set_state(plug_alias, command) {
                    Ok(status) if status.is_success() => info!("plug set_state: {status}"),
                    Ok(status) => warn!("plug set_state reported failure: {status}"),
                    Err(PlugError::Interrupted) => return Err(Interrupted.into()),
                    Err(err) => error!("plug set_state failed: {err}"),
                }
                self.check_interrupt()?;
            }
            None => info!("temperature within range; no plug command"),
        }

        info!("querying plug status at end");
        match self.plug.query_state(plug_alias) {
            Ok(status) => info!("plug status: {status}"),
            Err(PlugError::Interrupted) => return Err(Interrupted.into()),
            Err(err) => warn!("plug status query failed: {err}"),
        }
        self.check_interrupt()?;

        Ok(ActuationResult {
            entry_index: index,
            temperature_f: reading.fahrenheit(),
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, io, rc::Rc};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        error::{Interrupted, PlugError, SensorError, WindowError},
        plug::PlugStatus,
        reader::{
            tests::{snapshot, RecordingPause, ScriptedSensor, SENSOR},
            RetryPolicy,
        },
    };

    const PLUG: &str = "Space Heater";

    #[derive(Default)]
    struct RecordingPlug {
        commands: Vec<(String, PlugCommand)>,
        queries: usize,
        fail_set: bool,
        /// Raised while `set_state` runs, like a Ctrl-C during the plug command.
        interrupt_on_set: Option<Rc<Cell<bool>>>,
    }

    impl PlugActuator for RecordingPlug {
        fn set_state(
            &mut self,
            alias: &str,
            command: PlugCommand,
        ) -> Result<PlugStatus, PlugError> {
            self.commands.push((alias.to_string(), command));
            if let Some(flag) = &self.interrupt_on_set {
                flag.set(true);
            }
            if self.fail_set {
                Err(PlugError::Spawn {
                    program: "kasa".to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
                })
            } else {
                Ok(PlugStatus::success(""))
            }
        }

        fn query_state(&mut self, _alias: &str) -> Result<PlugStatus, PlugError> {
            self.queries += 1;
            Ok(PlugStatus::success("Device state: True"))
        }
    }

    fn runner(
        sensor: ScriptedSensor,
    ) -> ScheduleRunner<ScriptedSensor, RecordingPause, RecordingPlug> {
        ScheduleRunner::new(
            TemperatureReader::new(sensor, RecordingPause::default(), RetryPolicy::default()),
            RecordingPlug::default(),
        )
    }

    fn entry(hour_start: u8, hour_end: u8, min: Option<f64>, max: Option<f64>) -> ThermostatEntry {
        ThermostatEntry {
            temp_min_f: min,
            temp_max_f: max,
            hour_start,
            hour_end,
        }
    }

    #[test]
    fn runs_only_first_matching_entry() {
        let entries = [
            entry(0, 5, Some(80.0), None),
            entry(8, 12, Some(60.0), Some(70.0)),
            entry(9, 10, None, Some(50.0)),
        ];
        // 5C = 41F, below the second entry's min.
        let mut runner = runner(ScriptedSensor::reporting(5.0));

        let result = runner.run(&entries, SENSOR, PLUG, 9).unwrap();

        assert_eq!(
            result,
            Some(ActuationResult {
                entry_index: 1,
                temperature_f: Some(41.0),
                command: Some(PlugCommand::On),
            })
        );
        assert_eq!(runner.reader().source().calls, 1);
        assert_eq!(runner.plug().commands, vec![(PLUG.to_string(), PlugCommand::On)]);
        assert_eq!(runner.plug().queries, 1);
    }

    #[test]
    fn no_match_touches_no_collaborator() {
        let entries = [entry(0, 5, Some(60.0), None), entry(22, 2, None, Some(70.0))];
        let mut runner = runner(ScriptedSensor::reporting(5.0));

        assert_eq!(runner.run(&entries, SENSOR, PLUG, 12).unwrap(), None);
        assert_eq!(runner.reader().source().calls, 0);
        assert!(runner.plug().commands.is_empty());
        assert_eq!(runner.plug().queries, 0);
    }

    #[test]
    fn empty_schedule_does_not_run() {
        let mut runner = runner(ScriptedSensor::reporting(5.0));
        assert_eq!(runner.run(&[], SENSOR, PLUG, 3).unwrap(), None);
        assert_eq!(runner.reader().source().calls, 0);
    }

    #[test]
    fn sensor_failure_forces_off() {
        let entries = [entry(22, 2, Some(60.0), Some(70.0))];
        let mut runner = runner(ScriptedSensor::new(Vec::new()));

        let result = runner.run(&entries, SENSOR, PLUG, 23).unwrap().unwrap();

        assert_eq!(result.temperature_f, None);
        assert_eq!(result.command, Some(PlugCommand::Off));
        assert_eq!(runner.reader().source().calls, 3);
        assert_eq!(runner.reader().pauser().pauses.len(), 2);
        assert_eq!(runner.plug().commands, vec![(PLUG.to_string(), PlugCommand::Off)]);
    }

    #[test]
    fn in_band_reading_only_queries_status() {
        let entries = [entry(0, 0, Some(60.0), Some(70.0))];
        // 18C = 64.4F
        let mut runner = runner(ScriptedSensor::reporting(18.0));

        let result = runner.run(&entries, SENSOR, PLUG, 14).unwrap().unwrap();

        assert_eq!(result.command, None);
        assert!(runner.plug().commands.is_empty());
        assert_eq!(runner.plug().queries, 1);
    }

    #[test]
    fn plug_failure_is_not_fatal() {
        let entries = [entry(0, 0, None, Some(70.0))];
        let mut runner = ScheduleRunner::new(
            TemperatureReader::new(
                ScriptedSensor::reporting(30.0),
                RecordingPause::default(),
                RetryPolicy::default(),
            ),
            RecordingPlug {
                fail_set: true,
                ..Default::default()
            },
        );

        let result = runner.run(&entries, SENSOR, PLUG, 0).unwrap().unwrap();

        assert_eq!(result.command, Some(PlugCommand::Off));
        assert_eq!(runner.plug().queries, 1);
    }

    #[test]
    fn interrupt_propagates_out_of_run() {
        let entries = [entry(0, 0, Some(60.0), Some(70.0))];
        let mut runner = runner(ScriptedSensor::new([
            Err(SensorError::Timeout),
            Err(SensorError::Interrupted),
        ]));

        assert_eq!(
            runner.run(&entries, SENSOR, PLUG, 0),
            Err(RunError::Interrupted(Interrupted))
        );
        assert!(runner.plug().commands.is_empty());
        assert_eq!(runner.plug().queries, 0);
    }

    #[test]
    fn interrupt_during_plug_command_aborts_before_status_query() {
        let entries = [entry(0, 0, None, Some(70.0))];
        let interrupted = Rc::new(Cell::new(false));
        let mut runner = ScheduleRunner::new(
            TemperatureReader::new(
                ScriptedSensor::new([Err(SensorError::Timeout), Ok(snapshot(SENSOR, 30.0))]),
                RecordingPause::default(),
                RetryPolicy::default(),
            ),
            RecordingPlug {
                interrupt_on_set: Some(Rc::clone(&interrupted)),
                ..Default::default()
            },
        )
        .with_interrupt_check({
            let interrupted = Rc::clone(&interrupted);
            move || interrupted.get()
        });

        assert_eq!(
            runner.run(&entries, SENSOR, PLUG, 0),
            Err(RunError::Interrupted(Interrupted))
        );
        assert_eq!(runner.reader().pauser().pauses.len(), 1);
        assert_eq!(runner.plug().commands.len(), 1);
        assert_eq!(runner.plug().queries, 0);
    }

    #[test]
    fn pending_interrupt_blocks_any_plug_command() {
        let entries = [entry(0, 0, None, Some(70.0))];
        let mut runner =
            runner(ScriptedSensor::reporting(30.0)).with_interrupt_check(|| true);

        assert_eq!(
            runner.run(&entries, SENSOR, PLUG, 0),
            Err(RunError::Interrupted(Interrupted))
        );
        assert!(runner.plug().commands.is_empty());
        assert_eq!(runner.plug().queries, 0);
    }

    #[test]
    fn out_of_range_hour_is_rejected() {
        let entries = [entry(0, 5, Some(60.0), None)];
        let mut runner = runner(ScriptedSensor::reporting(5.0));

        assert_eq!(
            runner.run(&entries, SENSOR, PLUG, 24),
            Err(RunError::Window(WindowError::HourOutOfRange(24)))
        );
    }

    #[test]
    fn repeated_runs_issue_command_every_time() {
        let entries = [entry(0, 0, None, Some(70.0))];
        let mut runner = runner(ScriptedSensor::new([
            Ok(snapshot(SENSOR, 30.0)),
            Ok(snapshot(SENSOR, 30.0)),
        ]));

        runner.run(&entries, SENSOR, PLUG, 1).unwrap();
        runner.run(&entries, SENSOR, PLUG, 1).unwrap();

        assert_eq!(runner.plug().commands.len(), 2);
    }

    #[test]
    fn parses_single_entry_document() {
        let schedule =
            Schedule::from_json(r#"{"hour_start": 6, "hour_end": 22, "temp_min_f": 62.5}"#)
                .unwrap();

        assert_eq!(schedule.entries, vec![entry(6, 22, Some(62.5), None)]);
    }

    #[test]
    fn parses_entry_list_in_order() {
        let schedule = Schedule::from_json(
            r#"[
                {"hour_start": 22, "hour_end": 6, "temp_min_f": 60, "temp_max_f": null},
                {"hour_start": 7, "hour_end": 21, "temp_max_f": 72}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            schedule.entries,
            vec![entry(22, 6, Some(60.0), None), entry(7, 21, None, Some(72.0))]
        );
    }

    #[test]
    fn rejects_missing_hours_and_bad_ranges() {
        let err = Schedule::from_json(r#"{"temp_min_f": 60}"#).unwrap_err();
        assert!(err.to_string().contains("missing field `hour_start`"), "{err}");

        let err = Schedule::from_json(r#"[{"hour_end": 4}]"#).unwrap_err();
        assert!(err.to_string().contains("missing field `hour_start`"), "{err}");

        let err = Schedule::from_json(
            r#"[
                {"hour_start": 6, "hour_end": 22},
                {"hour_start": "seven", "hour_end": 21}
            ]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid type"), "{err}");
        assert_eq!(err.line(), 3);

        let schedule = Schedule::from_json(r#"[{"hour_start": 3, "hour_end": 24}]"#).unwrap();
        match schedule.validate() {
            Err(ConfigError::Invalid(reason)) => {
                assert_eq!(reason, "schedule entry 0: hour 24 is outside 0..=23")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Schedule::load(Path::new("/nonexistent/schedule.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
