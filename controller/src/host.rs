use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context};
use chrono::{Local, Timelike, Utc};
use chrono_tz::Tz;
use thermostat_common::{
    ActuationResult, ControllerConfig, PlugActuator, RunError, Schedule, ScheduleRunner,
    TemperatureReader, ThermostatEntry, Thresholds,
};
use thermostat_sensor::{InterruptSignal, RuuviScanner, SignalPause};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{dry_run::DryRunPlug, kasa::KasaCli};

const CONFIG_PATH_ENV: &str = "THERMOSTAT_CONFIG";
const SCHEDULE_PATH_ENV: &str = "THERMOSTAT_SCHEDULE";

/// Runs one evaluation cycle and returns.
pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli_thresholds = parse_threshold_args(&args)?;

    let config_path = path_from_env(CONFIG_PATH_ENV, "conf.json");
    let config = ControllerConfig::load(&config_path).context("failed to load controller config")?;
    info!("loaded ruuvi mac from conf: {}", config.ruuvitag_mac_address);
    info!("loaded kasa plug alias from conf: {}", config.kasa_plug_alias);

    let schedule = match cli_thresholds {
        Some(thresholds) => {
            println!(
                "Running with min max range: {} - {}",
                describe(thresholds.temp_min_f),
                describe(thresholds.temp_max_f)
            );
            Schedule {
                entries: vec![ThermostatEntry::always(thresholds)],
            }
        }
        None => {
            let schedule_path = path_from_env(SCHEDULE_PATH_ENV, "schedule.json");
            Schedule::load(&schedule_path).context("failed to load schedule")?
        }
    };
    info!("schedule has {} entries", schedule.entries.len());

    let current_hour = current_hour(config.timezone.as_deref())?;

    // One worker keeps the ctrl-c listener running while the main thread
    // is blocked outside the runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let runtime = Arc::new(runtime);
    let interrupt =
        InterruptSignal::install(&runtime).context("failed to install ctrl-c handler")?;

    let result = if config.dry_run {
        evaluate(&config, &schedule, current_hour, &runtime, &interrupt, DryRunPlug)
    } else {
        let kasa = KasaCli::new(
            config.kasa_binary.clone(),
            Arc::clone(&runtime),
            interrupt.clone(),
        );
        evaluate(&config, &schedule, current_hour, &runtime, &interrupt, kasa)
    };

    match result {
        Ok(Some(result)) => echo(&result),
        Ok(None) => info!("nothing scheduled for hour {current_hour}"),
        Err(RunError::Interrupted(interrupted)) => {
            warn!("evaluation interrupted by operator");
            return Err(interrupted.into());
        }
        Err(RunError::Window(err)) => {
            return Err(err).context("schedule window evaluation failed");
        }
    }

    info!("done");
    Ok(())
}

fn evaluate<A: PlugActuator>(
    config: &ControllerConfig,
    schedule: &Schedule,
    current_hour: u8,
    runtime: &Arc<tokio::runtime::Runtime>,
    interrupt: &InterruptSignal,
    plug: A,
) -> Result<Option<ActuationResult>, RunError> {
    let scanner = RuuviScanner::new(
        Arc::clone(runtime),
        config.sensor.scan_timeout(),
        interrupt.clone(),
    );
    let reader = TemperatureReader::new(
        scanner,
        SignalPause::new(Arc::clone(runtime), interrupt.clone()),
        config.sensor.retry_policy(),
    );
    let latch = interrupt.clone();
    let mut runner =
        ScheduleRunner::new(reader, plug).with_interrupt_check(move || latch.is_raised());

    runner.run(
        &schedule.entries,
        &config.ruuvitag_mac_address,
        &config.kasa_plug_alias,
        current_hour,
    )
}

fn echo(result: &ActuationResult) {
    match result.temperature_f {
        Some(fahrenheit) => println!("\n  --> {fahrenheit:.2} deg F <--\n"),
        None => println!("\n  --> no temperature reading <--\n"),
    }
    match result.command {
        Some(command) => println!("command: {}", command.as_str()),
        None => println!("command: none"),
    }
}

/// `[TEMP_MAX [TEMP_MIN]]` from the command line.
fn parse_threshold_args(args: &[String]) -> anyhow::Result<Option<Thresholds>> {
    if args.len() > 2 {
        bail!("usage: thermostat-controller [TEMP_MAX [TEMP_MIN]]");
    }

    let parse = |name: &str, value: Option<&String>| -> anyhow::Result<Option<f64>> {
        value
            .map(|raw| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| anyhow!("{name} must be a number, got `{raw}`"))
            })
            .transpose()
    };

    if args.is_empty() {
        return Ok(None);
    }

    Ok(Some(Thresholds {
        temp_max_f: parse("TEMP_MAX", args.first())?,
        temp_min_f: parse("TEMP_MIN", args.get(1))?,
    }))
}

fn current_hour(timezone: Option<&str>) -> anyhow::Result<u8> {
    let hour = match timezone {
        Some(name) => {
            let tz: Tz = name
                .parse()
                .map_err(|err| anyhow!("invalid timezone `{name}`: {err}"))?;
            Utc::now().with_timezone(&tz).hour()
        }
        None => Local::now().hour(),
    };
    u8::try_from(hour).context("current hour out of range")
}

fn path_from_env(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn describe(value: Option<f64>) -> String {
    value.map_or_else(|| "None".to_string(), |value| value.to_string())
}
