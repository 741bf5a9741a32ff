mod dry_run;
mod host;
mod kasa;

use thermostat_common::Interrupted;

/// Conventional exit status for a process ended by SIGINT.
const INTERRUPT_EXIT_CODE: i32 = 130;

fn main() -> anyhow::Result<()> {
    match host::run() {
        Err(err) if err.is::<Interrupted>() => {
            eprintln!("{err}");
            std::process::exit(INTERRUPT_EXIT_CODE);
        }
        other => other,
    }
}
