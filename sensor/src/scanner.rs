use std::{collections::HashMap, sync::Arc, time::Duration};

use btleplug::{
    api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter},
    platform::Manager,
};
use futures::StreamExt;
use thermostat_common::{SensorData, SensorError, SensorSource};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::{
    interrupt::InterruptSignal,
    ruuvi::{self, RUUVI_COMPANY_ID},
};

/// Passive BLE scan for RuuviTag advertisements.
pub struct RuuviScanner {
    runtime: Arc<Runtime>,
    scan_timeout: Duration,
    interrupt: InterruptSignal,
}

impl RuuviScanner {
    pub fn new(runtime: Arc<Runtime>, scan_timeout: Duration, interrupt: InterruptSignal) -> Self {
        Self {
            runtime,
            scan_timeout,
            interrupt,
        }
    }

    async fn scan(&self, sensor_mac: &str) -> Result<HashMap<String, SensorData>, SensorError> {
        let manager = Manager::new().await.map_err(transport)?;
        let central = manager
            .adapters()
            .await
            .map_err(transport)?
            .into_iter()
            .next()
            .ok_or_else(|| SensorError::Transport("no bluetooth adapter found".to_string()))?;

        let mut events = central.events().await.map_err(transport)?;
        central
            .start_scan(ScanFilter::default())
            .await
            .map_err(transport)?;
        debug!("ble scan started for {sensor_mac}");

        let deadline = tokio::time::Instant::now() + self.scan_timeout;
        let mut found = HashMap::new();
        let mut timed_out = false;

        while found.is_empty() {
            let event = match tokio::time::timeout_at(deadline, events.next()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            };

            let CentralEvent::ManufacturerDataAdvertisement {
                id,
                manufacturer_data,
            } = event
            else {
                continue;
            };
            let Some(payload) = manufacturer_data.get(&RUUVI_COMPANY_ID) else {
                continue;
            };

            let address = match central.peripheral(&id).await {
                Ok(peripheral) => peripheral.address().to_string(),
                Err(err) => {
                    debug!("failed to resolve peripheral {id:?}: {err}");
                    continue;
                }
            };
            if !address.eq_ignore_ascii_case(sensor_mac) {
                continue;
            }

            match ruuvi::decode(payload) {
                Ok(measurement) => {
                    info!(
                        "ruuvi data for {address}: {:.2}C humidity {:?} pressure {:?} battery {:?}",
                        measurement.temperature_c,
                        measurement.humidity_percent,
                        measurement.pressure_pa,
                        measurement.battery_mv
                    );
                    found.insert(address.to_ascii_uppercase(), SensorData::from(measurement));
                }
                Err(err) => warn!("undecodable advertisement from {address}: {err}"),
            }
        }

        if let Err(err) = central.stop_scan().await {
            warn!("failed to stop ble scan: {err}");
        }

        if found.is_empty() && timed_out {
            return Err(SensorError::Timeout);
        }
        Ok(found)
    }
}

impl SensorSource for RuuviScanner {
    fn get_reading(&mut self, sensor_id: &str) -> Result<HashMap<String, SensorData>, SensorError> {
        let runtime = Arc::clone(&self.runtime);
        runtime.block_on(async {
            tokio::select! {
                biased;
                _ = self.interrupt.raised() => Err(SensorError::Interrupted),
                result = self.scan(sensor_id) => result,
            }
        })
    }
}

fn transport(err: btleplug::Error) -> SensorError {
    SensorError::Transport(err.to_string())
}
