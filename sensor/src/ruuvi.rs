//! RuuviTag advertisement decoding.
//!
//! Payloads are the manufacturer-specific data that follows the Ruuvi company
//! id. Data formats 3 (RAWv1) and 5 (RAWv2) are supported.

use thermostat_common::SensorData;
use thiserror::Error;

pub const RUUVI_COMPANY_ID: u16 = 0x0499;

const FORMAT_RAW_V1: u8 = 3;
const FORMAT_RAW_V2: u8 = 5;
const RAW_V1_LEN: usize = 14;
const RAW_V2_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty ruuvi payload")]
    Empty,
    #[error("unsupported ruuvi data format {0}")]
    UnsupportedFormat(u8),
    #[error("ruuvi format {format} payload too short: {len} bytes")]
    TooShort { format: u8, len: usize },
    #[error("ruuvi payload carries no temperature")]
    MissingTemperature,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuuviMeasurement {
    pub format: u8,
    pub temperature_c: f64,
    pub humidity_percent: Option<f64>,
    pub pressure_pa: Option<f64>,
    pub battery_mv: Option<u16>,
}

impl From<RuuviMeasurement> for SensorData {
    fn from(measurement: RuuviMeasurement) -> Self {
        Self {
            temperature_celsius: measurement.temperature_c,
            humidity_percent: measurement.humidity_percent,
            pressure_pa: measurement.pressure_pa,
            battery_mv: measurement.battery_mv,
        }
    }
}

pub fn decode(payload: &[u8]) -> Result<RuuviMeasurement, DecodeError> {
    let format = *payload.first().ok_or(DecodeError::Empty)?;
    match format {
        FORMAT_RAW_V1 => decode_raw_v1(payload),
        FORMAT_RAW_V2 => decode_raw_v2(payload),
        other => Err(DecodeError::UnsupportedFormat(other)),
    }
}

fn decode_raw_v1(payload: &[u8]) -> Result<RuuviMeasurement, DecodeError> {
    ensure_len(payload, RAW_V1_LEN)?;

    // Sign-magnitude: top bit of the integer byte is the sign.
    let whole = f64::from(payload[2] & 0x7f);
    let fraction = f64::from(payload[3]) / 100.0;
    let magnitude = whole + fraction;
    let temperature_c = if payload[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    Ok(RuuviMeasurement {
        format: FORMAT_RAW_V1,
        temperature_c,
        humidity_percent: Some(f64::from(payload[1]) * 0.5),
        pressure_pa: Some(f64::from(be_u16(payload, 4)) + 50_000.0),
        battery_mv: Some(be_u16(payload, 12)),
    })
}

fn decode_raw_v2(payload: &[u8]) -> Result<RuuviMeasurement, DecodeError> {
    ensure_len(payload, RAW_V2_LEN)?;

    let raw_temperature = i16::from_be_bytes([payload[1], payload[2]]);
    if raw_temperature == i16::MIN {
        return Err(DecodeError::MissingTemperature);
    }

    let humidity = be_u16(payload, 3);
    let pressure = be_u16(payload, 5);
    let battery = be_u16(payload, 13) >> 5;

    Ok(RuuviMeasurement {
        format: FORMAT_RAW_V2,
        temperature_c: f64::from(raw_temperature) * 0.005,
        humidity_percent: (humidity != u16::MAX).then(|| f64::from(humidity) * 0.0025),
        pressure_pa: (pressure != u16::MAX).then(|| f64::from(pressure) + 50_000.0),
        battery_mv: (battery != 0x07ff).then(|| battery + 1_600),
    })
}

fn ensure_len(payload: &[u8], expected: usize) -> Result<(), DecodeError> {
    if payload.len() < expected {
        return Err(DecodeError::TooShort {
            format: payload[0],
            len: payload.len(),
        });
    }
    Ok(())
}

fn be_u16(payload: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([payload[offset], payload[offset + 1]])
}
