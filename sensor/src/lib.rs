pub mod interrupt;
pub mod ruuvi;
pub mod scanner;

pub use interrupt::{InterruptSignal, SignalPause};
pub use ruuvi::{decode, DecodeError, RuuviMeasurement, RUUVI_COMPANY_ID};
pub use scanner::RuuviScanner;
