//! Serial port setup

use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::LinkError;

/// Open the configured port with the amplifier's fixed 8N1 framing
pub fn open_serial(config: &SessionConfig) -> Result<SerialStream, LinkError> {
    let stream = tokio_serial::new(config.port.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(config.io_timeout())
        .open_native_async()
        .map_err(|source| {
            warn!("Failed to open {}: {}", config.port, source);
            LinkError::Open {
                port: config.port.clone(),
                source,
            }
        })?;

    info!("Opened {} at {} baud", config.port, config.baud_rate);
    Ok(stream)
}
