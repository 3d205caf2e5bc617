use std::time::Duration;

use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::Result;

/// Default time a read waits for data before it counts as no data.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Opens the serial port for async use.
pub fn open(com: impl AsRef<str>, baudrate: u32) -> Result<SerialStream> {
    #[allow(unused_mut)]
    let mut port = tokio_serial::new(com.as_ref(), baudrate).open_native_async()?;

    #[cfg(unix)]
    port.set_exclusive(false)?;

    Ok(port)
}
