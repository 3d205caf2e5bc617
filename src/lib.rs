//!
//! This library provides communication with an OWON XDM1041 digital multimeter.
//!
//! <br>
//!
//! # Details
//!
//! - The multimeter is connected through its USB serial interface.
//!
//! - Basic setup and connection
//!
//!   ```no_run
//!   use xdm1041ctrl::{Device, DEFAULT_BAUDRATE};
//!   #[tokio::main]
//!   async fn main() -> xdm1041ctrl::Result<()> {
//!       let path = "/dev/ttyUSB0".to_string();
//!       let mut device = Device::new(&path, DEFAULT_BAUDRATE).await?;
//!       eprintln!("Connected to: {}\n", device.identity());
//!       let mea = device.measure_dc().await?;
//!       println!("{:.3} W", mea.power());
//!       Ok(())
//!   }
//!   ```
//!
//! # Timing
//!
//! The instrument needs a pause after every command
//! ([`proto::COMMUNICATION_DELAY`]) and another one after every range change
//! ([`proto::RANGE_SWITCH_DELAY`]). All operations wait these out before
//! they return, so a range change takes well over a second.
//!
//! # Supported devices
//!
//!  * OWON XDM1041
//!

pub mod device;
pub mod measurement;
pub mod proto;

pub use device::{Device, Transport};
pub use measurement::Measurement;
pub use proto::{ProtoError, Result};

#[cfg(unix)]
pub const DEFAULT_TTY: &str = "/dev/ttyUSB0";
#[cfg(windows)]
pub const DEFAULT_TTY: &str = "COM1";

/// Default Baudrate for XDM1041.
pub const DEFAULT_BAUDRATE: u32 = 115200;
