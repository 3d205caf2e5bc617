use xdm1041ctrl::proto::conv::pretty_value;
use xdm1041ctrl::{Device, ProtoError, DEFAULT_BAUDRATE};

#[tokio::main]
async fn main() -> xdm1041ctrl::Result<()> {
    tracing_subscriber::fmt().init();

    let path = "/dev/ttyUSB0".to_string();
    let mut device = Device::new(&path, DEFAULT_BAUDRATE).await?;

    loop {
        match device.measure_dc().await {
            Ok(mea) => println!("Power: {}", pretty_value(mea.power(), "W")),
            // A failed step only loses this measurement.
            Err(err @ ProtoError::SequenceAbort { .. }) if !err.is_transport() => {
                println!("NO_DATA ({})", err);
            }
            Err(err) => return Err(err),
        }
    }
}
