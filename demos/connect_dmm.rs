use xdm1041ctrl::{Device, DEFAULT_BAUDRATE};

#[tokio::main]
async fn main() -> xdm1041ctrl::Result<()> {
    let path = "/dev/ttyUSB0".to_string();
    let device = Device::new(&path, DEFAULT_BAUDRATE).await?;
    eprintln!("Connected to: {}\n", device.ident()?.model);
    device.close().await
}
