use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout, Duration};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, warn};

use crate::measurement::{Measurement, SequenceStep};
use crate::proto::command::{
    CapacitanceRange, Command, Configure, ControlMode, CurrentAcRange, CurrentDcRange, Rate,
    ResistanceRange, VoltageAcRange, VoltageDcRange,
};
use crate::proto::response::{parse_value, Ident};
use crate::proto::serial::{self, DEFAULT_READ_TIMEOUT};
use crate::proto::{
    codec::ProtocolCodec, ProtoError, Result, COMMUNICATION_DELAY, RANGE_SWITCH_DELAY,
    READ_BUFFER_LEN,
};

/// Byte stream the device talks over: a serial port, or anything else that
/// reads and writes.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Session with one XDM1041.
///
/// The session owns its transport. Every command is followed by
/// [`COMMUNICATION_DELAY`], every range change additionally by
/// [`RANGE_SWITCH_DELAY`].
pub struct Device {
    port: Box<dyn Transport>,
    codec: ProtocolCodec,
    rx: BytesMut,
    read_timeout: Option<Duration>,
    rate: Rate,
    control: Option<ControlMode>,
    configuration: Option<Configure>,
    identity: String,
}

impl Device {
    /// Opens the serial port and performs the connection handshake.
    pub async fn new(com: impl AsRef<str>, baudrate: u32) -> Result<Self> {
        Self::with_read_timeout(com, baudrate, DEFAULT_READ_TIMEOUT).await
    }

    pub async fn with_read_timeout(
        com: impl AsRef<str>,
        baudrate: u32,
        read_timeout: Duration,
    ) -> Result<Self> {
        let port = serial::open(com, baudrate)?;
        Self::connect(port, Some(read_timeout)).await
    }

    /// Performs the connection handshake over an already opened transport:
    /// select medium rate, query identity, switch to remote control.
    ///
    /// The identity is best effort and ends up empty if it cannot be read.
    /// Reads wait as long as the transport does.
    pub async fn with_transport(transport: impl Transport + 'static) -> Result<Self> {
        Self::connect(transport, None).await
    }

    /// Like [`Device::with_transport`], but every read that sees no data
    /// within `read_timeout` ends with zero bytes.
    pub async fn with_transport_timeout(
        transport: impl Transport + 'static,
        read_timeout: Duration,
    ) -> Result<Self> {
        Self::connect(transport, Some(read_timeout)).await
    }

    async fn connect(
        transport: impl Transport + 'static,
        read_timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut device = Self {
            port: Box::new(transport),
            codec: ProtocolCodec,
            rx: BytesMut::with_capacity(READ_BUFFER_LEN),
            read_timeout,
            rate: Rate::default(),
            control: None,
            configuration: None,
            identity: String::new(),
        };

        device.set_rate(Rate::Medium).await?;

        device.identity = match device.exchange(Command::Identity).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(%err, "identity query failed");
                String::new()
            }
        };
        if device.identity.is_empty() {
            warn!("device did not report an identity");
        }

        device.set_remote().await?;

        info!(identity = %device.identity, "device connected");
        Ok(device)
    }

    #[cfg(test)]
    pub(crate) async fn new_faked(
        reads: Vec<crate::proto::fake::Chunk>,
    ) -> (Result<Self>, crate::proto::fake::FakeHandle) {
        let (fake, handle) = crate::proto::fake::FakeBuffer::new(reads);
        (Self::with_transport(fake).await, handle)
    }

    /// Identity text as reported during the handshake.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn ident(&self) -> Result<Ident> {
        Ident::try_from(self.identity.as_str())
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn control(&self) -> Option<ControlMode> {
        self.control
    }

    /// Last configuration the device accepted.
    pub fn configuration(&self) -> Option<Configure> {
        self.configuration
    }

    /// Writes `cmd` and waits the communication delay. The delay elapses
    /// even when the write fails.
    async fn send(&mut self, cmd: Command) -> Result<()> {
        let mut frame = BytesMut::new();
        self.codec.encode(cmd, &mut frame)?;
        debug!(command = %cmd, "write");

        let written = match self.port.write_all(&frame).await {
            Ok(()) => self.port.flush().await,
            Err(err) => Err(err),
        };
        sleep(COMMUNICATION_DELAY).await;

        written.map_err(|err| {
            warn!(command = %cmd, %err, "write failed");
            ProtoError::Io(err)
        })
    }

    /// One transport read. Each call gets the full read timeout, if any.
    async fn read_some(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.read_timeout {
            Some(limit) => match timeout(limit, self.port.read(buf)).await {
                Ok(res) => res,
                Err(_elapsed) => Ok(0),
            },
            None => self.port.read(buf).await,
        }
    }

    /// Single bounded read. Read errors count as no data.
    async fn read_reply(&mut self) -> String {
        let mut buf = [0u8; READ_BUFFER_LEN];
        match self.read_some(&mut buf).await {
            Ok(n) => self.rx.extend_from_slice(&buf[..n]),
            Err(err) => {
                warn!(%err, "read failed, no data");
                self.rx.clear();
                return String::new();
            }
        }
        let raw = self.rx.split();
        let reply = String::from_utf8_lossy(&raw).trim().to_string();
        debug!(%reply, "read");
        reply
    }

    /// Sends query `cmd` and returns the trimmed reply.
    ///
    /// A failed write is an error, a failed read gives an empty reply.
    pub(crate) async fn exchange(&mut self, cmd: Command) -> Result<String> {
        debug_assert!(cmd.is_query(), "{} expects no reply", cmd);
        self.send(cmd).await?;
        Ok(self.read_reply().await)
    }

    /// Reads one complete newline terminated reply.
    pub async fn read_message(&mut self) -> Result<String> {
        loop {
            if let Some(line) = self.codec.decode(&mut self.rx)? {
                debug!(reply = %line, "read message");
                return Ok(line);
            }
            let mut buf = [0u8; READ_BUFFER_LEN];
            let n = self.read_some(&mut buf).await?;
            if n == 0 {
                return Err(ProtoError::NoReply);
            }
            self.rx.extend_from_slice(&buf[..n]);
        }
    }

    /// Shuts the transport down.
    pub async fn close(mut self) -> Result<()> {
        self.port.shutdown().await?;
        Ok(())
    }

    pub async fn rate_query(&mut self) -> Result<Rate> {
        self.exchange(Command::GetRate).await?.parse()
    }

    pub async fn set_rate(&mut self, rate: Rate) -> Result<()> {
        self.send(Command::SetRate(rate)).await?;
        self.rate = rate;
        Ok(())
    }

    /// Raw reply of `RANGE?`, empty if the device did not answer.
    pub async fn range_query(&mut self) -> Result<String> {
        self.exchange(Command::GetRange).await
    }

    pub async fn set_control(&mut self, mode: ControlMode) -> Result<()> {
        self.send(Command::Control(mode)).await?;
        self.control = Some(mode);
        Ok(())
    }

    pub async fn set_remote(&mut self) -> Result<()> {
        self.set_control(ControlMode::Remote).await
    }

    pub async fn set_local(&mut self) -> Result<()> {
        self.set_control(ControlMode::Local).await
    }

    /// Selects function and range, then waits for the range relays to settle.
    pub async fn configure(&mut self, cfg: Configure) -> Result<()> {
        self.send(Command::Configure(cfg)).await?;
        self.configuration = Some(cfg);
        sleep(RANGE_SWITCH_DELAY).await;
        Ok(())
    }

    pub async fn set_voltage_dc_range(&mut self, range: VoltageDcRange) -> Result<()> {
        self.configure(Configure::VoltageDc(range)).await
    }

    pub async fn set_voltage_ac_range(&mut self, range: VoltageAcRange) -> Result<()> {
        self.configure(Configure::VoltageAc(range)).await
    }

    pub async fn set_current_dc_range(&mut self, range: CurrentDcRange) -> Result<()> {
        self.configure(Configure::CurrentDc(range)).await
    }

    pub async fn set_current_ac_range(&mut self, range: CurrentAcRange) -> Result<()> {
        self.configure(Configure::CurrentAc(range)).await
    }

    pub async fn set_resistance_range(&mut self, range: ResistanceRange) -> Result<()> {
        self.configure(Configure::Resistance(range)).await
    }

    pub async fn set_capacitance_range(&mut self, range: CapacitanceRange) -> Result<()> {
        self.configure(Configure::Capacitance(range)).await
    }

    /// Reads the current value in the configured function.
    ///
    /// A stale reply still sitting in the device buffer is read and dropped
    /// before `MEAS?` is sent.
    pub async fn read_value(&mut self) -> Result<f64> {
        let stale = self.read_reply().await;
        if !stale.is_empty() {
            debug!(%stale, "dropped stale reply");
        }
        let reply = self.exchange(Command::Measure).await?;
        parse_value(&reply)
    }

    /// Measures DC current on the 5 A range, then DC voltage on the 50 V
    /// range.
    ///
    /// Current goes first, the order matters for accuracy. Any failing step
    /// aborts the sequence and no partial values are returned.
    pub async fn measure_dc(&mut self) -> Result<Measurement> {
        self.set_current_dc_range(CurrentDcRange::Amp5)
            .await
            .map_err(abort(SequenceStep::SetCurrentRange))?;
        let current = self
            .read_value()
            .await
            .map_err(abort(SequenceStep::ReadCurrent))?;
        self.set_voltage_dc_range(VoltageDcRange::Volt50)
            .await
            .map_err(abort(SequenceStep::SetVoltageRange))?;
        let voltage = self
            .read_value()
            .await
            .map_err(abort(SequenceStep::ReadVoltage))?;

        Ok(Measurement::new(voltage, current))
    }
}

fn abort(step: SequenceStep) -> impl FnOnce(ProtoError) -> ProtoError {
    move |err| {
        warn!(%step, %err, "measurement sequence aborted");
        ProtoError::SequenceAbort {
            step,
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::proto::fake::{Chunk, FakeBuffer, FakeHandle};

    const IDN: &str = "OWON,XDM1041,24150148,V3.7.2,2";

    async fn connected(reads: Vec<Chunk>) -> (Device, FakeHandle) {
        let mut script = vec![Chunk::text(IDN)];
        script.extend(reads);
        let (device, handle) = Device::new_faked(script).await;
        let device = device.unwrap();
        handle.clear_written();
        (device, handle)
    }

    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake() {
        let start = Instant::now();
        let (device, handle) =
            Device::new_faked(vec![Chunk::text("OWON,XDM1041,24150148,V3.7.2,2\n")]).await;
        let device = device.unwrap();

        assert_eq!(handle.written(), "RATE M\n*IDN?\nSYST:REM\n");
        assert_eq!(device.identity(), IDN);
        assert_eq!(device.ident().unwrap().model, "XDM1041");
        assert_eq!(device.rate(), Rate::Medium);
        assert_eq!(device.control(), Some(ControlMode::Remote));
        assert_eq!(device.configuration(), None);
        assert_elapsed(start, COMMUNICATION_DELAY * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_survives_missing_identity() {
        let (device, _handle) = Device::new_faked(vec![Chunk::Fail]).await;
        let device = device.unwrap();
        assert_eq!(device.identity(), "");
        assert!(device.ident().is_err());
        assert_eq!(device.control(), Some(ControlMode::Remote));

        let (fake, handle) = FakeBuffer::new(vec![]);
        handle.fail_write("*IDN?");
        let device = Device::with_transport(fake).await.unwrap();
        assert_eq!(device.identity(), "");
        assert_eq!(handle.written(), "RATE M\nSYST:REM\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_aborts_on_write_failure() {
        let (fake, handle) = FakeBuffer::new(vec![Chunk::text(IDN)]);
        handle.fail_write("RATE M");
        let res = Device::with_transport(fake).await;
        assert!(matches!(res, Err(ProtoError::Io(_))));
        assert_eq!(handle.written(), "");

        let (fake, handle) = FakeBuffer::new(vec![Chunk::text(IDN)]);
        handle.fail_write("SYST:REM");
        let res = Device::with_transport(fake).await;
        assert!(matches!(res, Err(ProtoError::Io(_))));
        assert_eq!(handle.written(), "RATE M\n*IDN?\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_still_waits() {
        let (mut device, handle) = connected(vec![]).await;
        handle.fail_write("RATE F");

        let start = Instant::now();
        assert!(matches!(
            device.set_rate(Rate::Fast).await,
            Err(ProtoError::Io(_))
        ));
        assert_elapsed(start, COMMUNICATION_DELAY);
        assert_eq!(device.rate(), Rate::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_rate_and_control() {
        let (mut device, handle) = connected(vec![]).await;

        let start = Instant::now();
        device.set_rate(Rate::Slow).await.unwrap();
        assert_elapsed(start, COMMUNICATION_DELAY);
        assert_eq!(device.rate(), Rate::Slow);

        device.set_local().await.unwrap();
        assert_eq!(device.control(), Some(ControlMode::Local));
        assert_eq!(handle.commands(), vec!["RATE S", "SYST:LOC"]);

        handle.fail_write("SYST:REM");
        assert!(device.set_remote().await.is_err());
        assert_eq!(device.control(), Some(ControlMode::Local));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_waits_for_range_switch() {
        let (mut device, handle) = connected(vec![Chunk::text("0.0\n")]).await;

        let start = Instant::now();
        device
            .set_voltage_dc_range(VoltageDcRange::MilliVolt50)
            .await
            .unwrap();
        assert_elapsed(start, COMMUNICATION_DELAY + RANGE_SWITCH_DELAY);
        assert_eq!(handle.written(), "CONF:VOLT:DC 50E-3\n");
        assert_eq!(
            device.configuration(),
            Some(Configure::VoltageDc(VoltageDcRange::MilliVolt50))
        );

        device
            .set_capacitance_range(CapacitanceRange::MicroFarad5)
            .await
            .unwrap();
        device.set_resistance_range(ResistanceRange::Auto).await.unwrap();
        device
            .set_current_ac_range(CurrentAcRange::MilliAmp500)
            .await
            .unwrap();
        device.set_voltage_ac_range(VoltageAcRange::Volt750).await.unwrap();
        assert_eq!(
            handle.commands(),
            vec![
                "CONF:VOLT:DC 50E-3",
                "CONF:CAP 5E-6",
                "CONF:RES AUTO",
                "CONF:CURR:AC 500E-3",
                "CONF:VOLT:AC 750",
            ]
        );
        // Configuration commands expect no reply.
        assert_eq!(handle.pending_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_configure_keeps_state() {
        let (mut device, handle) = connected(vec![]).await;
        device.set_resistance_range(ResistanceRange::KiloOhm5).await.unwrap();

        handle.fail_write("CONF:RES 50E3");
        let res = device.set_resistance_range(ResistanceRange::KiloOhm50).await;
        assert!(matches!(res, Err(ProtoError::Io(_))));
        assert_eq!(
            device.configuration(),
            Some(Configure::Resistance(ResistanceRange::KiloOhm5))
        );
        assert_eq!(device.rate(), Rate::Medium);
        assert_eq!(device.control(), Some(ControlMode::Remote));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_swallows_read_failure() {
        let (mut device, handle) = connected(vec![Chunk::Fail]).await;
        assert_eq!(device.range_query().await.unwrap(), "");
        assert_eq!(handle.commands(), vec!["RANGE?"]);

        handle.push_read(Chunk::text(" 50 \r\n"));
        assert_eq!(device.range_query().await.unwrap(), "50");
    }

    #[cfg(debug_assertions)]
    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "expects no reply")]
    async fn test_exchange_rejects_commands_without_reply() {
        let (mut device, _handle) = connected(vec![Chunk::text("stray\n")]).await;
        let _ = device.exchange(Command::Control(ControlMode::Local)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_query() {
        let (mut device, handle) = connected(vec![Chunk::text("F\n")]).await;
        assert_eq!(device.rate_query().await.unwrap(), Rate::Fast);

        handle.push_read(Chunk::Empty);
        assert!(matches!(
            device.rate_query().await,
            Err(ProtoError::Parse { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_value() {
        let (mut device, handle) =
            connected(vec![Chunk::text("0.1\n"), Chunk::text("1.2345E+00\n")]).await;

        assert_eq!(device.read_value().await.unwrap(), 1.2345);
        assert_eq!(handle.commands(), vec!["MEAS?"]);
        assert_eq!(handle.pending_reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_value_errors_are_distinguishable() {
        let (mut device, handle) = connected(vec![Chunk::Empty, Chunk::text("OVLD\n")]).await;
        match device.read_value().await {
            Err(err @ ProtoError::Parse { .. }) => {
                assert!(!err.is_transport());
                assert!(matches!(err, ProtoError::Parse { reply } if reply == "OVLD"));
            }
            other => panic!("unexpected {:?}", other),
        }

        handle.fail_write("MEAS?");
        match device.read_value().await {
            Err(err) => assert!(err.is_transport()),
            Ok(v) => panic!("unexpected value {}", v),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_dc() {
        let (mut device, handle) = connected(vec![
            Chunk::Empty,
            Chunk::text("2.0\n"),
            Chunk::Empty,
            Chunk::text("5.0\n"),
        ])
        .await;

        let start = Instant::now();
        let mea = device.measure_dc().await.unwrap();
        assert_elapsed(
            start,
            (COMMUNICATION_DELAY + RANGE_SWITCH_DELAY) * 2 + COMMUNICATION_DELAY * 2,
        );

        assert_eq!(mea.current_dc, 2.0);
        assert_eq!(mea.voltage_dc, 5.0);
        assert_eq!(mea.power(), 10.0);
        assert_eq!(
            handle.commands(),
            vec!["CONF:CURR:DC 5", "MEAS?", "CONF:VOLT:DC 50", "MEAS?"]
        );
        assert_eq!(
            device.configuration(),
            Some(Configure::VoltageDc(VoltageDcRange::Volt50))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_dc_aborts_on_voltage_range() {
        let (mut device, handle) = connected(vec![Chunk::Empty, Chunk::text("2.0\n")]).await;
        handle.fail_write("CONF:VOLT:DC 50");

        match device.measure_dc().await {
            Err(ProtoError::SequenceAbort { step, source }) => {
                assert_eq!(step, SequenceStep::SetVoltageRange);
                assert!(matches!(*source, ProtoError::Io(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(handle.commands(), vec!["CONF:CURR:DC 5", "MEAS?"]);
        assert_eq!(
            device.configuration(),
            Some(Configure::CurrentDc(CurrentDcRange::Amp5))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_dc_aborts_on_bad_current() {
        let (mut device, handle) = connected(vec![Chunk::Empty, Chunk::text("----\n")]).await;

        match device.measure_dc().await {
            Err(ProtoError::SequenceAbort { step, source }) => {
                assert_eq!(step, SequenceStep::ReadCurrent);
                assert!(matches!(*source, ProtoError::Parse { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(handle.commands(), vec!["CONF:CURR:DC 5", "MEAS?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_dc_aborts_on_current_range() {
        let (mut device, handle) = connected(vec![]).await;
        handle.fail_write("CONF:CURR:DC 5");

        let err = device.measure_dc().await.unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(
            err,
            ProtoError::SequenceAbort {
                step: SequenceStep::SetCurrentRange,
                ..
            }
        ));
        assert_eq!(handle.written(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_message() {
        let (mut device, _handle) = connected(vec![
            Chunk::text("1.23"),
            Chunk::text("4E-3\r\nOWON"),
        ])
        .await;
        assert_eq!(device.read_message().await.unwrap(), "1.234E-3");
        assert!(matches!(
            device.read_message().await,
            Err(ProtoError::NoReply)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_gives_no_data() {
        let limit = Duration::from_millis(200);
        let (fake, handle) = FakeBuffer::new(vec![Chunk::text(IDN)]);
        let mut device = Device::with_transport_timeout(fake, limit).await.unwrap();
        assert_eq!(device.identity(), IDN);

        handle.push_read(Chunk::Hang);
        let start = Instant::now();
        assert_eq!(device.range_query().await.unwrap(), "");
        assert_elapsed(start, COMMUNICATION_DELAY + limit);

        // Abandon a query while its read is waiting.
        let abandoned = timeout(
            COMMUNICATION_DELAY + Duration::from_millis(100),
            device.range_query(),
        )
        .await;
        assert!(abandoned.is_err());

        // The next read still waits the whole timeout.
        let start = Instant::now();
        assert_eq!(device.range_query().await.unwrap(), "");
        assert_elapsed(start, COMMUNICATION_DELAY + limit);

        let start = Instant::now();
        assert!(matches!(
            device.read_message().await,
            Err(ProtoError::NoReply)
        ));
        assert_elapsed(start, limit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close() {
        let (device, _handle) = connected(vec![]).await;
        assert!(device.close().await.is_ok());
    }
}
