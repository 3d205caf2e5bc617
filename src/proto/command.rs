use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use super::ProtoError;

/// Prefix shared by every configuration command.
pub const CONFIGURE_PREFIX: &str = "CONF:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Identity,
    GetRate,
    SetRate(Rate),
    GetRange,
    Measure,
    Control(ControlMode),
    Configure(Configure),
}

impl Command {
    /// Wire text of the command, without line terminator.
    pub fn as_scpi(&self) -> &'static str {
        match self {
            Command::Identity => "*IDN?",
            Command::GetRate => "RATE?",
            Command::SetRate(rate) => rate.as_scpi(),
            Command::GetRange => "RANGE?",
            Command::Measure => "MEAS?",
            Command::Control(mode) => mode.as_scpi(),
            Command::Configure(cfg) => cfg.as_scpi(),
        }
    }

    /// Whether the device answers this command.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::Identity | Command::GetRate | Command::GetRange | Command::Measure
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_scpi())
    }
}

/// Measurement rate (reading speed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Rate {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl Rate {
    pub fn as_scpi(self) -> &'static str {
        match self {
            Rate::Slow => "RATE S",
            Rate::Medium => "RATE M",
            Rate::Fast => "RATE F",
        }
    }
}

impl FromStr for Rate {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "S" => Ok(Rate::Slow),
            "M" => Ok(Rate::Medium),
            "F" => Ok(Rate::Fast),
            other => Err(ProtoError::Parse {
                reply: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Slow => f.write_str("Slow"),
            Rate::Medium => f.write_str("Medium"),
            Rate::Fast => f.write_str("Fast"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Remote,
    Local,
}

impl ControlMode {
    pub fn as_scpi(self) -> &'static str {
        match self {
            ControlMode::Remote => "SYST:REM",
            ControlMode::Local => "SYST:LOC",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Remote => f.write_str("Remote"),
            ControlMode::Local => f.write_str("Local"),
        }
    }
}

/// Measurement function selected by a configuration command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Function {
    #[value(name = "volt-dc")]
    VoltageDc,
    #[value(name = "volt-ac")]
    VoltageAc,
    #[value(name = "curr-dc")]
    CurrentDc,
    #[value(name = "curr-ac")]
    CurrentAc,
    #[value(name = "res")]
    Resistance,
    #[value(name = "cap")]
    Capacitance,
}

impl Function {
    pub const ALL: [Function; 6] = [
        Function::VoltageDc,
        Function::VoltageAc,
        Function::CurrentDc,
        Function::CurrentAc,
        Function::Resistance,
        Function::Capacitance,
    ];

    /// Function token placed between `CONF:` and the range literal.
    pub fn token(self) -> &'static str {
        match self {
            Function::VoltageDc => "VOLT:DC",
            Function::VoltageAc => "VOLT:AC",
            Function::CurrentDc => "CURR:DC",
            Function::CurrentAc => "CURR:AC",
            Function::Resistance => "RES",
            Function::Capacitance => "CAP",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Function::VoltageDc | Function::VoltageAc => "V",
            Function::CurrentDc | Function::CurrentAc => "A",
            Function::Resistance => "Ω",
            Function::Capacitance => "F",
        }
    }
}

/// A fixed ladder of ranges for one measurement function.
///
/// Every entry maps to a complete command literal, so the catalog can be
/// checked by plain string comparison.
pub trait RangeLadder: Copy + PartialEq + 'static {
    const FUNCTION: Function;
    const ALL: &'static [Self];

    /// Complete command text, e.g. `CONF:VOLT:DC 50E-3`.
    fn command(self) -> &'static str;

    /// Range literal (`AUTO` or engineering notation). `None` for the
    /// function default, which is sent without a range.
    fn literal(self) -> Option<&'static str>;

    /// Full scale value of the range, `None` for auto and default ranges.
    fn value(self) -> Option<f64> {
        self.literal().and_then(|l| l.parse::<f64>().ok())
    }

    /// Looks up the range whose full scale value equals `value`.
    fn from_value(value: f64) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| match r.value() {
            Some(v) => (v - value).abs() <= f64::EPSILON * v.abs(),
            None => false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum VoltageDcRange {
    /// Instrument default voltage range (`CONF:VOLT`)
    #[value(name = "default")]
    Default,
    #[value(name = "AUTO", alias = "auto")]
    Auto,
    #[value(name = "50E-3")]
    MilliVolt50,
    #[value(name = "500E-3")]
    MilliVolt500,
    #[value(name = "5")]
    Volt5,
    #[value(name = "50")]
    Volt50,
    #[value(name = "500")]
    Volt500,
    #[value(name = "1000")]
    Volt1000,
}

impl RangeLadder for VoltageDcRange {
    const FUNCTION: Function = Function::VoltageDc;
    const ALL: &'static [Self] = &[
        Self::Default,
        Self::Auto,
        Self::MilliVolt50,
        Self::MilliVolt500,
        Self::Volt5,
        Self::Volt50,
        Self::Volt500,
        Self::Volt1000,
    ];

    fn command(self) -> &'static str {
        match self {
            Self::Default => "CONF:VOLT",
            Self::Auto => "CONF:VOLT:DC AUTO",
            Self::MilliVolt50 => "CONF:VOLT:DC 50E-3",
            Self::MilliVolt500 => "CONF:VOLT:DC 500E-3",
            Self::Volt5 => "CONF:VOLT:DC 5",
            Self::Volt50 => "CONF:VOLT:DC 50",
            Self::Volt500 => "CONF:VOLT:DC 500",
            Self::Volt1000 => "CONF:VOLT:DC 1000",
        }
    }

    fn literal(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Auto => Some("AUTO"),
            Self::MilliVolt50 => Some("50E-3"),
            Self::MilliVolt500 => Some("500E-3"),
            Self::Volt5 => Some("5"),
            Self::Volt50 => Some("50"),
            Self::Volt500 => Some("500"),
            Self::Volt1000 => Some("1000"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum VoltageAcRange {
    #[value(name = "AUTO", alias = "auto")]
    Auto,
    #[value(name = "500E-3")]
    MilliVolt500,
    #[value(name = "5")]
    Volt5,
    #[value(name = "50")]
    Volt50,
    #[value(name = "500")]
    Volt500,
    #[value(name = "750")]
    Volt750,
}

impl RangeLadder for VoltageAcRange {
    const FUNCTION: Function = Function::VoltageAc;
    const ALL: &'static [Self] = &[
        Self::Auto,
        Self::MilliVolt500,
        Self::Volt5,
        Self::Volt50,
        Self::Volt500,
        Self::Volt750,
    ];

    fn command(self) -> &'static str {
        match self {
            Self::Auto => "CONF:VOLT:AC AUTO",
            Self::MilliVolt500 => "CONF:VOLT:AC 500E-3",
            Self::Volt5 => "CONF:VOLT:AC 5",
            Self::Volt50 => "CONF:VOLT:AC 50",
            Self::Volt500 => "CONF:VOLT:AC 500",
            Self::Volt750 => "CONF:VOLT:AC 750",
        }
    }

    fn literal(self) -> Option<&'static str> {
        match self {
            Self::Auto => Some("AUTO"),
            Self::MilliVolt500 => Some("500E-3"),
            Self::Volt5 => Some("5"),
            Self::Volt50 => Some("50"),
            Self::Volt500 => Some("500"),
            Self::Volt750 => Some("750"),
        }
    }
}

/// DC current ranges. The two highest ranges use the 10 A connector,
/// all others the 600 mA connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum CurrentDcRange {
    /// Instrument default, 5 A on the 10 A connector (`CONF:CURR`)
    #[value(name = "default")]
    Default,
    #[value(name = "500E-6")]
    MicroAmp500,
    #[value(name = "5E-3")]
    MilliAmp5,
    #[value(name = "50E-3")]
    MilliAmp50,
    #[value(name = "500E-3")]
    MilliAmp500,
    #[value(name = "5")]
    Amp5,
    #[value(name = "10")]
    Amp10,
}

impl RangeLadder for CurrentDcRange {
    const FUNCTION: Function = Function::CurrentDc;
    const ALL: &'static [Self] = &[
        Self::Default,
        Self::MicroAmp500,
        Self::MilliAmp5,
        Self::MilliAmp50,
        Self::MilliAmp500,
        Self::Amp5,
        Self::Amp10,
    ];

    fn command(self) -> &'static str {
        match self {
            Self::Default => "CONF:CURR",
            Self::MicroAmp500 => "CONF:CURR:DC 500E-6",
            Self::MilliAmp5 => "CONF:CURR:DC 5E-3",
            Self::MilliAmp50 => "CONF:CURR:DC 50E-3",
            Self::MilliAmp500 => "CONF:CURR:DC 500E-3",
            Self::Amp5 => "CONF:CURR:DC 5",
            Self::Amp10 => "CONF:CURR:DC 10",
        }
    }

    fn literal(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::MicroAmp500 => Some("500E-6"),
            Self::MilliAmp5 => Some("5E-3"),
            Self::MilliAmp50 => Some("50E-3"),
            Self::MilliAmp500 => Some("500E-3"),
            Self::Amp5 => Some("5"),
            Self::Amp10 => Some("10"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum CurrentAcRange {
    #[value(name = "AUTO", alias = "auto")]
    Auto,
    #[value(name = "500E-6")]
    MicroAmp500,
    #[value(name = "5E-3")]
    MilliAmp5,
    #[value(name = "50E-3")]
    MilliAmp50,
    #[value(name = "500E-3")]
    MilliAmp500,
    #[value(name = "5")]
    Amp5,
    #[value(name = "10")]
    Amp10,
}

impl RangeLadder for CurrentAcRange {
    const FUNCTION: Function = Function::CurrentAc;
    const ALL: &'static [Self] = &[
        Self::Auto,
        Self::MicroAmp500,
        Self::MilliAmp5,
        Self::MilliAmp50,
        Self::MilliAmp500,
        Self::Amp5,
        Self::Amp10,
    ];

    fn command(self) -> &'static str {
        match self {
            Self::Auto => "CONF:CURR:AC AUTO",
            Self::MicroAmp500 => "CONF:CURR:AC 500E-6",
            Self::MilliAmp5 => "CONF:CURR:AC 5E-3",
            Self::MilliAmp50 => "CONF:CURR:AC 50E-3",
            Self::MilliAmp500 => "CONF:CURR:AC 500E-3",
            Self::Amp5 => "CONF:CURR:AC 5",
            Self::Amp10 => "CONF:CURR:AC 10",
        }
    }

    fn literal(self) -> Option<&'static str> {
        match self {
            Self::Auto => Some("AUTO"),
            Self::MicroAmp500 => Some("500E-6"),
            Self::MilliAmp5 => Some("5E-3"),
            Self::MilliAmp50 => Some("50E-3"),
            Self::MilliAmp500 => Some("500E-3"),
            Self::Amp5 => Some("5"),
            Self::Amp10 => Some("10"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ResistanceRange {
    #[value(name = "AUTO", alias = "auto")]
    Auto,
    #[value(name = "500")]
    Ohm500,
    #[value(name = "5E3")]
    KiloOhm5,
    #[value(name = "50E3")]
    KiloOhm50,
    #[value(name = "500E3")]
    KiloOhm500,
    #[value(name = "5E6")]
    MegaOhm5,
    #[value(name = "50E6")]
    MegaOhm50,
}

impl RangeLadder for ResistanceRange {
    const FUNCTION: Function = Function::Resistance;
    const ALL: &'static [Self] = &[
        Self::Auto,
        Self::Ohm500,
        Self::KiloOhm5,
        Self::KiloOhm50,
        Self::KiloOhm500,
        Self::MegaOhm5,
        Self::MegaOhm50,
    ];

    fn command(self) -> &'static str {
        match self {
            Self::Auto => "CONF:RES AUTO",
            Self::Ohm500 => "CONF:RES 500",
            Self::KiloOhm5 => "CONF:RES 5E3",
            Self::KiloOhm50 => "CONF:RES 50E3",
            Self::KiloOhm500 => "CONF:RES 500E3",
            Self::MegaOhm5 => "CONF:RES 5E6",
            Self::MegaOhm50 => "CONF:RES 50E6",
        }
    }

    fn literal(self) -> Option<&'static str> {
        match self {
            Self::Auto => Some("AUTO"),
            Self::Ohm500 => Some("500"),
            Self::KiloOhm5 => Some("5E3"),
            Self::KiloOhm50 => Some("50E3"),
            Self::KiloOhm500 => Some("500E3"),
            Self::MegaOhm5 => Some("5E6"),
            Self::MegaOhm50 => Some("50E6"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum CapacitanceRange {
    #[value(name = "AUTO", alias = "auto")]
    Auto,
    #[value(name = "50E-9")]
    NanoFarad50,
    #[value(name = "500E-9")]
    NanoFarad500,
    #[value(name = "5E-6")]
    MicroFarad5,
    #[value(name = "50E-6")]
    MicroFarad50,
    #[value(name = "500E-6")]
    MicroFarad500,
    #[value(name = "5E-3")]
    MilliFarad5,
    #[value(name = "50E-3")]
    MilliFarad50,
}

impl RangeLadder for CapacitanceRange {
    const FUNCTION: Function = Function::Capacitance;
    const ALL: &'static [Self] = &[
        Self::Auto,
        Self::NanoFarad50,
        Self::NanoFarad500,
        Self::MicroFarad5,
        Self::MicroFarad50,
        Self::MicroFarad500,
        Self::MilliFarad5,
        Self::MilliFarad50,
    ];

    fn command(self) -> &'static str {
        match self {
            Self::Auto => "CONF:CAP AUTO",
            Self::NanoFarad50 => "CONF:CAP 50E-9",
            Self::NanoFarad500 => "CONF:CAP 500E-9",
            Self::MicroFarad5 => "CONF:CAP 5E-6",
            Self::MicroFarad50 => "CONF:CAP 50E-6",
            Self::MicroFarad500 => "CONF:CAP 500E-6",
            Self::MilliFarad5 => "CONF:CAP 5E-3",
            Self::MilliFarad50 => "CONF:CAP 50E-3",
        }
    }

    fn literal(self) -> Option<&'static str> {
        match self {
            Self::Auto => Some("AUTO"),
            Self::NanoFarad50 => Some("50E-9"),
            Self::NanoFarad500 => Some("500E-9"),
            Self::MicroFarad5 => Some("5E-6"),
            Self::MicroFarad50 => Some("50E-6"),
            Self::MicroFarad500 => Some("500E-6"),
            Self::MilliFarad5 => Some("5E-3"),
            Self::MilliFarad50 => Some("50E-3"),
        }
    }
}

/// One configuration command: function and range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Configure {
    VoltageDc(VoltageDcRange),
    VoltageAc(VoltageAcRange),
    CurrentDc(CurrentDcRange),
    CurrentAc(CurrentAcRange),
    Resistance(ResistanceRange),
    Capacitance(CapacitanceRange),
}

impl Configure {
    pub fn as_scpi(self) -> &'static str {
        match self {
            Configure::VoltageDc(r) => r.command(),
            Configure::VoltageAc(r) => r.command(),
            Configure::CurrentDc(r) => r.command(),
            Configure::CurrentAc(r) => r.command(),
            Configure::Resistance(r) => r.command(),
            Configure::Capacitance(r) => r.command(),
        }
    }

    pub fn function(self) -> Function {
        match self {
            Configure::VoltageDc(_) => Function::VoltageDc,
            Configure::VoltageAc(_) => Function::VoltageAc,
            Configure::CurrentDc(_) => Function::CurrentDc,
            Configure::CurrentAc(_) => Function::CurrentAc,
            Configure::Resistance(_) => Function::Resistance,
            Configure::Capacitance(_) => Function::Capacitance,
        }
    }

    pub fn literal(self) -> Option<&'static str> {
        match self {
            Configure::VoltageDc(r) => r.literal(),
            Configure::VoltageAc(r) => r.literal(),
            Configure::CurrentDc(r) => r.literal(),
            Configure::CurrentAc(r) => r.literal(),
            Configure::Resistance(r) => r.literal(),
            Configure::Capacitance(r) => r.literal(),
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Configure::VoltageDc(r) => r.value(),
            Configure::VoltageAc(r) => r.value(),
            Configure::CurrentDc(r) => r.value(),
            Configure::CurrentAc(r) => r.value(),
            Configure::Resistance(r) => r.value(),
            Configure::Capacitance(r) => r.value(),
        }
    }

    /// Resolves a full scale value to the catalog entry of `function`.
    pub fn from_value(function: Function, value: f64) -> Option<Self> {
        match function {
            Function::VoltageDc => VoltageDcRange::from_value(value).map(Configure::VoltageDc),
            Function::VoltageAc => VoltageAcRange::from_value(value).map(Configure::VoltageAc),
            Function::CurrentDc => CurrentDcRange::from_value(value).map(Configure::CurrentDc),
            Function::CurrentAc => CurrentAcRange::from_value(value).map(Configure::CurrentAc),
            Function::Resistance => ResistanceRange::from_value(value).map(Configure::Resistance),
            Function::Capacitance => {
                CapacitanceRange::from_value(value).map(Configure::Capacitance)
            }
        }
    }

    /// Every catalog entry, grouped by function.
    pub fn all() -> impl Iterator<Item = Configure> {
        VoltageDcRange::ALL
            .iter()
            .copied()
            .map(Configure::VoltageDc)
            .chain(VoltageAcRange::ALL.iter().copied().map(Configure::VoltageAc))
            .chain(CurrentDcRange::ALL.iter().copied().map(Configure::CurrentDc))
            .chain(CurrentAcRange::ALL.iter().copied().map(Configure::CurrentAc))
            .chain(ResistanceRange::ALL.iter().copied().map(Configure::Resistance))
            .chain(CapacitanceRange::ALL.iter().copied().map(Configure::Capacitance))
    }
}

impl fmt::Display for Configure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_scpi())
    }
}
