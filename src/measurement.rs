use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::proto::conv::{pretty_ts, pretty_value};

/// DC voltage and current taken back to back by one measurement sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    pub voltage_dc: f64,
    pub current_dc: f64,
    pub ts: DateTime<Utc>,
}

impl Measurement {
    pub fn new(voltage_dc: f64, current_dc: f64) -> Self {
        Self {
            voltage_dc,
            current_dc,
            ts: Utc::now(),
        }
    }

    /// Power in watts, `current × voltage`.
    pub fn power(&self) -> f64 {
        self.current_dc * self.voltage_dc
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {}  {}  {}",
            pretty_ts(&self.ts),
            pretty_value(self.voltage_dc, "V"),
            pretty_value(self.current_dc, "A"),
            pretty_value(self.power(), "W")
        )
    }
}

/// Steps of the DC voltage and current sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStep {
    SetCurrentRange,
    ReadCurrent,
    SetVoltageRange,
    ReadVoltage,
}

impl fmt::Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceStep::SetCurrentRange => f.write_str("set current range"),
            SequenceStep::ReadCurrent => f.write_str("read current"),
            SequenceStep::SetVoltageRange => f.write_str("set voltage range"),
            SequenceStep::ReadVoltage => f.write_str("read voltage"),
        }
    }
}
