use std::fmt;

use super::{ProtoError, Result};

/// Parses a measurement reply as a decimal number.
///
/// Accepts an optional sign and exponent. Anything else, including an
/// empty reply and the textual infinities, is a parse error carrying the
/// raw reply.
pub fn parse_value(reply: &str) -> Result<f64> {
    let text = reply.trim();
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && !text.is_empty() => Ok(value),
        _ => Err(ProtoError::Parse {
            reply: reply.to_string(),
        }),
    }
}

/// Identity reply of `*IDN?`, e.g. `OWON,XDM1041,24150148,V3.7.2,2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl TryFrom<&str> for Ident {
    type Error = ProtoError;

    fn try_from(value: &str) -> Result<Self> {
        let values: Vec<&str> = value.trim().split(',').map(str::trim).collect();
        if values.len() >= 4 {
            Ok(Self {
                manufacturer: String::from(values[0]),
                model: String::from(values[1]),
                serial: String::from(values[2]),
                firmware: String::from(values[3]),
            })
        } else {
            Err(ProtoError::Parse {
                reply: value.to_string(),
            })
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (serial {}, firmware {})",
            self.manufacturer, self.model, self.serial, self.firmware
        )
    }
}
