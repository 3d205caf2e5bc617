use chrono::{DateTime, Local, Utc};

pub fn unit_prefix(unit_multiplier: i16) -> &'static str {
    match unit_multiplier {
        -12 => "p",
        -9 => "n",
        -6 => "u",
        -3 => "m",
        0 => "",
        3 => "k",
        6 => "M",
        9 => "G",
        12 => "T",
        _ => "?",
    }
}

/// Splits `value` into a mantissa in `[1, 1000)` and a multiplier that is a
/// multiple of three.
pub fn engineering(value: f64) -> (f64, i16) {
    if value == 0.0 || !value.is_finite() {
        return (value, 0);
    }
    let exp = value.abs().log10().floor() as i16;
    let multiplier = (exp.div_euclid(3) * 3).clamp(-12, 12);
    (value / 10f64.powi(multiplier as i32), multiplier)
}

/// Formats a value with engineering prefix, e.g. `12.500 mA`.
pub fn pretty_value(value: f64, unit: &str) -> String {
    let (mantissa, multiplier) = engineering(value);
    format!("{:.3} {}{}", mantissa, unit_prefix(multiplier), unit)
}

pub fn pretty_ts(&ts: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = ts.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}
