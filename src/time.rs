macro_rules! time_unit {
    ($name: ident, $inner: ty) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Add,
            derive_more::Display,
            derive_more::FromStr,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name($inner);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);
            pub const MAX: $name = Self::new(<$inner>::MAX);

            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            pub const fn into_inner(self) -> $inner {
                self.0
            }

            pub const fn into_f64(self) -> f64 {
                self.0 as f64
            }
        }
    };
}

// Simulation cycles in units of the configured time base.
time_unit!(SimTime, u64);
// Absolute durations, independent of any time base.
time_unit!(Attosecs, u128);

const ATTOS_PER_SEC: u128 = 1_000_000_000_000_000_000;

/// Resolves textual durations into simulation cycles.
pub trait TimeAuthority {
    fn sim_cycles(&self, text: &str) -> Result<SimTime, TimeError>;
}

/// The default time authority: one simulation cycle equals `timebase`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeLord {
    timebase_str: String,
    timebase: Attosecs,
}

impl TimeLord {
    pub const DEFAULT_TIMEBASE: &'static str = "1ps";

    pub fn new(timebase: &str) -> Result<Self, TimeError> {
        let base = match Quantity::parse(timebase)? {
            Quantity::Period(base) => base,
            Quantity::Hertz(hz) => period_of(hz, timebase)?,
            Quantity::Events(_) => return Err(TimeError::NotATime(timebase.to_string())),
        };
        if base == Attosecs::ZERO {
            return Err(TimeError::NotATime(timebase.to_string()));
        }
        Ok(Self {
            timebase_str: timebase.to_string(),
            timebase: base,
        })
    }

    pub fn timebase(&self) -> Attosecs {
        self.timebase
    }

    pub fn timebase_str(&self) -> &str {
        &self.timebase_str
    }
}

impl Default for TimeLord {
    fn default() -> Self {
        Self {
            timebase_str: Self::DEFAULT_TIMEBASE.to_string(),
            timebase: Attosecs::new(1_000_000),
        }
    }
}

impl TimeAuthority for TimeLord {
    fn sim_cycles(&self, text: &str) -> Result<SimTime, TimeError> {
        let period = match Quantity::parse(text)? {
            Quantity::Period(period) => period,
            Quantity::Hertz(hz) => period_of(hz, text)?,
            Quantity::Events(_) => return Err(TimeError::NotATime(text.to_string())),
        };
        let base = self.timebase.into_inner();
        let cycles = period
            .into_inner()
            .checked_add(base / 2)
            .ok_or_else(|| TimeError::Overflow(text.to_string()))?
            / base;
        if cycles == 0 && period != Attosecs::ZERO {
            return Err(TimeError::BelowTimebase {
                input: text.to_string(),
                timebase: self.timebase_str.clone(),
            });
        }
        let cycles = u64::try_from(cycles).map_err(|_| TimeError::Overflow(text.to_string()))?;
        Ok(SimTime::new(cycles))
    }
}

fn period_of(hz: f64, text: &str) -> Result<Attosecs, TimeError> {
    if hz <= 0.0 {
        return Err(TimeError::NotATime(text.to_string()));
    }
    let attos = (ATTOS_PER_SEC as f64 / hz).round();
    if attos >= u128::MAX as f64 {
        return Err(TimeError::Overflow(text.to_string()));
    }
    Ok(Attosecs::new(attos as u128))
}

/// A parsed unit value: a duration, a frequency, or an event count.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Quantity {
    Period(Attosecs),
    Hertz(f64),
    Events(u64),
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::Period(Attosecs::ZERO)
    }
}

impl Quantity {
    pub fn parse(text: &str) -> Result<Self, TimeError> {
        let text = text.trim();
        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(text.len());
        let (number, unit) = (&text[..split], text[split..].trim());
        let (mantissa, scale) =
            parse_decimal(number).ok_or_else(|| TimeError::Malformed(text.to_string()))?;
        let unknown = || TimeError::UnknownUnit {
            input: text.to_string(),
            unit: unit.to_string(),
        };

        if unit == "event" || unit == "events" {
            if scale != 0 {
                return Err(TimeError::Malformed(text.to_string()));
            }
            let count =
                u64::try_from(mantissa).map_err(|_| TimeError::Overflow(text.to_string()))?;
            return Ok(Quantity::Events(count));
        }
        if let Some(prefix) = unit.strip_suffix("Hz").or_else(|| unit.strip_suffix("hz")) {
            let exp = match prefix {
                "" => 0,
                "k" => 3,
                "M" => 6,
                "G" => 9,
                "T" => 12,
                _ => return Err(unknown()),
            };
            let hz = mantissa as f64 * 10f64.powi(exp - scale as i32);
            return Ok(Quantity::Hertz(hz));
        }
        if let Some(prefix) = unit.strip_suffix('s') {
            // Exponent of the attosecond count relative to one unit of `prefix`
            let exp: u32 = match prefix {
                "" => 18,
                "m" => 15,
                "u" => 12,
                "n" => 9,
                "p" => 6,
                "f" => 3,
                "a" => 0,
                _ => return Err(unknown()),
            };
            let overflow = || TimeError::Overflow(text.to_string());
            let scaled = 10u128
                .checked_pow(exp)
                .and_then(|m| mantissa.checked_mul(m))
                .ok_or_else(overflow)?;
            let div = 10u128.checked_pow(scale).ok_or_else(overflow)?;
            let rounded = scaled.checked_add(div / 2).ok_or_else(overflow)?;
            return Ok(Quantity::Period(Attosecs::new(rounded / div)));
        }
        Err(unknown())
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Quantity::Period(p) => p == Attosecs::ZERO,
            Quantity::Hertz(hz) => hz == 0.0,
            Quantity::Events(n) => n == 0,
        }
    }
}

// "12.50" -> (1250, 2)
fn parse_decimal(number: &str) -> Option<(u128, u32)> {
    let (int, frac) = match number.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (number, ""),
    };
    if int.is_empty() && frac.is_empty() {
        return None;
    }
    let digits = format!("{int}{frac}");
    let mantissa = digits.parse::<u128>().ok()?;
    Some((mantissa, frac.len() as u32))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("malformed unit value `{0}`")]
    Malformed(String),

    #[error("unknown unit `{unit}` in `{input}`")]
    UnknownUnit { input: String, unit: String },

    #[error("`{0}` is not a duration or frequency")]
    NotATime(String),

    #[error("`{0}` does not fit the time representation")]
    Overflow(String),

    #[error("`{input}` is shorter than one cycle of the {timebase} time base")]
    BelowTimebase { input: String, timebase: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_latencies() -> anyhow::Result<()> {
        let lord = TimeLord::default();
        assert_eq!(lord.sim_cycles("1ns")?, SimTime::new(1_000));
        assert_eq!(lord.sim_cycles("2.5 us")?, SimTime::new(2_500_000));
        assert_eq!(lord.sim_cycles("1GHz")?, SimTime::new(1_000));
        assert_eq!(lord.sim_cycles("0ns")?, SimTime::ZERO);
        Ok(())
    }

    #[test]
    fn coarse_timebase_rounds() -> anyhow::Result<()> {
        let lord = TimeLord::new("1ns")?;
        assert_eq!(lord.sim_cycles("1500ps")?, SimTime::new(2));
        assert_eq!(lord.sim_cycles("1.4ns")?, SimTime::new(1));
        assert!(matches!(
            lord.sim_cycles("100ps"),
            Err(TimeError::BelowTimebase { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_bad_units() {
        let lord = TimeLord::default();
        assert!(matches!(lord.sim_cycles("10"), Err(TimeError::UnknownUnit { .. })));
        assert!(matches!(lord.sim_cycles("10 parsecs"), Err(TimeError::UnknownUnit { .. })));
        assert!(matches!(lord.sim_cycles("ns"), Err(TimeError::Malformed(_))));
        assert!(matches!(lord.sim_cycles("5 events"), Err(TimeError::NotATime(_))));
    }

    #[test]
    fn quantities() -> anyhow::Result<()> {
        assert_eq!(Quantity::parse("100 events")?, Quantity::Events(100));
        assert_eq!(Quantity::parse("2kHz")?, Quantity::Hertz(2_000.0));
        assert_eq!(
            Quantity::parse("10ms")?,
            Quantity::Period(Attosecs::new(10_000_000_000_000_000))
        );
        assert!(Quantity::parse("0ns")?.is_zero());
        Ok(())
    }

    #[test]
    fn huge_values_overflow() {
        let lord = TimeLord::default();
        assert!(matches!(
            lord.sim_cycles("340282366920938463463374607431768211455as"),
            Err(TimeError::Overflow(_))
        ));
        assert!(matches!(
            Quantity::parse("34028236692093846346337460743176821145.5as"),
            Err(TimeError::Overflow(_))
        ));
        // Fits in attoseconds but not in 64-bit cycles
        assert!(matches!(
            lord.sim_cycles("100000000s"),
            Err(TimeError::Overflow(_))
        ));
    }
}
