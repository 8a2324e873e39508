use core::fmt;
use core::str::FromStr;

use crate::error::PanelError;

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;

/// Sampling frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Minutes(u32),
    Hours(u32),
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// Infers the frequency from the median positive spacing of `timestamps`
    /// (epoch seconds, ascending). `None` with fewer than two distinct points.
    pub fn infer(timestamps: &[i64]) -> Option<Self> {
        let mut gaps: Vec<i64> = timestamps
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|d| *d > 0)
            .collect();
        if gaps.is_empty() {
            return None;
        }
        gaps.sort_unstable();
        Some(Self::from_spacing(gaps[gaps.len() / 2]))
    }

    fn from_spacing(secs: i64) -> Self {
        if secs < HOUR {
            Frequency::Minutes(((secs + MINUTE / 2) / MINUTE).max(1) as u32)
        } else if secs < DAY {
            Frequency::Hours(((secs + HOUR / 2) / HOUR).max(1) as u32)
        } else if secs < 5 * DAY {
            Frequency::Daily
        } else if secs < 20 * DAY {
            Frequency::Weekly
        } else if secs < 60 * DAY {
            Frequency::Monthly
        } else if secs < 200 * DAY {
            Frequency::Quarterly
        } else {
            Frequency::Yearly
        }
    }

    /// Nominal spacing in seconds.
    pub fn as_secs(&self) -> i64 {
        match self {
            Frequency::Minutes(n) => *n as i64 * MINUTE,
            Frequency::Hours(n) => *n as i64 * HOUR,
            Frequency::Daily => DAY,
            Frequency::Weekly => 7 * DAY,
            Frequency::Monthly => 30 * DAY,
            Frequency::Quarterly => 91 * DAY,
            Frequency::Yearly => 365 * DAY,
        }
    }

    /// Number of observations in one seasonal cycle: the day for intraday
    /// data, the week for daily data, the year above that.
    pub fn seasonal_period(&self) -> Option<usize> {
        let period = match self {
            Frequency::Minutes(n) => (1_440 / (*n).max(1)) as usize,
            Frequency::Hours(n) => (24 / (*n).max(1)) as usize,
            Frequency::Daily => 7,
            Frequency::Weekly => 52,
            Frequency::Monthly => 12,
            Frequency::Quarterly => 4,
            Frequency::Yearly => return None,
        };
        (period >= 2).then_some(period)
    }
}

impl FromStr for Frequency {
    type Err = PanelError;

    /// Accepts `5min`, `min`, `1h`, `h`, `d`, `1d`, `w`, `m` (month), `q`, `y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let digits_end = raw
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(raw.len());
        let n: u32 = if digits_end == 0 {
            1
        } else {
            raw[..digits_end]
                .parse()
                .map_err(|_| PanelError::UnknownFrequency(s.to_string()))?
        };
        if n == 0 {
            return Err(PanelError::UnknownFrequency(s.to_string()));
        }
        let freq = match (&raw[digits_end..], n) {
            ("min", n) => Frequency::Minutes(n),
            ("h", n) => Frequency::Hours(n),
            ("d", 1) => Frequency::Daily,
            ("w", 1) => Frequency::Weekly,
            ("m", 1) => Frequency::Monthly,
            ("q", 1) => Frequency::Quarterly,
            ("y", 1) => Frequency::Yearly,
            _ => return Err(PanelError::UnknownFrequency(s.to_string())),
        };
        Ok(freq)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Minutes(n) => write!(f, "{n}min"),
            Frequency::Hours(n) => write!(f, "{n}h"),
            Frequency::Daily => f.write_str("d"),
            Frequency::Weekly => f.write_str("w"),
            Frequency::Monthly => f.write_str("m"),
            Frequency::Quarterly => f.write_str("q"),
            Frequency::Yearly => f.write_str("y"),
        }
    }
}
