//! Money and date codec for OFX wire values.
//!
//! Amounts are signed decimals (`-1234.56`, `+5`, `.5`, `12,50`) converted to
//! fixed-point minor units. Dates use the compact OFX form
//! `YYYYMMDD[HHMM[SS[.fff]]][[offset:TZ]]`, where the bracketed offset is in
//! (possibly fractional) hours.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone as _};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive as _;

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::models::{Amount, DEFAULT_FRACTION_DIGITS};
use crate::protocol::OfxResponse;

/// Seconds per hour, for converting bracketed offsets.
const SECONDS_PER_HOUR: i64 = 3_600;

/// Parses a wire amount into minor units using two fractional digits.
///
/// # Errors
///
/// Returns [`LedgerError::MalformedAmount`] if `text` is not a signed decimal.
#[inline]
pub fn parse_amount(text: &str) -> Result<Amount> {
    parse_amount_scaled(text, DEFAULT_FRACTION_DIGITS)
}

/// Parses a wire amount into minor units with the given scale.
///
/// Excess precision is rounded half away from zero.
///
/// # Errors
///
/// Returns [`LedgerError::MalformedAmount`] if `text` is not a signed decimal
/// or the scaled value does not fit in an [`Amount`].
#[inline]
pub fn parse_amount_scaled(text: &str, fraction_digits: u32) -> Result<Amount> {
    parse_decimal(text)
        .and_then(|value| Amount::from_decimal(value, fraction_digits))
        .ok_or_else(|| LedgerError::MalformedAmount {
            text: text.to_owned(),
        })
}

/// Parses a compact OFX date-time.
///
/// A missing time of day means midnight. A missing bracketed offset means
/// `default_offset`.
///
/// # Errors
///
/// Returns [`LedgerError::MalformedDate`] if `text` is structurally invalid or
/// names a date or time that does not exist.
#[inline]
pub fn parse_instant(text: &str, default_offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    parse_instant_inner(text, default_offset).ok_or_else(|| LedgerError::MalformedDate {
        text: text.to_owned(),
    })
}

/// Returns the bracketed offset of a date-time, if it has a valid one.
///
/// Used to pick up the institution's declared offset from `DTSERVER`.
#[inline]
#[must_use]
pub fn declared_offset(text: &str) -> Option<FixedOffset> {
    let (_, zone) = text.split_once('[')?;
    parse_zone(zone.trim_end().strip_suffix(']')?)
}

/// Codec settings for one response: scale plus the offset to assume for
/// dates without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    /// Minor-unit scale.
    fraction_digits: u32,
    /// Offset for dates that carry none.
    default_offset: FixedOffset,
}

impl Codec {
    /// Creates a codec with explicit settings.
    #[inline]
    #[must_use]
    pub const fn new(fraction_digits: u32, default_offset: FixedOffset) -> Self {
        Self {
            fraction_digits,
            default_offset,
        }
    }

    /// Creates the codec for one response.
    ///
    /// The offset declared in the signon `DTSERVER` wins over the configured
    /// default.
    #[inline]
    #[must_use]
    pub fn for_response(config: &Config, response: &OfxResponse) -> Self {
        let offset = response
            .server_time()
            .and_then(declared_offset)
            .unwrap_or_else(|| config.default_offset());
        Self::new(config.fraction_digits, offset)
    }

    /// Returns the minor-unit scale.
    #[inline]
    #[must_use]
    pub const fn fraction_digits(&self) -> u32 {
        self.fraction_digits
    }

    /// Returns the offset assumed for dates without one.
    #[inline]
    #[must_use]
    pub const fn default_offset(&self) -> FixedOffset {
        self.default_offset
    }

    /// Parses a wire amount.
    ///
    /// # Errors
    ///
    /// See [`parse_amount_scaled`].
    #[inline]
    pub fn amount(&self, text: &str) -> Result<Amount> {
        parse_amount_scaled(text, self.fraction_digits)
    }

    /// Parses a wire date-time.
    ///
    /// # Errors
    ///
    /// See [`parse_instant`].
    #[inline]
    pub fn instant(&self, text: &str) -> Result<DateTime<FixedOffset>> {
        parse_instant(text, self.default_offset)
    }
}

impl Default for Codec {
    #[inline]
    fn default() -> Self {
        let config = Config::default();
        Self::new(config.fraction_digits, config.default_offset())
    }
}

/// Parses `[+|-]digits[(.|,)digits]` with at least one digit.
fn parse_decimal(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, fraction) = unsigned.split_once(['.', ',']).unwrap_or((unsigned, ""));
    let is_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return None;
    }

    let canonical = format!(
        "{}.{}",
        if whole.is_empty() { "0" } else { whole },
        if fraction.is_empty() { "0" } else { fraction },
    );
    let magnitude = Decimal::from_str_exact(&canonical).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parses the inside of a bracketed zone, e.g. `-5:EST` or `+5.5`.
fn parse_zone(zone: &str) -> Option<FixedOffset> {
    let hours = zone.split_once(':').map_or(zone, |(hours, _name)| hours);
    let seconds = (parse_decimal(hours)? * Decimal::from(SECONDS_PER_HOUR))
        .round()
        .to_i32()?;
    FixedOffset::east_opt(seconds)
}

/// Parses a compact date-time, returning `None` on any structural problem.
fn parse_instant_inner(text: &str, default_offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let trimmed = text.trim();
    let (stamp, offset) = match trimmed.split_once('[') {
        Some((stamp, zone)) => (stamp.trim_end(), parse_zone(zone.strip_suffix(']')?)?),
        None => (trimmed, default_offset),
    };

    let (digits, fraction) = match stamp.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (stamp, None),
    };
    if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let field = |from: usize, to: usize| digits.get(from..to)?.parse::<u32>().ok();

    let (hour, minute, second) = match digits.len() {
        8 => (0, 0, 0),
        12 => (field(8, 10)?, field(10, 12)?, 0),
        14 => (field(8, 10)?, field(10, 12)?, field(12, 14)?),
        _ => return None,
    };
    let nanos = match fraction {
        None => 0,
        Some(fraction)
            if digits.len() == 14
                && (1..=9).contains(&fraction.len())
                && fraction.bytes().all(|byte| byte.is_ascii_digit()) =>
        {
            format!("{fraction:0<9}").parse::<u32>().ok()?
        }
        Some(_) => return None,
    };

    let year = i32::try_from(field(0, 4)?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 6)?, field(6, 8)?)?;
    let local = date.and_hms_nano_opt(hour, minute, second, nanos)?;
    offset.from_local_datetime(&local).single()
}
