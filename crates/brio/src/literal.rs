//! Canonical literal forms handled by the runtime: `@"YYYY-MM-DD"` dates,
//! `@"HH:MM:SS[.mmm]"` times, date-times with a space or `T` separator, and
//! `@"$[-]D.CC"` money in the default currency. The lexer strips the sigil
//! and quotes; the runtime parses the body.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::diagnostics::RuntimeError;
use crate::values::{DateTimeValue, DateValue, MoneyValue, TimeValue, MONEY_SCALE};

pub fn parse_date(text: &str) -> Result<DateValue, RuntimeError> {
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| {
        RuntimeError::InvalidValue(format!("\"{text}\" is not a date literal"))
    })?;
    Ok(DateValue::from_naive(date))
}

pub fn parse_time(text: &str) -> Result<TimeValue, RuntimeError> {
    let time = NaiveTime::parse_from_str(text, "%H:%M:%S%.3f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .map_err(|_| RuntimeError::InvalidValue(format!("\"{text}\" is not a time literal")))?;
    Ok(time_value(time))
}

pub fn parse_date_time(text: &str) -> Result<DateTimeValue, RuntimeError> {
    let parsed = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.3f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.3f"))
        .map_err(|_| {
            RuntimeError::InvalidValue(format!("\"{text}\" is not a date-time literal"))
        })?;
    Ok(DateTimeValue {
        date: DateValue::from_naive(parsed.date()),
        time: time_value(parsed.time()),
    })
}

/// Parses `$[-]D.CC`. Fractional digits beyond two are truncated toward
/// zero before scaling to sub-units; the sign applies to the whole amount.
pub fn parse_money(text: &str, default_currency: &str) -> Result<MoneyValue, RuntimeError> {
    let Some(body) = text.strip_prefix('$') else {
        return Err(RuntimeError::InvalidValue(format!(
            "\"{text}\" is not a money literal"
        )));
    };
    let decimal: Decimal = body.parse().map_err(|_| {
        RuntimeError::InvalidValue(format!("\"{text}\" is not a money literal"))
    })?;
    let amount = decimal
        .trunc_with_scale(2)
        .checked_mul(Decimal::from(MONEY_SCALE))
        .and_then(|scaled| scaled.to_i64())
        .ok_or_else(|| {
            RuntimeError::InvalidValue(format!("money literal \"{text}\" overflows"))
        })?;
    Ok(MoneyValue {
        amount,
        currency: default_currency.to_string(),
    })
}

pub fn format_date(date: DateValue) -> String {
    if date.year < 0 {
        format!("-{:04}-{:02}-{:02}", -date.year, date.month, date.day)
    } else {
        format!("{:04}-{:02}-{:02}", date.year, date.month, date.day)
    }
}

pub fn format_time(time: TimeValue) -> String {
    if time.millisecond == 0 {
        format!("{:02}:{:02}:{:02}", time.hour, time.minute, time.second)
    } else {
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            time.hour, time.minute, time.second, time.millisecond
        )
    }
}

pub fn format_date_time(value: DateTimeValue) -> String {
    format!("{} {}", format_date(value.date), format_time(value.time))
}

/// Renders money at two display digits; the stored scale stays 10,000.
pub fn format_money(money: &MoneyValue) -> String {
    let display = Decimal::new(money.amount, 4).round_dp(2);
    format!("${display:.2} {}", money.currency)
}

fn time_value(time: NaiveTime) -> TimeValue {
    // Leap-second nanos exceed 999ms; clamp into the stored range.
    let millisecond = (time.nanosecond() / 1_000_000).min(999);
    TimeValue {
        hour: time.hour(),
        minute: time.minute(),
        second: time.second(),
        millisecond,
    }
}
