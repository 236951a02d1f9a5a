// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::instances::{create_instance, get_instance};
use crate::builtins::utils::{ensure_args_count, ensure_numeric, ensure_string, receiver, returns_number, returns_string};
use crate::builtins::Builtin;
use crate::context::{Context, Instance};
use crate::types::{DataType, ParameterType};
use crate::value::IData;

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};

pub const DATE: &str = "Date";

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("getTime", DATE, date_only, returns_number, get_time));
    m.push(Builtin::eager("toISOString", DATE, date_only, returns_string, to_iso_string));
    m.push(Builtin::eager("getFullYear", DATE, date_only, returns_number, get_full_year));
    m.push(Builtin::eager("getMonth", DATE, date_only, returns_number, get_month));
    m.push(Builtin::eager("getDate", DATE, date_only, returns_number, get_date));
    m.push(Builtin::eager("getDay", DATE, date_only, returns_number, get_day));
    m.push(Builtin::eager("getHours", DATE, date_only, returns_number, get_hours));
    m.push(Builtin::eager("getMinutes", DATE, date_only, returns_number, get_minutes));
    m.push(Builtin::eager("getSeconds", DATE, date_only, returns_number, get_seconds));
    m.push(Builtin::eager("addDays", DATE, days_param, returns_date, add_days));
}

pub fn date_type() -> DataType {
    DataType::instance(DATE, vec![ParameterType::new("value", DataType::String)])
}

pub fn returns_date(_: &IData, _: &[DataType]) -> DataType {
    date_type()
}

fn date_only(_: &IData) -> Vec<ParameterType> {
    vec![receiver(date_type())]
}

fn days_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(date_type()),
        ParameterType::new("days", DataType::Number),
    ]
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC)
/// and plain dates.
pub fn parse_date(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    bail!("`{text}` is not a valid date")
}

fn format_date(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn date_data(context: &Context, dt: DateTime<Utc>) -> Result<IData> {
    create_instance(
        context,
        date_type(),
        vec![IData::string(&format_date(&dt))],
        Instance::Date(dt),
    )
}

pub fn to_date(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let text = ensure_string("toDate", data)?;
    date_data(context, parse_date(&text)?)
}

fn ensure_date(fcn: &str, context: &Context, data: &IData) -> Result<DateTime<Utc>> {
    match get_instance(fcn, context, data)? {
        Instance::Date(dt) => Ok(dt),
        _ => bail!("`{fcn}` expects a Date. Got `{data}` instead"),
    }
}

fn get_time(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("getTime", context, data)?;
    Ok(IData::number(dt.timestamp_millis() as f64))
}

fn to_iso_string(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("toISOString", context, data)?;
    Ok(IData::string(&format_date(&dt)))
}

fn get_full_year(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("getFullYear", context, data)?;
    Ok(IData::number(dt.year() as f64))
}

// Zero based, January is 0.
fn get_month(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("getMonth", context, data)?;
    Ok(IData::number(dt.month0() as f64))
}

fn get_date(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("getDate", context, data)?;
    Ok(IData::number(dt.day() as f64))
}

// Sunday is 0.
fn get_day(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("getDay", context, data)?;
    Ok(IData::number(dt.weekday().num_days_from_sunday() as f64))
}

fn get_hours(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("getHours", context, data)?;
    Ok(IData::number(dt.hour() as f64))
}

fn get_minutes(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("getMinutes", context, data)?;
    Ok(IData::number(dt.minute() as f64))
}

fn get_seconds(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    let dt = ensure_date("getSeconds", context, data)?;
    Ok(IData::number(dt.second() as f64))
}

fn add_days(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "addDays";
    ensure_args_count(name, args, 1)?;
    let dt = ensure_date(name, context, data)?;
    let days = ensure_numeric(name, &args[0])?;
    let millis = (days * 86_400_000.0).round();
    if !millis.is_finite() || millis.abs() > 8.64e15 {
        bail!("`{name}` received an out of range day count");
    }
    match dt.checked_add_signed(Duration::milliseconds(millis as i64)) {
        Some(shifted) => date_data(context, shifted),
        None => bail!("`{name}` produced a date out of range"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_formats() {
        assert!(parse_date("2024-02-29").is_ok());
        assert!(parse_date("2024-02-29T10:20:30Z").is_ok());
        assert!(parse_date("2024-02-29T10:20:30").is_ok());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn add_days_crosses_month_boundary() -> Result<()> {
        let ctx = Context::default();
        let date = to_date(&ctx, &IData::string("2024-02-28"), &[])?;
        let later = add_days(&ctx, &date, &[IData::number(2.0)])?;
        let iso = to_iso_string(&ctx, &later, &[])?;
        assert_eq!(iso.as_str(), Some("2024-03-01T00:00:00.000Z"));
        assert_eq!(get_month(&ctx, &later, &[])?.as_number(), Some(2.0));
        Ok(())
    }
}
