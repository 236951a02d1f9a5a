// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{
    ensure_args_count, ensure_integer, ensure_numeric, number_only, receiver, returns_boolean,
    returns_number, returns_string,
};
use crate::builtins::Builtin;
use crate::context::Context;
use crate::types::{DataType, ParameterType};
use crate::value::IData;

use anyhow::{bail, Result};

// Ranges longer than this are refused.
const MAX_RANGE_LEN: f64 = 1_000_000.0;

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("add", "number", one_number, returns_number, add));
    m.push(Builtin::eager("subtract", "number", one_number, returns_number, subtract));
    m.push(Builtin::eager("multiply", "number", one_number, returns_number, multiply));
    m.push(Builtin::eager("divide", "number", one_number, returns_number, divide));
    m.push(Builtin::eager("mod", "number", one_number, returns_number, modulo));
    m.push(Builtin::eager("power", "number", one_number, returns_number, power));
    m.push(Builtin::eager("min", "number", one_number, returns_number, min));
    m.push(Builtin::eager("max", "number", one_number, returns_number, max));
    m.push(Builtin::eager("abs", "number", number_only, returns_number, abs));
    m.push(Builtin::eager("floor", "number", number_only, returns_number, floor));
    m.push(Builtin::eager("ceil", "number", number_only, returns_number, ceil));
    m.push(Builtin::eager("round", "number", number_only, returns_number, round));
    m.push(Builtin::eager("lessThan", "number", one_number, returns_boolean, less_than));
    m.push(Builtin::eager("lessThanOrEqual", "number", one_number, returns_boolean, less_than_or_equal));
    m.push(Builtin::eager("greaterThan", "number", one_number, returns_boolean, greater_than));
    m.push(Builtin::eager("greaterThanOrEqual", "number", one_number, returns_boolean, greater_than_or_equal));
    m.push(Builtin::eager("toRange", "number", end_param, returns_number_array, to_range));
    m.push(Builtin::eager("toFixed", "number", digits_param, returns_string, to_fixed));
}

fn one_number(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::Number),
        ParameterType::new("value", DataType::Number),
    ]
}

fn end_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::Number),
        ParameterType::new("end", DataType::Number),
    ]
}

fn digits_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::Number),
        ParameterType::new("digits", DataType::Number),
    ]
}

fn returns_number_array(_: &IData, _: &[DataType]) -> DataType {
    DataType::array(DataType::Number)
}

fn operands(name: &str, data: &IData, args: &[IData]) -> Result<(f64, f64)> {
    ensure_args_count(name, args, 1)?;
    Ok((ensure_numeric(name, data)?, ensure_numeric(name, &args[0])?))
}

fn add(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("add", data, args)?;
    Ok(IData::number(v1 + v2))
}

fn subtract(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("subtract", data, args)?;
    Ok(IData::number(v1 - v2))
}

fn multiply(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("multiply", data, args)?;
    Ok(IData::number(v1 * v2))
}

fn divide(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("divide", data, args)?;
    if v2 == 0.0 {
        bail!("Division by zero");
    }
    Ok(IData::number(v1 / v2))
}

fn modulo(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("mod", data, args)?;
    if v2 == 0.0 {
        bail!("Modulo by zero");
    }
    Ok(IData::number(v1 % v2))
}

fn power(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("power", data, args)?;
    Ok(IData::number(v1.powf(v2)))
}

fn min(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("min", data, args)?;
    Ok(IData::number(v1.min(v2)))
}

fn max(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("max", data, args)?;
    Ok(IData::number(v1.max(v2)))
}

fn abs(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::number(ensure_numeric("abs", data)?.abs()))
}

fn floor(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::number(ensure_numeric("floor", data)?.floor()))
}

fn ceil(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::number(ensure_numeric("ceil", data)?.ceil()))
}

// Halves round towards positive infinity.
fn round(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::number((ensure_numeric("round", data)? + 0.5).floor()))
}

fn less_than(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("lessThan", data, args)?;
    Ok(IData::boolean(v1 < v2))
}

fn less_than_or_equal(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("lessThanOrEqual", data, args)?;
    Ok(IData::boolean(v1 <= v2))
}

fn greater_than(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("greaterThan", data, args)?;
    Ok(IData::boolean(v1 > v2))
}

fn greater_than_or_equal(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let (v1, v2) = operands("greaterThanOrEqual", data, args)?;
    Ok(IData::boolean(v1 >= v2))
}

/// Integers from the receiver towards `end`, end excluded. Descends when
/// the receiver is larger.
fn to_range(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "toRange";
    let (start, end) = operands(name, data, args)?;
    if !start.is_finite() || !end.is_finite() {
        bail!("`{name}` expects finite bounds");
    }
    if (end - start).abs() > MAX_RANGE_LEN {
        bail!("`{name}` range is too large");
    }
    let incr = if end >= start { 1.0 } else { -1.0 };

    let mut values = vec![];
    let mut v = start;
    while (incr > 0.0 && v < end) || (incr < 0.0 && v > end) {
        values.push(IData::number(v));
        v += incr;
    }
    Ok(IData::array(values, DataType::Number))
}

fn to_fixed(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let name = "toFixed";
    ensure_args_count(name, args, 1)?;
    let n = ensure_numeric(name, data)?;
    let digits = ensure_integer(name, &args[0])?;
    if !(0..=100).contains(&digits) {
        bail!("`{name}` digits must be between 0 and 100");
    }
    Ok(IData::string(&format!("{:.*}", digits as usize, n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: f64, end: f64) -> Vec<f64> {
        let r = to_range(&Context::default(), &IData::number(start), &[IData::number(end)]);
        r.ok()
            .and_then(|d| d.as_array().cloned())
            .map(|a| a.iter().filter_map(|s| s.data.as_number()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn ranges() {
        assert_eq!(range(1.0, 4.0), vec![1.0, 2.0, 3.0]);
        assert_eq!(range(5.0, 1.0), vec![5.0, 4.0, 3.0, 2.0]);
        assert!(range(2.0, 2.0).is_empty());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        for x in [0.0, 1.0, -3.5, f64::INFINITY] {
            let ctx = Context::default();
            assert!(divide(&ctx, &IData::number(x), &[IData::number(0.0)]).is_err());
            assert!(modulo(&ctx, &IData::number(x), &[IData::number(0.0)]).is_err());
        }
    }

    #[test]
    fn fixed_digits() {
        let r = to_fixed(&Context::default(), &IData::number(1.23456), &[IData::number(2.0)]);
        assert_eq!(r.ok().and_then(|d| d.as_str().map(str::to_string)), Some("1.23".to_string()));
    }
}
