// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::types::{DataType, ParameterType};
use crate::value::{IData, Statement, Value};
use crate::Rc;

use anyhow::{bail, Result};
use indexmap::IndexMap;

pub fn ensure_args_count(fcn: &str, args: &[IData], expected: usize) -> Result<()> {
    if args.len() < expected {
        if expected == 1 {
            bail!("`{fcn}` expects 1 argument")
        } else {
            bail!("`{fcn}` expects {expected} arguments")
        }
    }
    Ok(())
}

pub fn ensure_lazy_args_count(fcn: &str, args: &[Statement], expected: usize) -> Result<()> {
    if args.len() < expected {
        bail!("`{fcn}` expects {expected} arguments")
    }
    Ok(())
}

pub fn ensure_numeric(fcn: &str, v: &IData) -> Result<f64> {
    Ok(match &v.value {
        Value::Number(n) => *n,
        _ => bail!("`{fcn}` expects numeric argument. Got `{v}` instead"),
    })
}

pub fn ensure_integer(fcn: &str, v: &IData) -> Result<i64> {
    let n = ensure_numeric(fcn, v)?;
    if n.fract() != 0.0 || !n.is_finite() {
        bail!("`{fcn}` expects integer argument. Got `{v}` instead")
    }
    Ok(n as i64)
}

pub fn ensure_string(fcn: &str, v: &IData) -> Result<Rc<str>> {
    Ok(match &v.value {
        Value::String(s) => s.clone(),
        _ => bail!("`{fcn}` expects string argument. Got `{v}` instead"),
    })
}

pub fn ensure_bool(fcn: &str, v: &IData) -> Result<bool> {
    Ok(match &v.value {
        Value::Boolean(b) => *b,
        _ => bail!("`{fcn}` expects boolean argument. Got `{v}` instead"),
    })
}

pub fn ensure_array(fcn: &str, v: &IData) -> Result<Rc<Vec<Statement>>> {
    Ok(match &v.value {
        Value::Array(a) => a.clone(),
        _ => bail!("`{fcn}` expects array argument. Got `{v}` instead"),
    })
}

pub fn ensure_object(fcn: &str, v: &IData) -> Result<Rc<IndexMap<Rc<str>, Statement>>> {
    Ok(match &v.value {
        Value::Object(o) => o.clone(),
        _ => bail!("`{fcn}` expects object argument. Got `{v}` instead"),
    })
}

pub fn ensure_operation<'a>(fcn: &str, v: &'a IData) -> Result<&'a IData> {
    match &v.value {
        Value::Operation(_) => Ok(v),
        _ => bail!("`{fcn}` expects operation argument. Got `{v}` instead"),
    }
}

/// Argument `idx` unless it was omitted or is `undefined`.
pub fn optional_arg(args: &[IData], idx: usize) -> Option<&IData> {
    args.get(idx)
        .filter(|a| !matches!(a.value, Value::Undefined))
}

/// Converts a possibly negative relative index into an absolute one clamped
/// to `0..=len`.
pub fn relative_index(idx: f64, len: usize) -> usize {
    let len = len as f64;
    let idx = idx.trunc();
    let abs = if idx < 0.0 { (len + idx).max(0.0) } else { idx.min(len) };
    abs as usize
}

/// Elements of an array value as data.
pub fn elements(array: &[Statement]) -> Vec<IData> {
    array.iter().map(|s| s.data.clone()).collect()
}

pub fn receiver(ty: DataType) -> ParameterType {
    ParameterType::receiver(ty)
}

pub fn receiver_type(data: &IData) -> DataType {
    data.ty.dereference().clone()
}

pub fn element_type_of(data: &IData) -> DataType {
    data.ty.element_type().unwrap_or(DataType::Unknown)
}

// Result type helpers shared by the tables.

pub fn returns_string(_: &IData, _: &[DataType]) -> DataType {
    DataType::String
}

pub fn returns_number(_: &IData, _: &[DataType]) -> DataType {
    DataType::Number
}

pub fn returns_boolean(_: &IData, _: &[DataType]) -> DataType {
    DataType::Boolean
}

pub fn returns_unknown(_: &IData, _: &[DataType]) -> DataType {
    DataType::Unknown
}

pub fn returns_receiver(data: &IData, _: &[DataType]) -> DataType {
    receiver_type(data)
}

pub fn returns_string_array(_: &IData, _: &[DataType]) -> DataType {
    DataType::array(DataType::String)
}

// Parameter helpers shared by the tables.

pub fn unknown_only(_: &IData) -> Vec<ParameterType> {
    vec![receiver(DataType::Unknown)]
}

pub fn string_only(_: &IData) -> Vec<ParameterType> {
    vec![receiver(DataType::String)]
}

pub fn number_only(_: &IData) -> Vec<ParameterType> {
    vec![receiver(DataType::Number)]
}

pub fn array_only(_: &IData) -> Vec<ParameterType> {
    vec![receiver(DataType::array(DataType::Unknown))]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_indices() {
        assert_eq!(relative_index(1.0, 5), 1);
        assert_eq!(relative_index(-1.0, 5), 4);
        assert_eq!(relative_index(-10.0, 5), 0);
        assert_eq!(relative_index(10.0, 5), 5);
    }

    #[test]
    fn ensure_messages_name_the_operation() {
        let err = ensure_numeric("add", &IData::string("x")).err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("`add` expects numeric argument. Got `x` instead")
        );
    }
}
