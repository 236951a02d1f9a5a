// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Operations available on every value.

use crate::builtins::utils::{ensure_args_count, receiver, returns_boolean, returns_string, unknown_only};
use crate::builtins::Builtin;
use crate::context::Context;
use crate::narrowing::matches_type;
use crate::types::{DataType, ParameterType};
use crate::value::{IData, Value};

use anyhow::Result;

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("isEqual", "unknown", other_param, returns_boolean, is_equal));
    m.push(Builtin::eager("isTypeOf", "unknown", type_param, returns_boolean, is_type_of));
    m.push(Builtin::eager("toString", "unknown", unknown_only, returns_string, to_string));
    m.push(Builtin::eager("isUndefined", "unknown", unknown_only, returns_boolean, is_undefined));
}

fn other_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::Unknown),
        ParameterType::new("other", DataType::Unknown),
    ]
}

fn type_param(_: &IData) -> Vec<ParameterType> {
    vec![
        receiver(DataType::Unknown),
        ParameterType::new("type", DataType::Unknown),
    ]
}

fn is_equal(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    ensure_args_count("isEqual", args, 1)?;
    Ok(IData::boolean(data.to_plain_json() == args[0].to_plain_json()))
}

fn is_type_of(_: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    ensure_args_count("isTypeOf", args, 1)?;
    Ok(IData::boolean(matches_type(data, args[0].ty.dereference())))
}

fn to_string(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::string(&data.to_string()))
}

fn is_undefined(_: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    Ok(IData::boolean(matches!(data.value, Value::Undefined)))
}
