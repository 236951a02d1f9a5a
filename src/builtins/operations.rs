// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_operation, receiver};
use crate::builtins::Builtin;
use crate::context::Context;
use crate::interpreter::call_operation;
use crate::types::{DataType, ParameterType};
use crate::value::IData;

use anyhow::Result;

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("call", "operation", own_params, own_result, call));
}

// `call` takes whatever the receiving operation takes.
fn own_params(data: &IData) -> Vec<ParameterType> {
    match data.ty.dereference() {
        ty @ DataType::Operation { parameters, .. } => {
            let mut params = vec![receiver(ty.clone())];
            params.extend(parameters.iter().cloned());
            params
        }
        _ => vec![receiver(DataType::operation(vec![], DataType::Unknown))],
    }
}

fn own_result(data: &IData, _: &[DataType]) -> DataType {
    match data.ty.dereference() {
        DataType::Operation { result, .. } => result.as_ref().clone(),
        _ => DataType::Unknown,
    }
}

fn call(context: &Context, data: &IData, args: &[IData]) -> Result<IData> {
    let operation = ensure_operation("call", data)?;
    Ok(call_operation(context, operation, args.to_vec()))
}
