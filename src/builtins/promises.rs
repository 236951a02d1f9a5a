// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::instances::{get_instance, promise_type, PROMISE};
use crate::builtins::utils::receiver;
use crate::builtins::Builtin;
use crate::context::{Context, Instance, PromiseState};
use crate::types::{DataType, ParameterType};
use crate::value::IData;

use anyhow::{bail, Result};

pub fn register(m: &mut Vec<Builtin>) {
    m.push(Builtin::eager("await", PROMISE, promise_only, returns_inner, await_promise));
}

fn promise_only(data: &IData) -> Vec<ParameterType> {
    match data.ty.dereference() {
        ty @ DataType::Instance { class_name, .. } if class_name.as_ref() == PROMISE => {
            vec![receiver(ty.clone())]
        }
        _ => vec![receiver(promise_type(DataType::Unknown))],
    }
}

fn returns_inner(data: &IData, _: &[DataType]) -> DataType {
    match data.ty.dereference() {
        DataType::Instance {
            class_name,
            constructor_args,
        } if class_name.as_ref() == PROMISE => constructor_args
            .first()
            .map(|p| p.ty.clone())
            .unwrap_or(DataType::Unknown),
        _ => DataType::Unknown,
    }
}

fn await_promise(context: &Context, data: &IData, _: &[IData]) -> Result<IData> {
    match get_instance("await", context, data)? {
        Instance::Promise(PromiseState::Resolved(value)) => Ok(value),
        Instance::Promise(PromiseState::Rejected(reason)) => bail!("{reason}"),
        _ => bail!("`await` expects a Promise. Got `{data}` instead"),
    }
}
