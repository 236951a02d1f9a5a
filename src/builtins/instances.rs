// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bridges between serializable instance values and the opaque objects kept
//! in the execution store.

use crate::context::{Context, Instance};
use crate::types::{DataType, ParameterType};
use crate::value::{create_entity_id, IData, InstanceValue, Statement, Value};
use crate::Rc;

use anyhow::{bail, Result};

pub const PROMISE: &str = "Promise";

pub fn promise_type(inner: DataType) -> DataType {
    DataType::instance(PROMISE, vec![ParameterType::new("value", inner)])
}

/// Wraps `instance` in a fresh instance value and registers it.
pub fn create_instance(
    context: &Context,
    ty: DataType,
    constructor_args: Vec<IData>,
    instance: Instance,
) -> Result<IData> {
    let class_name = match &ty {
        DataType::Instance { class_name, .. } => class_name.clone(),
        _ => bail!("`{ty}` is not an instance type"),
    };
    let value = InstanceValue {
        class_name,
        constructor_args: Rc::new(constructor_args.into_iter().map(Statement::new).collect()),
        instance_id: create_entity_id(),
    };
    context.store.set_instance(&value.instance_id, instance);
    Ok(IData::new(ty, Value::Instance(value)))
}

/// Rebuilds the external object of `value` from its constructor arguments.
pub fn materialize(value: &InstanceValue) -> Result<Instance> {
    let first_arg = value
        .constructor_args
        .first()
        .and_then(|s| s.data.as_str().map(|s| s.to_string()));
    Ok(match (&*value.class_name, first_arg) {
        #[cfg(feature = "date")]
        (crate::builtins::dates::DATE, Some(text)) => {
            Instance::Date(crate::builtins::dates::parse_date(&text)?)
        }
        #[cfg(feature = "url")]
        (crate::builtins::urls::URL, Some(href)) => {
            Instance::Url(crate::builtins::urls::parse_url(&href)?)
        }
        #[cfg(feature = "http")]
        (crate::builtins::http::HTTP, _) => Instance::Http,
        (class_name, _) => bail!("cannot construct an instance of `{class_name}`"),
    })
}

/// Ensures the object behind `data` is present in the store.
pub fn ensure_materialized(context: &Context, data: &IData) -> Result<()> {
    if let Value::Instance(value) = &data.value {
        if context.store.get_instance(&value.instance_id).is_none() {
            let instance = materialize(value)?;
            context.store.set_instance(&value.instance_id, instance);
        }
    }
    Ok(())
}

/// The external object behind `data`.
pub fn get_instance(fcn: &str, context: &Context, data: &IData) -> Result<Instance> {
    let Value::Instance(value) = &data.value else {
        bail!("`{fcn}` expects instance argument. Got `{data}` instead");
    };
    match context.store.get_instance(&value.instance_id) {
        Some(instance) => Ok(instance),
        None => {
            let instance = materialize(value)?;
            context.store.set_instance(&value.instance_id, instance.clone());
            Ok(instance)
        }
    }
}
