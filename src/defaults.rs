// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::types::{DataType, ParameterType};
use crate::value::{
    create_entity_id, ConditionValue, ErrorValue, IData, InstanceValue, OperationValue, Statement,
    Value,
};
use crate::Rc;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValueOptions {
    /// Populate optional object properties too.
    pub include_optional_properties: bool,
}

/// Canonical value of `ty`.
pub fn create_default_value(ty: &DataType, options: &DefaultValueOptions) -> Value {
    match ty.dereference() {
        DataType::Unknown | DataType::Never | DataType::Undefined => Value::Undefined,
        DataType::String => Value::String("".into()),
        DataType::Number => Value::Number(0.0),
        DataType::Boolean => Value::Boolean(false),
        DataType::Array { element_type } => {
            let items = match element_type.as_ref() {
                DataType::Unknown | DataType::Never => vec![],
                element => vec![default_statement(element, options)],
            };
            Value::Array(Rc::new(items))
        }
        DataType::Tuple { elements } => Value::Array(Rc::new(
            elements
                .iter()
                .map(|e| default_statement(e, options))
                .collect(),
        )),
        DataType::Object {
            properties,
            required,
        } => Value::Object(Rc::new(
            properties
                .iter()
                .filter(|(name, _)| options.include_optional_properties || required.contains(name))
                .map(|(name, t)| (name.clone(), default_statement(t, options)))
                .collect(),
        )),
        DataType::Dictionary { element_type } => {
            let mut entries = IndexMap::new();
            if !matches!(element_type.as_ref(), DataType::Unknown | DataType::Never) {
                entries.insert(Rc::from("key"), default_statement(element_type, options));
            }
            Value::Object(Rc::new(entries))
        }
        DataType::Union {
            types,
            active_index,
        } => {
            let member = active_index
                .and_then(|idx| types.get(idx))
                .or_else(|| types.iter().find(|t| !matches!(t, DataType::Undefined)))
                .or_else(|| types.first());
            match member {
                Some(member) => create_default_value(member, options),
                None => Value::Undefined,
            }
        }
        DataType::Operation { parameters, .. } => Value::Operation(OperationValue {
            name: None,
            parameters: Rc::new(
                parameters
                    .iter()
                    .map(|p| default_parameter(p, options))
                    .collect(),
            ),
            statements: Rc::default(),
        }),
        DataType::Condition { result } => Value::Condition(Rc::new(ConditionValue {
            condition: default_statement(&DataType::Boolean, options),
            true_branch: default_statement(result, options),
            false_branch: default_statement(result, options),
        })),
        DataType::Reference { .. } => Value::Undefined,
        DataType::Error { error_type } => Value::Error(ErrorValue {
            reason: error_type.default_reason().into(),
        }),
        DataType::Instance {
            class_name,
            constructor_args,
        } => Value::Instance(InstanceValue {
            class_name: class_name.clone(),
            constructor_args: Rc::new(
                constructor_args
                    .iter()
                    .map(|p| default_parameter(p, options))
                    .collect(),
            ),
            instance_id: create_entity_id(),
        }),
    }
}

/// Default data of `ty`. References are replaced by their data type.
pub fn create_default_data(ty: &DataType, options: &DefaultValueOptions) -> IData {
    let ty = ty.dereference().clone();
    let value = create_default_value(&ty, options);
    IData::new(ty, value)
}

fn default_statement(ty: &DataType, options: &DefaultValueOptions) -> Statement {
    Statement::new(create_default_data(ty, options))
}

fn default_parameter(parameter: &ParameterType, options: &DefaultValueOptions) -> Statement {
    let mut statement = default_statement(&parameter.ty, options);
    statement.name = parameter.name.clone();
    statement.is_optional = parameter.is_optional;
    statement
}
