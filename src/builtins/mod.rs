// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod arrays;
pub mod booleans;
#[cfg(feature = "date")]
pub mod dates;
pub mod dictionaries;
#[cfg(feature = "http")]
pub mod http;
pub mod instances;
pub mod numbers;
pub mod objects;
pub mod operations;
pub mod promises;
pub mod strings;
pub mod unions;
pub mod unknown;
#[cfg(feature = "url")]
pub mod urls;
pub mod utils;

use crate::context::Context;
use crate::types::{is_type_compatible, DataType, ParameterType};
use crate::value::{EntityId, IData, Statement};
use crate::Rc;

use core::fmt;

use anyhow::Result;
use lazy_static::lazy_static;
use serde::Serialize;

/// Handler whose arguments are evaluated before the call.
pub type EagerFcn = fn(&Context, &IData, &[IData]) -> Result<IData>;

/// Handler that receives its arguments unevaluated and decides if and when
/// to run them.
pub type LazyFcn = fn(&Context, &IData, &[Statement]) -> Result<IData>;

/// Full parameter list, receiver first, for a given receiver.
pub type ParametersFcn = fn(&IData) -> Vec<ParameterType>;

/// Static result type for a receiver and the argument types.
pub type ResultFcn = fn(&IData, &[DataType]) -> DataType;

pub type ExtensionFcn = Rc<dyn Fn(&IData, &[IData]) -> Result<IData>>;

#[derive(Clone, Copy)]
pub enum Handler {
    Eager(EagerFcn),
    Lazy(LazyFcn),
}

pub struct Builtin {
    pub name: &'static str,
    pub group: &'static str,
    pub parameters: ParametersFcn,
    pub result: ResultFcn,
    pub handler: Handler,
    /// Results are reused for identical inputs and survive cache sweeps.
    pub cacheable: bool,
}

impl Builtin {
    pub fn eager(
        name: &'static str,
        group: &'static str,
        parameters: ParametersFcn,
        result: ResultFcn,
        handler: EagerFcn,
    ) -> Self {
        Builtin {
            name,
            group,
            parameters,
            result,
            handler: Handler::Eager(handler),
            cacheable: false,
        }
    }

    pub fn lazy(
        name: &'static str,
        group: &'static str,
        parameters: ParametersFcn,
        result: ResultFcn,
        handler: LazyFcn,
    ) -> Self {
        Builtin {
            name,
            group,
            parameters,
            result,
            handler: Handler::Lazy(handler),
            cacheable: false,
        }
    }

    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

/// Host supplied eager operation.
#[derive(Clone)]
pub struct Extension {
    pub name: Rc<str>,
    /// Receiver first.
    pub parameters: Vec<ParameterType>,
    pub result: DataType,
    pub handler: ExtensionFcn,
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

#[rustfmt::skip]
lazy_static! {
    pub static ref BUILTINS: Vec<Builtin> = {
	let mut m: Vec<Builtin> = Vec::new();

	unknown::register(&mut m);
	strings::register(&mut m);
	numbers::register(&mut m);
	booleans::register(&mut m);
	arrays::register(&mut m);
	objects::register(&mut m);
	dictionaries::register(&mut m);
	unions::register(&mut m);
	operations::register(&mut m);
	#[cfg(feature = "date")]
	dates::register(&mut m);
	#[cfg(feature = "url")]
	urls::register(&mut m);
	#[cfg(feature = "http")]
	http::register(&mut m);
	promises::register(&mut m);

	m
    };
}

/// An operation resolved for a particular receiver.
#[derive(Debug, Clone)]
pub enum OperationRef {
    Builtin(&'static Builtin),
    Extension(Extension),
    UserDefined {
        name: Rc<str>,
        id: EntityId,
        data: IData,
    },
}

impl OperationRef {
    pub fn name(&self) -> &str {
        match self {
            OperationRef::Builtin(b) => b.name,
            OperationRef::Extension(e) => &e.name,
            OperationRef::UserDefined { name, .. } => name,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            OperationRef::Builtin(b) => b.group,
            OperationRef::Extension(_) => "extension",
            OperationRef::UserDefined { .. } => "user",
        }
    }

    /// Parameter list for `data`, receiver first.
    pub fn parameters(&self, data: &IData) -> Vec<ParameterType> {
        match self {
            OperationRef::Builtin(b) => (b.parameters)(data),
            OperationRef::Extension(e) => e.parameters.clone(),
            OperationRef::UserDefined { data: op, .. } => match op.ty.dereference() {
                DataType::Operation { parameters, .. } => parameters.clone(),
                _ => vec![],
            },
        }
    }

    pub fn result_type(&self, data: &IData, arguments: &[DataType]) -> DataType {
        match self {
            OperationRef::Builtin(b) => (b.result)(data, arguments),
            OperationRef::Extension(e) => e.result.clone(),
            OperationRef::UserDefined { data: op, .. } => match op.ty.dereference() {
                DataType::Operation { result, .. } => result.as_ref().clone(),
                _ => DataType::Unknown,
            },
        }
    }

    pub fn is_cacheable(&self) -> bool {
        matches!(self, OperationRef::Builtin(b) if b.cacheable)
    }
}

// Tuples are dispatched as arrays.
fn dispatch_kind(ty: &DataType) -> &'static str {
    match ty {
        DataType::Tuple { .. } => "array",
        _ => ty.kind(),
    }
}

fn kind_matches(parameter: &DataType, ty: &DataType) -> bool {
    match (parameter, ty) {
        (
            DataType::Instance {
                class_name: expected,
                ..
            },
            DataType::Instance { class_name, .. },
        ) => expected == class_name,
        _ => dispatch_kind(parameter) == dispatch_kind(ty),
    }
}

/// Whether an operation with `parameters` can be chained on `data`.
pub fn data_supports_operation(data: &IData, parameters: &[ParameterType]) -> bool {
    let Some(receiver) = parameters.first() else {
        return false;
    };
    let parameter = receiver.ty.dereference();
    let ty = data.ty.dereference();
    match (parameter, ty) {
        (DataType::Unknown, _) => true,
        (DataType::Union { .. }, DataType::Union { .. }) => is_type_compatible(ty, parameter),
        (_, DataType::Union { types, .. }) => {
            !types.is_empty() && types.iter().all(|t| kind_matches(parameter, t))
        }
        _ => kind_matches(parameter, ty),
    }
}

fn user_defined_operations(context: &Context) -> impl Iterator<Item = OperationRef> + '_ {
    context
        .variables
        .iter()
        .rev()
        .filter(|(_, var)| matches!(var.data.ty.dereference(), DataType::Operation { .. }))
        .map(|(name, var)| OperationRef::UserDefined {
            name: name.clone(),
            id: var.id.clone(),
            data: var.data.clone(),
        })
}

fn all_operations(context: &Context) -> impl Iterator<Item = OperationRef> + '_ {
    user_defined_operations(context)
        .chain(context.extensions.iter().cloned().map(OperationRef::Extension))
        .chain(BUILTINS.iter().map(OperationRef::Builtin))
}

/// Looks `name` up among in-scope user-defined operations, extensions and
/// builtins, in that order, keeping only those applicable to `data`.
pub fn find_operation(context: &Context, data: &IData, name: &str) -> Option<OperationRef> {
    all_operations(context)
        .filter(|op| op.name() == name)
        .find(|op| data_supports_operation(data, &op.parameters(data)))
}

pub fn resolve_parameters(operation: &OperationRef, data: &IData) -> Vec<ParameterType> {
    operation.parameters(data)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationListItem {
    pub name: Rc<str>,
    pub group: Rc<str>,
    pub signature: String,
    #[serde(rename = "type")]
    pub ty: DataType,
}

/// Operations applicable to `data`. A name shadowed by an earlier source is
/// listed once.
pub fn get_filtered_operations(data: &IData, context: &Context) -> Vec<OperationListItem> {
    let mut items: Vec<OperationListItem> = vec![];
    for op in all_operations(context) {
        if items.iter().any(|i| i.name.as_ref() == op.name()) {
            continue;
        }
        let parameters = op.parameters(data);
        if !data_supports_operation(data, &parameters) {
            continue;
        }
        let arguments: Vec<DataType> = parameters.iter().skip(1).map(|p| p.ty.clone()).collect();
        let ty = DataType::operation(parameters, op.result_type(data, &arguments));
        items.push(OperationListItem {
            name: op.name().into(),
            group: op.group().into(),
            signature: context.signature(&ty),
            ty,
        });
    }
    items
}

/// [`get_filtered_operations`] grouped by family, groups in first-seen order.
pub fn get_grouped_operations(
    data: &IData,
    context: &Context,
) -> Vec<(Rc<str>, Vec<OperationListItem>)> {
    let mut groups: Vec<(Rc<str>, Vec<OperationListItem>)> = vec![];
    for item in get_filtered_operations(data, context) {
        match groups.iter_mut().find(|(g, _)| *g == item.group) {
            Some((_, items)) => items.push(item),
            None => groups.push((item.group.clone(), vec![item])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::resolve_union_type;
    use crate::value::Value;

    fn names(data: &IData) -> Vec<Rc<str>> {
        get_filtered_operations(data, &Context::default())
            .into_iter()
            .map(|i| i.name)
            .collect()
    }

    #[test]
    fn number_operations_are_offered_on_numbers_only() {
        let on_number = names(&IData::number(1.0));
        assert!(on_number.iter().any(|n| n.as_ref() == "add"));
        assert!(on_number.iter().any(|n| n.as_ref() == "isEqual"));
        assert!(!on_number.iter().any(|n| n.as_ref() == "concat"));
    }

    #[test]
    fn mixed_unions_only_get_generic_operations() {
        let ty = resolve_union_type(&[DataType::String, DataType::Number], false, None);
        let data = IData::new(ty, Value::Number(1.0));
        let ops = names(&data);
        assert!(!ops.iter().any(|n| n.as_ref() == "add"));
        assert!(ops.iter().any(|n| n.as_ref() == "toString"));
        assert!(ops.iter().any(|n| n.as_ref() == "orElse"));
    }

    #[test]
    fn grouping_keeps_family_order() {
        let groups = get_grouped_operations(&IData::string("a"), &Context::default());
        let group_names: Vec<&str> = groups.iter().map(|(g, _)| &**g).collect();
        assert_eq!(group_names.first(), Some(&"unknown"));
        assert!(group_names.contains(&"string"));
    }

    #[test]
    fn names_are_unique_per_family() {
        for (idx, a) in BUILTINS.iter().enumerate() {
            for b in BUILTINS.iter().skip(idx + 1) {
                assert!(
                    !(a.name == b.name && a.group == b.group),
                    "duplicate builtin {}",
                    a.name
                );
            }
        }
    }
}
