// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::Rc;

use core::fmt;
use core::mem;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Category of an error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ReferenceError,
    TypeError,
    RuntimeError,
    CustomError,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::ReferenceError => "reference_error",
            ErrorType::TypeError => "type_error",
            ErrorType::RuntimeError => "runtime_error",
            ErrorType::CustomError => "custom_error",
        }
    }

    /// Reason used when an error value is created without one.
    pub fn default_reason(&self) -> &'static str {
        match self {
            ErrorType::ReferenceError => "Reference not found",
            ErrorType::TypeError => "Type mismatch",
            ErrorType::RuntimeError => "Something went wrong",
            ErrorType::CustomError => "Custom error",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of an operation's parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Rc<str>>,
    #[serde(rename = "type")]
    pub ty: DataType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_optional: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ParameterType {
    pub fn new(name: &str, ty: DataType) -> Self {
        ParameterType {
            name: Some(name.into()),
            ty,
            is_optional: false,
        }
    }

    /// The implicit first parameter: the value the operation is chained on.
    pub fn receiver(ty: DataType) -> Self {
        ParameterType {
            name: None,
            ty,
            is_optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

/// Structural description of a value's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum DataType {
    Unknown,
    Never,
    Undefined,
    String,
    Number,
    Boolean,
    Array {
        element_type: Box<DataType>,
    },
    Tuple {
        elements: Vec<DataType>,
    },
    Object {
        properties: IndexMap<Rc<str>, DataType>,
        #[serde(default)]
        required: Vec<Rc<str>>,
    },
    Dictionary {
        element_type: Box<DataType>,
    },
    Union {
        types: Vec<DataType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active_index: Option<usize>,
    },
    Operation {
        parameters: Vec<ParameterType>,
        result: Box<DataType>,
    },
    Condition {
        result: Box<DataType>,
    },
    Reference {
        data_type: Box<DataType>,
    },
    Error {
        error_type: ErrorType,
    },
    Instance {
        class_name: Rc<str>,
        #[serde(default)]
        constructor_args: Vec<ParameterType>,
    },
}

impl DataType {
    pub fn array(element_type: DataType) -> Self {
        DataType::Array {
            element_type: Box::new(element_type),
        }
    }

    pub fn dictionary(element_type: DataType) -> Self {
        DataType::Dictionary {
            element_type: Box::new(element_type),
        }
    }

    /// Object type whose properties are all required.
    pub fn object<I>(properties: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, DataType)>,
    {
        let properties: IndexMap<Rc<str>, DataType> = properties
            .into_iter()
            .map(|(k, v)| (Rc::from(k), v))
            .collect();
        let required = properties.keys().cloned().collect();
        DataType::Object {
            properties,
            required,
        }
    }

    pub fn operation(parameters: Vec<ParameterType>, result: DataType) -> Self {
        DataType::Operation {
            parameters,
            result: Box::new(result),
        }
    }

    pub fn reference(data_type: DataType) -> Self {
        DataType::Reference {
            data_type: Box::new(data_type),
        }
    }

    pub fn error(error_type: ErrorType) -> Self {
        DataType::Error { error_type }
    }

    pub fn instance(class_name: &str, constructor_args: Vec<ParameterType>) -> Self {
        DataType::Instance {
            class_name: class_name.into(),
            constructor_args,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DataType::Unknown => "unknown",
            DataType::Never => "never",
            DataType::Undefined => "undefined",
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Array { .. } => "array",
            DataType::Tuple { .. } => "tuple",
            DataType::Object { .. } => "object",
            DataType::Dictionary { .. } => "dictionary",
            DataType::Union { .. } => "union",
            DataType::Operation { .. } => "operation",
            DataType::Condition { .. } => "condition",
            DataType::Reference { .. } => "reference",
            DataType::Error { .. } => "error",
            DataType::Instance { .. } => "instance",
        }
    }

    pub fn same_kind(&self, other: &DataType) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }

    /// Strips any number of reference layers.
    pub fn dereference(&self) -> &DataType {
        let mut ty = self;
        while let DataType::Reference { data_type } = ty {
            ty = data_type;
        }
        ty
    }

    pub fn is_error(&self) -> bool {
        matches!(self.dereference(), DataType::Error { .. })
    }

    /// Element type of arrays and dictionaries, member union of tuples.
    pub fn element_type(&self) -> Option<DataType> {
        match self.dereference() {
            DataType::Array { element_type } | DataType::Dictionary { element_type } => {
                Some(element_type.as_ref().clone())
            }
            DataType::Tuple { elements } => Some(resolve_union_type(elements, false, None)),
            _ => None,
        }
    }

    pub fn union_members(&self) -> Option<&[DataType]> {
        match self.dereference() {
            DataType::Union { types, .. } => Some(types),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&get_type_signature(self, usize::MAX))
    }
}

/// Structural compatibility of `a` against `b`.
pub fn is_type_compatible(a: &DataType, b: &DataType) -> bool {
    use DataType::*;
    match (a, b) {
        (Unknown, _) | (_, Unknown) => true,
        (Reference { data_type }, _) => is_type_compatible(data_type, b),
        (_, Reference { data_type }) => is_type_compatible(a, data_type),
        (Union { types: ta, .. }, Union { types: tb, .. }) => {
            ta.len() == tb.len()
                && ta.iter().all(|x| tb.iter().any(|y| is_type_compatible(x, y)))
                && tb.iter().all(|y| ta.iter().any(|x| is_type_compatible(x, y)))
        }
        (Union { types, .. }, _) => types.iter().any(|t| is_type_compatible(t, b)),
        (_, Union { types, .. }) => types.iter().any(|t| is_type_compatible(a, t)),
        (
            Operation {
                parameters: pa,
                result: ra,
            },
            Operation {
                parameters: pb,
                result: rb,
            },
        ) => is_type_compatible(ra, rb) && are_parameters_compatible(pa, pb),
        (Array { element_type: ea }, Array { element_type: eb })
        | (Dictionary { element_type: ea }, Dictionary { element_type: eb }) => {
            is_type_compatible(ea, eb)
        }
        (Tuple { elements: ea }, Tuple { elements: eb }) => ea
            .iter()
            .all(|x| eb.iter().any(|y| is_type_compatible(x, y))),
        (
            Object {
                properties: pa,
                required: ra,
            },
            Object {
                properties: pb,
                required: rb,
            },
        ) => {
            rb.iter().all(|key| match (pa.get(key), pb.get(key)) {
                (Some(ta), Some(tb)) => is_type_compatible(ta, tb),
                _ => false,
            }) && ra.iter().all(|key| pb.contains_key(key))
        }
        (
            Instance {
                class_name: ca, ..
            },
            Instance {
                class_name: cb, ..
            },
        ) => ca == cb,
        _ => a.same_kind(b),
    }
}

fn are_parameters_compatible(pa: &[ParameterType], pb: &[ParameterType]) -> bool {
    let len = pa.len().max(pb.len());
    (0..len).all(|idx| match (pa.get(idx), pb.get(idx)) {
        (Some(x), Some(y)) => is_type_compatible(&x.ty, &y.ty),
        (Some(x), None) => x.is_optional,
        (None, Some(y)) => y.is_optional,
        (None, None) => true,
    })
}

fn flatten_union(types: &[DataType], out: &mut Vec<DataType>) {
    for ty in types {
        match ty {
            DataType::Union { types: inner, .. } => flatten_union(inner, out),
            _ => out.push(ty.clone()),
        }
    }
}

/// Flattens, deduplicates (by mutual compatibility) and collapses `types`.
pub fn resolve_union_type(
    types: &[DataType],
    force_union: bool,
    active_index: Option<usize>,
) -> DataType {
    let mut flat = vec![];
    flatten_union(types, &mut flat);

    let mut unique: Vec<DataType> = Vec::with_capacity(flat.len());
    for ty in flat {
        if !unique
            .iter()
            .any(|u| is_type_compatible(u, &ty) && is_type_compatible(&ty, u))
        {
            unique.push(ty);
        }
    }

    match unique.len() {
        0 => DataType::Never,
        1 if !force_union => unique.remove(0),
        len => {
            let active = active_index.unwrap_or(0).min(len - 1);
            DataType::Union {
                types: unique,
                active_index: Some(active),
            }
        }
    }
}

/// Human readable structural signature. Nesting beyond `max_depth` is
/// replaced by `...`.
pub fn get_type_signature(ty: &DataType, max_depth: usize) -> String {
    signature(ty, 0, max_depth)
}

fn signature(ty: &DataType, depth: usize, max_depth: usize) -> String {
    use DataType::*;
    let nested = |t: &DataType| signature(t, depth + 1, max_depth);
    let is_container = !matches!(
        ty,
        Unknown | Never | Undefined | String | Number | Boolean | Error { .. } | Reference { .. }
    );
    if is_container && depth >= max_depth {
        return "...".to_string();
    }

    match ty {
        Unknown | Never | Undefined | String | Number | Boolean => ty.kind().to_string(),
        Array { element_type } => match element_type.as_ref() {
            Union { .. } | Operation { .. } => format!("({})[]", nested(element_type)),
            _ => format!("{}[]", nested(element_type)),
        },
        Tuple { elements } => {
            let parts: Vec<std::string::String> = elements.iter().map(nested).collect();
            format!("[{}]", parts.join(", "))
        }
        Object {
            properties,
            required,
        } => {
            if properties.is_empty() {
                return "{}".to_string();
            }
            let parts: Vec<std::string::String> = properties
                .iter()
                .map(|(name, t)| {
                    let optional = if required.contains(name) { "" } else { "?" };
                    format!("{name}{optional}: {}", nested(t))
                })
                .collect();
            format!("{{ {} }}", parts.join("; "))
        }
        Dictionary { element_type } => format!("{{ [key: string]: {} }}", nested(element_type)),
        Union { types, .. } => {
            let parts: Vec<std::string::String> = types.iter().map(nested).collect();
            parts.join(" | ")
        }
        Operation { parameters, result } => {
            let parts: Vec<std::string::String> = parameters
                .iter()
                .map(|p| {
                    let optional = if p.is_optional { "?" } else { "" };
                    match &p.name {
                        Some(name) => format!("{name}{optional}: {}", nested(&p.ty)),
                        None => format!("{optional}{}", nested(&p.ty)),
                    }
                })
                .collect();
            format!("({}) => {}", parts.join(", "), nested(result))
        }
        Condition { result } => format!("condition<{}>", nested(result)),
        Reference { data_type } => signature(data_type, depth, max_depth),
        Error { error_type } => format!("error<{error_type}>"),
        Instance {
            class_name,
            constructor_args,
        } => {
            if constructor_args.is_empty() {
                class_name.to_string()
            } else {
                let parts: Vec<std::string::String> =
                    constructor_args.iter().map(|p| nested(&p.ty)).collect();
                format!("{class_name}<{}>", parts.join(", "))
            }
        }
    }
}
