// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::context::Context;
use crate::interpreter::infer_type_from_value;
use crate::types::{resolve_union_type, DataType, ErrorType};
use crate::Rc;

use core::fmt;

use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Stable identity of a statement, data or operation node.
pub type EntityId = Rc<str>;

pub fn create_entity_id() -> EntityId {
    uuid::Uuid::new_v4().to_string().into()
}

fn empty_id() -> EntityId {
    "".into()
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Runtime payload of an [`IData`]. Its shape is determined by the paired
/// [`DataType`]. Containers hold statements, never raw nested values.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    String(Rc<str>),
    Number(f64),
    Boolean(bool),
    // Arrays and tuples.
    Array(Rc<Vec<Statement>>),
    // Objects and dictionaries, in insertion order.
    Object(Rc<IndexMap<Rc<str>, Statement>>),
    Operation(OperationValue),
    Condition(Rc<ConditionValue>),
    Reference(ReferenceValue),
    Error(ErrorValue),
    Instance(InstanceValue),
}

/// A user-defined operation (has `statements`) or an operation call (a
/// `name` plus argument statements).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Rc<str>>,
    #[serde(default)]
    pub parameters: Rc<Vec<Statement>>,
    #[serde(default)]
    pub statements: Rc<Vec<Statement>>,
}

impl OperationValue {
    pub fn call(name: &str, arguments: Vec<Statement>) -> Self {
        OperationValue {
            name: Some(name.into()),
            parameters: Rc::new(arguments),
            statements: Rc::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionValue {
    pub condition: Statement,
    #[serde(rename = "true")]
    pub true_branch: Statement,
    #[serde(rename = "false")]
    pub false_branch: Statement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValue {
    pub name: Rc<str>,
    // Declaring statement of the variable; empty when only the name is known.
    #[serde(default = "empty_id")]
    pub id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub reason: Rc<str>,
}

/// Serializable handle of an opaque external object. The object itself
/// lives in the context's instance table under `instance_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceValue {
    pub class_name: Rc<str>,
    #[serde(default)]
    pub constructor_args: Rc<Vec<Statement>>,
    #[serde(default = "create_entity_id")]
    pub instance_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawData")]
pub struct IData {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub ty: DataType,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    #[serde(default = "create_entity_id")]
    pub id: EntityId,
    pub data: IData,
    #[serde(default, deserialize_with = "deserialize_operations")]
    pub operations: Vec<IData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Rc<str>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_optional: bool,
}

// Serialized shape of a data node. `type` may be omitted, in which case it
// is inferred from the value.
#[derive(Deserialize)]
struct RawData {
    #[serde(default = "create_entity_id")]
    id: EntityId,
    #[serde(rename = "type", default)]
    ty: Option<DataType>,
    #[serde(default)]
    value: Json,
}

impl TryFrom<RawData> for IData {
    type Error = String;

    fn try_from(raw: RawData) -> core::result::Result<Self, Self::Error> {
        let decode = || -> Result<IData> {
            match raw.ty {
                Some(ty) => {
                    let value = Value::from_json(&ty, raw.value)?;
                    Ok(IData {
                        id: raw.id,
                        ty,
                        value,
                    })
                }
                None => {
                    let value = Value::from_untyped_json(raw.value)?;
                    let ty = infer_type_from_value(&value, &Context::default());
                    Ok(IData {
                        id: raw.id,
                        ty,
                        value,
                    })
                }
            }
        };
        decode().map_err(|e| e.to_string())
    }
}

// Entries of an operation pipeline are always operation calls, even when
// written without an explicit type.
fn deserialize_operations<'de, D>(deserializer: D) -> core::result::Result<Vec<IData>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw: Vec<RawData> = Vec::deserialize(deserializer)?;
    raw.into_iter()
        .map(|raw| match raw.ty {
            Some(_) => IData::try_from(raw).map_err(D::Error::custom),
            None => {
                let call: OperationValue =
                    serde_json::from_value(raw.value).map_err(D::Error::custom)?;
                Ok(IData {
                    id: raw.id,
                    ty: DataType::operation(vec![], DataType::Unknown),
                    value: Value::Operation(call),
                })
            }
        })
        .collect()
}

#[derive(Serialize)]
struct EntryRef<'a> {
    key: &'a str,
    value: &'a Statement,
}

#[derive(Deserialize)]
struct Entry {
    key: Rc<str>,
    value: Statement,
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Undefined => serializer.serialize_unit(),
            Value::String(s) => serializer.serialize_str(s),
            // Integral numbers are written without a fractional part.
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Array(items) => items.serialize(serializer),
            // Maps are written as an ordered list of key/value pairs.
            Value::Object(entries) => {
                let mut seq = serializer.serialize_seq(Some(entries.len()))?;
                for (key, value) in entries.iter() {
                    seq.serialize_element(&EntryRef { key, value })?;
                }
                seq.end()
            }
            Value::Operation(op) => op.serialize(serializer),
            Value::Condition(c) => c.serialize(serializer),
            Value::Reference(r) => r.serialize(serializer),
            Value::Error(e) => e.serialize(serializer),
            Value::Instance(i) => i.serialize(serializer),
        }
    }
}

fn decode_entries(json: Json) -> Result<IndexMap<Rc<str>, Statement>> {
    match json {
        Json::Array(_) => {
            let entries: Vec<Entry> = serde_json::from_value(json)?;
            Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
        }
        Json::Object(_) => Ok(serde_json::from_value(json)?),
        _ => bail!("expected a list of key/value entries. Got `{json}` instead"),
    }
}

fn looks_like_entries(items: &[Json]) -> bool {
    !items.is_empty()
        && items.iter().all(|item| {
            item.get("key").is_some() && item.get("value").is_some() && item.get("data").is_none()
        })
}

impl Value {
    /// Decodes a serialized value using its declared type.
    pub fn from_json(ty: &DataType, json: Json) -> Result<Value> {
        Ok(match ty {
            DataType::Unknown | DataType::Never | DataType::Undefined => {
                Value::from_untyped_json(json)?
            }
            DataType::String => match json {
                Json::String(s) => Value::String(s.into()),
                _ => bail!("expected string value. Got `{json}` instead"),
            },
            DataType::Number => match &json {
                Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
                // NaN and infinities are written as null.
                Json::Null => Value::Number(f64::NAN),
                _ => bail!("expected number value. Got `{json}` instead"),
            },
            DataType::Boolean => match json {
                Json::Bool(b) => Value::Boolean(b),
                _ => bail!("expected boolean value. Got `{json}` instead"),
            },
            DataType::Array { .. } | DataType::Tuple { .. } => {
                Value::Array(Rc::new(serde_json::from_value(json)?))
            }
            DataType::Object { .. } | DataType::Dictionary { .. } => {
                Value::Object(Rc::new(decode_entries(json)?))
            }
            DataType::Union {
                types,
                active_index,
            } => {
                let active = active_index.and_then(|idx| types.get(idx));
                for member in active.into_iter().chain(types.iter()) {
                    if let Ok(v) = Value::from_json(member, json.clone()) {
                        return Ok(v);
                    }
                }
                bail!("value `{json}` does not match any member of the union")
            }
            DataType::Operation { .. } => Value::Operation(serde_json::from_value(json)?),
            DataType::Condition { .. } => Value::Condition(Rc::new(serde_json::from_value(json)?)),
            DataType::Reference { .. } => Value::Reference(serde_json::from_value(json)?),
            DataType::Error { .. } => Value::Error(serde_json::from_value(json)?),
            DataType::Instance { .. } => Value::Instance(serde_json::from_value(json)?),
        })
    }

    /// Decodes a serialized value by its shape alone.
    pub fn from_untyped_json(json: Json) -> Result<Value> {
        Ok(match json {
            Json::Null => Value::Undefined,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s.into()),
            Json::Array(ref items) if looks_like_entries(items) => {
                Value::Object(Rc::new(decode_entries(json)?))
            }
            Json::Array(_) => Value::Array(Rc::new(serde_json::from_value(json)?)),
            Json::Object(ref fields) => {
                if fields.contains_key("reason") {
                    Value::Error(serde_json::from_value(json)?)
                } else if fields.contains_key("condition") {
                    Value::Condition(Rc::new(serde_json::from_value(json)?))
                } else if fields.contains_key("className") {
                    Value::Instance(serde_json::from_value(json)?)
                } else if fields.contains_key("parameters") || fields.contains_key("statements") {
                    Value::Operation(serde_json::from_value(json)?)
                } else if fields.contains_key("name") {
                    Value::Reference(serde_json::from_value(json)?)
                } else {
                    bail!("cannot infer a value from `{json}`")
                }
            }
        })
    }
}

impl IData {
    pub fn new(ty: DataType, value: Value) -> Self {
        IData {
            id: create_entity_id(),
            ty,
            value,
        }
    }

    pub fn undefined() -> Self {
        IData::new(DataType::Undefined, Value::Undefined)
    }

    pub fn string(s: &str) -> Self {
        IData::new(DataType::String, Value::String(s.into()))
    }

    pub fn number(n: f64) -> Self {
        IData::new(DataType::Number, Value::Number(n))
    }

    pub fn boolean(b: bool) -> Self {
        IData::new(DataType::Boolean, Value::Boolean(b))
    }

    pub fn error<S: fmt::Display>(error_type: ErrorType, reason: S) -> Self {
        IData::new(
            DataType::error(error_type),
            Value::Error(ErrorValue {
                reason: reason.to_string().into(),
            }),
        )
    }

    pub fn reference(name: &str, id: &str, data_type: DataType) -> Self {
        IData::new(
            DataType::reference(data_type),
            Value::Reference(ReferenceValue {
                name: name.into(),
                id: id.into(),
            }),
        )
    }

    /// Array of the given items. The element type is the union of the items'
    /// types, or `fallback` when there are no items.
    pub fn array(items: Vec<IData>, fallback: DataType) -> Self {
        let element_type = if items.is_empty() {
            fallback
        } else {
            let types: Vec<DataType> = items.iter().map(|i| i.ty.clone()).collect();
            resolve_union_type(&types, false, None)
        };
        let statements = items.into_iter().map(Statement::new).collect();
        IData::new(
            DataType::array(element_type),
            Value::Array(Rc::new(statements)),
        )
    }

    /// Object whose properties are all required.
    pub fn object(entries: Vec<(Rc<str>, IData)>) -> Self {
        let properties: IndexMap<Rc<str>, DataType> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.ty.clone()))
            .collect();
        let required = properties.keys().cloned().collect();
        let value = entries
            .into_iter()
            .map(|(k, v)| (k, Statement::new(v)))
            .collect();
        IData::new(
            DataType::Object {
                properties,
                required,
            },
            Value::Object(Rc::new(value)),
        )
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.value, Value::Error(_)) || self.ty.is_error()
    }

    pub fn as_error(&self) -> Option<(ErrorType, &str)> {
        match (&self.ty.dereference(), &self.value) {
            (DataType::Error { error_type }, Value::Error(e)) => Some((*error_type, &e.reason)),
            (_, Value::Error(e)) => Some((ErrorType::RuntimeError, &e.reason)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.value {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Rc<Vec<Statement>>> {
        match &self.value {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<IndexMap<Rc<str>, Statement>>> {
        match &self.value {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_operation(&self) -> Option<&OperationValue> {
        match &self.value {
            Value::Operation(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceValue> {
        match &self.value {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&InstanceValue> {
        match &self.value {
            Value::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Plain JSON view of an evaluated value. Container elements are read
    /// from their statements' data.
    pub fn to_plain_json(&self) -> Json {
        match &self.value {
            Value::Undefined => Json::Null,
            Value::String(s) => Json::String(s.to_string()),
            Value::Number(n) => number_to_json(*n),
            Value::Boolean(b) => Json::Bool(*b),
            Value::Array(items) => Json::Array(items.iter().map(|s| s.data.to_plain_json()).collect()),
            Value::Object(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, s)| (k.to_string(), s.data.to_plain_json()))
                    .collect(),
            ),
            Value::Operation(op) => {
                let name = op.name.as_deref().unwrap_or("anonymous");
                Json::String(format!("<operation {name}>"))
            }
            Value::Condition(_) => Json::String("<condition>".to_string()),
            Value::Reference(r) => Json::String(format!("<reference {}>", r.name)),
            Value::Error(e) => serde_json::json!({ "error": e.reason.to_string() }),
            Value::Instance(i) => Json::String(format!("<{}>", i.class_name)),
        }
    }

    /// Builds typed data from plain JSON.
    pub fn from_plain_json(json: &Json) -> IData {
        match json {
            Json::Null => IData::undefined(),
            Json::Bool(b) => IData::boolean(*b),
            Json::Number(n) => IData::number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => IData::string(s),
            Json::Array(items) => IData::array(
                items.iter().map(IData::from_plain_json).collect(),
                DataType::Unknown,
            ),
            Json::Object(fields) => IData::object(
                fields
                    .iter()
                    .map(|(k, v)| (Rc::from(k.as_str()), IData::from_plain_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn contains_id(&self, id: &str) -> bool {
        if self.id.as_ref() == id {
            return true;
        }
        match &self.value {
            Value::Array(items) => items.iter().any(|s| s.contains_id(id)),
            Value::Object(entries) => entries.values().any(|s| s.contains_id(id)),
            Value::Operation(op) => {
                op.parameters.iter().any(|s| s.contains_id(id))
                    || op.statements.iter().any(|s| s.contains_id(id))
            }
            Value::Condition(c) => {
                c.condition.contains_id(id)
                    || c.true_branch.contains_id(id)
                    || c.false_branch.contains_id(id)
            }
            Value::Instance(i) => i.constructor_args.iter().any(|s| s.contains_id(id)),
            _ => false,
        }
    }

    /// Copy of this node with the statement `changed.id` replaced by
    /// `changed`, or dropped from its enclosing list when `remove` is set.
    pub fn replace_nested(&self, changed: &Statement, remove: bool) -> IData {
        if !self.contains_id(&changed.id) {
            return self.clone();
        }
        let value = match &self.value {
            Value::Array(items) => Value::Array(Rc::new(replace_in_list(items, changed, remove))),
            Value::Object(entries) => Value::Object(Rc::new(
                entries
                    .iter()
                    .filter(|(_, s)| !(remove && s.id == changed.id))
                    .map(|(k, s)| (k.clone(), s.replace_nested(changed, remove)))
                    .collect(),
            )),
            Value::Operation(op) => Value::Operation(OperationValue {
                name: op.name.clone(),
                parameters: Rc::new(replace_in_list(&op.parameters, changed, remove)),
                statements: Rc::new(replace_in_list(&op.statements, changed, remove)),
            }),
            Value::Condition(c) => Value::Condition(Rc::new(ConditionValue {
                condition: c.condition.replace_nested(changed, remove),
                true_branch: c.true_branch.replace_nested(changed, remove),
                false_branch: c.false_branch.replace_nested(changed, remove),
            })),
            Value::Instance(i) => Value::Instance(InstanceValue {
                class_name: i.class_name.clone(),
                constructor_args: Rc::new(replace_in_list(&i.constructor_args, changed, remove)),
                instance_id: i.instance_id.clone(),
            }),
            other => other.clone(),
        };
        IData {
            id: self.id.clone(),
            ty: self.ty.clone(),
            value,
        }
    }
}

fn replace_in_list(list: &[Statement], changed: &Statement, remove: bool) -> Vec<Statement> {
    list.iter()
        .filter_map(|s| {
            if s.id == changed.id {
                (!remove).then(|| changed.clone())
            } else {
                Some(s.replace_nested(changed, remove))
            }
        })
        .collect()
}

pub fn number_to_json(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

/// Formats a number the way it is displayed to users: integral values have
/// no fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{n}")
    }
}

impl Statement {
    pub fn new(data: IData) -> Self {
        Statement {
            id: create_entity_id(),
            data,
            operations: vec![],
            name: None,
            is_optional: false,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_operations(mut self, operations: Vec<IData>) -> Self {
        self.operations = operations;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    /// Declared type of the statement's final value: the last operation's
    /// result type, or the data's own type.
    pub fn result_type(&self) -> DataType {
        match self.operations.last().map(|op| &op.ty) {
            Some(DataType::Operation { result, .. }) => result.as_ref().clone(),
            _ => self.data.ty.dereference().clone(),
        }
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.id.as_ref() == id
            || self.data.contains_id(id)
            || self.operations.iter().any(|op| op.contains_id(id))
    }

    pub fn replace_nested(&self, changed: &Statement, remove: bool) -> Statement {
        if self.id == changed.id {
            return changed.clone();
        }
        if !self.contains_id(&changed.id) {
            return self.clone();
        }
        Statement {
            id: self.id.clone(),
            data: self.data.replace_nested(changed, remove),
            operations: self
                .operations
                .iter()
                .map(|op| op.replace_nested(changed, remove))
                .collect(),
            name: self.name.clone(),
            is_optional: self.is_optional,
        }
    }
}

/// Options for [`create_data`].
#[derive(Debug, Clone, Default)]
pub struct CreateData {
    pub id: Option<EntityId>,
    pub ty: Option<DataType>,
    pub value: Value,
}

/// Creates a data node with fresh identity, inferring its type from the
/// value when none is given.
pub fn create_data(options: CreateData, context: &Context) -> IData {
    let ty = match options.ty {
        Some(ty) => ty,
        None => infer_type_from_value(&options.value, context),
    };
    IData {
        id: options.id.unwrap_or_else(create_entity_id),
        ty,
        value: options.value,
    }
}

/// Options for [`create_statement`].
#[derive(Debug, Clone, Default)]
pub struct CreateStatement {
    pub id: Option<EntityId>,
    pub data: Option<IData>,
    pub operations: Vec<IData>,
    pub name: Option<Rc<str>>,
    pub is_optional: bool,
}

pub fn create_statement(options: CreateStatement) -> Statement {
    Statement {
        id: options.id.unwrap_or_else(create_entity_id),
        data: options.data.unwrap_or_else(IData::undefined),
        operations: options.operations,
        name: options.name,
        is_optional: options.is_optional,
    }
}

impl fmt::Display for IData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::String(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
            _ => match serde_json::to_string(&self.to_plain_json()) {
                Ok(s) => f.write_str(&s),
                Err(_e) => Err(fmt::Error),
            },
        }
    }
}

impl Statement {
    pub fn from_json_str(json: &str) -> Result<Statement> {
        serde_json::from_str(json).map_err(|e| anyhow!("invalid statement: {e}"))
    }

    pub fn to_json_str(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
