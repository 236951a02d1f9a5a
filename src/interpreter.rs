// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::instances::ensure_materialized;
use crate::builtins::{find_operation, Handler, OperationRef};
use crate::context::{Branch, Context, SkipExecution};
use crate::defaults::{create_default_data, DefaultValueOptions};
use crate::narrowing::{apply_type_narrowing, get_statement_narrowing, Narrowing};
use crate::types::{is_type_compatible, resolve_union_type, DataType, ErrorType, ParameterType};
use crate::utils::limits::LimitError;
use crate::value::{IData, OperationValue, Statement, Value};
use crate::Rc;

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use log::{debug, trace};

pub fn default_options(context: &Context) -> DefaultValueOptions {
    DefaultValueOptions {
        include_optional_properties: context.options.include_optional_properties,
    }
}

/// Replaces a reference by the current data of the variable it names.
pub fn resolve_reference(data: &IData, context: &Context) -> IData {
    match &data.value {
        Value::Reference(reference) => match context.get_variable(&reference.name) {
            Some(var) => var.data.clone(),
            None => IData::error(
                ErrorType::ReferenceError,
                format!("`{}` is not defined", reference.name),
            ),
        },
        _ => data.clone(),
    }
}

/// Evaluates a statement: its data, then its operation pipeline. The
/// result is cached under the statement id.
pub fn execute_statement(statement: &Statement, context: &Context) -> IData {
    trace!("executing statement {}", statement.id);
    let data = execute_data(&statement.data, context);
    let (result, _) = execute_chain(statement, data, context, |_, operation, _| {
        operation.clone()
    });
    let result = resolve_reference(&result, context);
    context.set_result(&statement.id, result.clone());
    result
}

pub(crate) fn execute_data(data: &IData, context: &Context) -> IData {
    match &data.value {
        Value::Reference(_) => resolve_reference(data, context),
        Value::Condition(condition) => {
            let condition = condition.clone();
            execute_condition(
                &condition.condition,
                &condition.true_branch,
                &condition.false_branch,
                context,
            )
        }
        Value::Array(_) | Value::Object(_) => resolve_nested(data, context),
        Value::Operation(_) => {
            // Preview the body so its statements have results, then retype
            // from them.
            set_operation_results(data, context);
            IData {
                id: data.id.clone(),
                ty: infer_type_from_value(&data.value, context),
                value: data.value.clone(),
            }
        }
        Value::Instance(_) => match ensure_materialized(context, data) {
            Ok(()) => data.clone(),
            Err(e) => IData::error(ErrorType::RuntimeError, e),
        },
        _ => data.clone(),
    }
}

fn execute_condition(
    condition: &Statement,
    true_branch: &Statement,
    false_branch: &Statement,
    context: &Context,
) -> IData {
    let narrowing = get_statement_narrowing(context, condition);
    let result = execute_statement(condition, &context.child());
    if result.is_error() {
        return result;
    }
    let taken = result.as_bool() == Some(true);

    let guarded = context.with_narrowing(narrowing);
    let skip_unless = |live: bool| match live {
        true => context.skip_execution.clone(),
        false => Some(
            context
                .skip_execution
                .clone()
                .unwrap_or(SkipExecution::Unreachable),
        ),
    };
    let on_true = execute_statement(
        true_branch,
        &guarded.enter_branch(Branch::Narrowed).with_skip(skip_unless(taken)),
    );
    let on_false = execute_statement(
        false_branch,
        &guarded.enter_branch(Branch::Inverse).with_skip(skip_unless(!taken)),
    );
    if taken {
        on_true
    } else {
        on_false
    }
}

fn expected_element(ty: &DataType, idx: usize, key: Option<&str>) -> Option<DataType> {
    match ty.dereference() {
        DataType::Array { element_type } | DataType::Dictionary { element_type } => {
            Some(element_type.as_ref().clone())
        }
        DataType::Tuple { elements } => elements.get(idx).cloned(),
        DataType::Object { properties, .. } => key.and_then(|k| properties.get(k).cloned()),
        _ => None,
    }
}

fn resolved_statement(statement: &Statement, data: IData) -> Statement {
    Statement {
        id: statement.id.clone(),
        data,
        operations: vec![],
        name: statement.name.clone(),
        is_optional: statement.is_optional,
    }
}

// Evaluates the elements of a container and replaces each by its result.
fn resolve_nested(data: &IData, context: &Context) -> IData {
    let child = context.child();
    let value = match &data.value {
        Value::Array(items) => Value::Array(Rc::new(
            items
                .iter()
                .enumerate()
                .map(|(idx, s)| {
                    let expected = expected_element(&data.ty, idx, None);
                    let r = execute_statement(s, &child.with_expected_type(expected));
                    resolved_statement(s, r)
                })
                .collect(),
        )),
        Value::Object(entries) => Value::Object(Rc::new(
            entries
                .iter()
                .enumerate()
                .map(|(idx, (key, s))| {
                    let expected = expected_element(&data.ty, idx, Some(key));
                    let r = execute_statement(s, &child.with_expected_type(expected));
                    (key.clone(), resolved_statement(s, r))
                })
                .collect(),
        )),
        other => other.clone(),
    };
    let ty = infer_type_from_value(&value, &context.with_expected_type(Some(data.ty.clone())));
    IData {
        id: data.id.clone(),
        ty,
        value,
    }
}

/// Folds `data` through the statement's operations. `visit` may replace
/// each operation before it runs; the operations actually run are returned
/// alongside the result.
pub(crate) fn execute_chain<F>(
    statement: &Statement,
    data: IData,
    context: &Context,
    mut visit: F,
) -> (IData, Vec<IData>)
where
    F: FnMut(&IData, &IData, &Context) -> IData,
{
    let mut current = data;
    let mut narrowing: Option<Narrowing> = None;
    let mut operations = Vec::with_capacity(statement.operations.len());
    for (idx, operation) in statement.operations.iter().enumerate() {
        let op_context = context.child().with_narrowing(narrowing.clone());
        let operation = visit(&current, operation, &op_context);
        let result = execute_operation(&current, &operation, &op_context);
        // Only the first operation receives the statement's own reference.
        let receiver = if idx == 0 { &statement.data } else { &current };
        narrowing = apply_type_narrowing(context, receiver, narrowing.as_ref(), &operation);
        current = result;
        operations.push(operation);
    }
    (current, operations)
}

/// Why evaluation below this point is meaningless, if it is. `branch`
/// names a lazily evaluated argument as `(operation, argument index)`.
pub fn get_skip_execution(
    context: &Context,
    data: &IData,
    branch: Option<(&str, usize)>,
) -> Option<SkipExecution> {
    if let Some(skip) = &context.skip_execution {
        return Some(skip.clone());
    }
    if data.is_error() {
        return Some(SkipExecution::Error(data.clone()));
    }
    let (name, index) = branch?;
    let value = data.as_bool();
    let narrowing = context.narrowed_types.as_ref();
    let unreachable = match (name, index) {
        ("thenElse", 0) => {
            value == Some(false) || narrowing.is_some_and(Narrowing::narrowed_is_never)
        }
        ("thenElse", 1) => {
            value == Some(true) || narrowing.is_some_and(Narrowing::inverse_is_never)
        }
        ("and", 0) => value == Some(false),
        ("or", 0) => value == Some(true),
        _ => false,
    };
    unreachable.then_some(SkipExecution::Unreachable)
}

/// Evaluates argument `index` of the lazy operation `name` inside the
/// requested branch of the receiver's narrowing.
pub fn execute_lazy_argument(
    context: &Context,
    data: &IData,
    name: &str,
    index: usize,
    statement: &Statement,
    branch: Option<Branch>,
    expected_type: Option<DataType>,
) -> IData {
    let scope = match branch {
        Some(branch) => context.enter_branch(branch),
        None => context.child(),
    };
    let skip = get_skip_execution(context, data, Some((name, index)));
    let skipping = skip.is_some();
    let value = execute_statement(
        statement,
        &scope.with_skip(skip).with_expected_type(expected_type.clone()),
    );
    match expected_type {
        Some(ty) if !skipping && !value.is_error() && !is_type_compatible(&value.ty, &ty) => {
            type_error(format!(
                "Parameter {} of `{name}` expects `{}`. Got `{}` instead",
                index + 1,
                context.signature(&ty),
                context.signature(&value.ty)
            ))
        }
        _ => value,
    }
}

fn type_error(reason: String) -> IData {
    IData::error(ErrorType::TypeError, reason)
}

/// Runs one operation call on `data` and caches the result under the
/// call's id.
pub fn execute_operation(data: &IData, operation: &IData, context: &Context) -> IData {
    let result = run_operation(data, operation, context);
    context.set_result(&operation.id, result.clone());
    result
}

fn run_operation(data: &IData, operation: &IData, context: &Context) -> IData {
    let skip = get_skip_execution(context, data, None);
    if let Some(SkipExecution::Error(error)) = &skip {
        return error.clone();
    }
    let Some(call) = operation.as_operation() else {
        return type_error(format!("`{operation}` is not an operation call"));
    };
    let Some(name) = call.name.as_deref() else {
        return type_error("Operation call has no name".to_string());
    };
    let Some(op) = find_operation(context, data, name) else {
        debug!("no operation `{name}` for `{}`", data.ty);
        return type_error(format!(
            "Operation `{name}` cannot be chained on `{}`",
            context.signature(&data.ty)
        ));
    };
    invoke_operation(
        &op,
        data,
        &call.parameters,
        &context.with_skip(skip),
        &operation.id,
    )
}

fn invoke_operation(
    op: &OperationRef,
    data: &IData,
    args: &[Statement],
    context: &Context,
    operation_id: &str,
) -> IData {
    let name = op.name();
    let parameters = op.parameters(data);
    let expected = parameters.get(1..).unwrap_or(&[]);

    for (idx, param) in expected.iter().enumerate() {
        if args.get(idx).is_none() && !param.is_optional {
            return type_error(format!("Parameter {} of `{name}` is required", idx + 1));
        }
    }

    if context.is_skipping() {
        // Keep the arguments evaluated for display, but run nothing.
        let arg_types: Vec<DataType> = args
            .iter()
            .map(|a| execute_statement(a, &context.child()).ty)
            .collect();
        let result = op.result_type(data, &arg_types);
        return create_default_data(&result, &default_options(context));
    }

    let lazy = match op {
        OperationRef::Builtin(builtin) => match builtin.handler {
            Handler::Lazy(f) => Some(f),
            Handler::Eager(_) => None,
        },
        _ => None,
    };
    if let Some(f) = lazy {
        return into_data(name, f(context, data, args));
    }

    let values = match evaluate_arguments(name, expected, args, context) {
        Ok(values) => values,
        Err(error) => return error,
    };

    match op {
        OperationRef::Builtin(builtin) => {
            let Handler::Eager(f) = builtin.handler else {
                return type_error(format!("`{name}` cannot be called eagerly"));
            };
            if !builtin.cacheable {
                return into_data(name, f(context, data, &values));
            }
            let fingerprint = fingerprint(builtin.group, name, data, &values);
            if let Some(cached) = context.store.get_fingerprint(&fingerprint) {
                trace!("reusing cached result of `{name}`");
                context.store.set_cacheable_result(operation_id, cached.clone());
                return cached;
            }
            let result = into_data(name, f(context, data, &values));
            if !result.is_error() {
                context.store.set_fingerprint(fingerprint, result.clone());
                context.store.set_cacheable_result(operation_id, result.clone());
            }
            result
        }
        OperationRef::Extension(extension) => {
            into_data(name, (extension.handler)(data, &values))
        }
        OperationRef::UserDefined { data: op_data, .. } => {
            execute_user_operation(context, op_data, Some(data.clone()), values)
        }
    }
}

fn fingerprint(group: &str, name: &str, data: &IData, values: &[IData]) -> String {
    let args: Vec<serde_json::Value> = values.iter().map(IData::to_plain_json).collect();
    format!(
        "{group}.{name}:{}:{}",
        data.to_plain_json(),
        serde_json::Value::Array(args)
    )
}

fn into_data(name: &str, result: Result<IData>) -> IData {
    match result {
        Ok(data) => data,
        Err(e) => {
            debug!("`{name}` failed: {e}");
            IData::error(ErrorType::RuntimeError, e)
        }
    }
}

// Arguments beyond the declared parameters are ignored.
fn evaluate_arguments(
    name: &str,
    expected: &[ParameterType],
    args: &[Statement],
    context: &Context,
) -> core::result::Result<Vec<IData>, IData> {
    let mut values = Vec::with_capacity(args.len());
    for (idx, (arg, param)) in args.iter().zip(expected).enumerate() {
        let value = execute_statement(
            arg,
            &context.child().with_expected_type(Some(param.ty.clone())),
        );
        if value.is_error() {
            return Err(value);
        }
        if !is_type_compatible(&value.ty, &param.ty) {
            return Err(type_error(format!(
                "Parameter {} of `{name}` expects `{}`. Got `{}` instead",
                idx + 1,
                context.signature(&param.ty),
                context.signature(&value.ty)
            )));
        }
        values.push(value);
    }
    Ok(values)
}

/// Calls an operation value with positional arguments.
pub fn call_operation(context: &Context, operation: &IData, args: Vec<IData>) -> IData {
    execute_user_operation(context, operation, None, args)
}

/// Runs a user-defined operation body with its parameters bound. The
/// receiver, when present, binds to the first parameter. Parameters with no
/// value fall back to their declared default.
pub fn execute_user_operation(
    context: &Context,
    operation: &IData,
    receiver: Option<IData>,
    args: Vec<IData>,
) -> IData {
    let limit = context.options.max_call_depth;
    if context.call_depth >= limit {
        let error = LimitError::CallDepthExceeded {
            depth: context.call_depth + 1,
            limit,
        };
        return IData::error(ErrorType::RuntimeError, error);
    }
    let Some(op) = operation.as_operation() else {
        return type_error(format!("`{operation}` is not an operation"));
    };

    let mut scope = context.child();
    scope.call_depth += 1;
    let mut values = receiver.into_iter().chain(args);
    for param in op.parameters.iter() {
        let value = match values.next() {
            Some(value) => value,
            None => execute_statement(param, &scope),
        };
        if let Some(name) = &param.name {
            scope.declare(name, &param.id, value);
        }
    }
    execute_statements(&op.statements, &mut scope)
}

/// Evaluates statements in order, publishing named results. Stops at the
/// first error. Returns the last result, `undefined` when empty.
pub fn execute_statements(statements: &[Statement], context: &mut Context) -> IData {
    let mut last = IData::undefined();
    for statement in statements {
        let result = execute_statement(statement, context);
        if let Some(name) = &statement.name {
            context.declare(name, &statement.id, result.clone());
        }
        if result.is_error() {
            return result;
        }
        last = result;
    }
    last
}

/// Evaluates every parameter and body statement of an operation value so
/// each has a cached result. Unlike a call, errors do not stop the walk.
pub fn set_operation_results(operation: &IData, context: &Context) -> IData {
    let Some(op) = operation.as_operation() else {
        return IData::undefined();
    };
    let mut scope = context.child();
    for param in op.parameters.iter() {
        let value = execute_statement(param, &scope);
        if let Some(name) = &param.name {
            scope.declare(name, &param.id, value);
        }
    }
    let mut last = IData::undefined();
    for statement in op.statements.iter() {
        let result = execute_statement(statement, &scope);
        if let Some(name) = &statement.name {
            scope.declare(name, &statement.id, result.clone());
        }
        last = result;
    }
    last
}

/// Builds a call of `name` on `data` with defaults for its required
/// parameters, runs it once and records the result type.
pub fn create_operation_call(context: &Context, data: &IData, name: &str) -> Result<IData> {
    let op = find_operation(context, data, name).ok_or_else(|| {
        anyhow!(
            "operation `{name}` is not available on `{}`",
            context.signature(&data.ty)
        )
    })?;
    let parameters = op.parameters(data);
    let expected = parameters.get(1..).unwrap_or(&[]).to_vec();
    let options = default_options(context);
    let args: Vec<Statement> = expected
        .iter()
        .filter(|p| !p.is_optional)
        .map(|p| default_argument(p, &options))
        .collect();
    let arg_types: Vec<DataType> = args.iter().map(Statement::result_type).collect();
    let result = op.result_type(data, &arg_types);

    let mut call = IData::new(
        DataType::operation(expected.clone(), result),
        Value::Operation(OperationValue::call(name, args)),
    );
    let executed = execute_operation(data, &call, context);
    if !executed.is_error() {
        call.ty = DataType::operation(expected, executed.ty.clone());
    }
    Ok(call)
}

pub(crate) fn default_argument(param: &ParameterType, options: &DefaultValueOptions) -> Statement {
    let mut statement = Statement::new(create_default_data(&param.ty, options));
    statement.is_optional = param.is_optional;
    statement
}

fn child_type(statement: &Statement, context: &Context) -> DataType {
    match context.get_result(&statement.id) {
        Some(result) => result.ty,
        None => statement.result_type(),
    }
}

/// Structural type of a value. Children contribute the types of their
/// computed results when available. The expected type decides between
/// tuples and arrays, and between dictionaries and objects.
pub fn infer_type_from_value(value: &Value, context: &Context) -> DataType {
    let expected = context.expected_type.as_ref().map(|t| t.dereference());
    match value {
        Value::Undefined => DataType::Undefined,
        Value::String(_) => DataType::String,
        Value::Number(_) => DataType::Number,
        Value::Boolean(_) => DataType::Boolean,
        Value::Array(items) => {
            let types: Vec<DataType> = items.iter().map(|s| child_type(s, context)).collect();
            match expected {
                Some(DataType::Tuple { .. }) => DataType::Tuple { elements: types },
                _ if types.is_empty() => DataType::array(
                    expected
                        .and_then(|t| t.element_type())
                        .unwrap_or(DataType::Unknown),
                ),
                _ => DataType::array(resolve_union_type(&types, false, None)),
            }
        }
        Value::Object(entries) => match expected {
            Some(DataType::Dictionary { element_type }) => {
                let types: Vec<DataType> =
                    entries.values().map(|s| child_type(s, context)).collect();
                match types.is_empty() {
                    true => DataType::dictionary(element_type.as_ref().clone()),
                    false => DataType::dictionary(resolve_union_type(&types, false, None)),
                }
            }
            _ => {
                let properties: IndexMap<Rc<str>, DataType> = entries
                    .iter()
                    .map(|(k, s)| (k.clone(), child_type(s, context)))
                    .collect();
                let required = entries
                    .iter()
                    .filter(|(_, s)| !s.is_optional)
                    .map(|(k, _)| k.clone())
                    .collect();
                DataType::Object {
                    properties,
                    required,
                }
            }
        },
        Value::Operation(op) => {
            let parameters = op
                .parameters
                .iter()
                .map(|p| ParameterType {
                    name: p.name.clone(),
                    ty: child_type(p, context),
                    is_optional: p.is_optional,
                })
                .collect();
            let result = match op.statements.last() {
                Some(last) => child_type(last, context),
                None => DataType::Unknown,
            };
            DataType::operation(parameters, result)
        }
        Value::Condition(c) => DataType::Condition {
            result: Box::new(resolve_union_type(
                &[
                    child_type(&c.true_branch, context),
                    child_type(&c.false_branch, context),
                ],
                false,
                None,
            )),
        },
        Value::Reference(r) => DataType::reference(
            context
                .get_variable(&r.name)
                .map(|v| v.data.ty.dereference().clone())
                .unwrap_or(DataType::Unknown),
        ),
        Value::Error(_) => match expected {
            Some(DataType::Error { error_type }) => DataType::error(*error_type),
            _ => DataType::error(ErrorType::CustomError),
        },
        Value::Instance(i) => DataType::instance(
            &i.class_name,
            i.constructor_args
                .iter()
                .map(|s| ParameterType::receiver(child_type(s, context)))
                .collect(),
        ),
    }
}

/// Declared or computed type of a statement's final value.
pub fn get_statement_result_type(statement: &Statement, context: &Context) -> DataType {
    child_type(statement, context)
}
