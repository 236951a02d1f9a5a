// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Re-walks statement lists after an edit so that references, argument
//! lists and operation types agree with the current program again.

use crate::builtins::{find_operation, Handler, OperationRef};
use crate::context::{Branch, Context, SkipExecution};
use crate::interpreter::{
    default_argument, default_options, execute_chain, execute_data, execute_statement,
    get_skip_execution, infer_type_from_value, resolve_reference,
};
use crate::narrowing::get_statement_narrowing;
use crate::project::{project_context, ProjectFile};
use crate::types::{is_type_compatible, DataType, ParameterType};
use crate::value::{ConditionValue, IData, OperationValue, ReferenceValue, Statement, Value};
use crate::Rc;

use log::debug;

/// Brings `statements` up to date after `changed` was edited (or removed,
/// when `remove` is set). Statements before the one containing the edit are
/// carried over untouched; every later statement is rebuilt.
pub fn update_statements(
    statements: &[Statement],
    context: &Context,
    changed: Option<&Statement>,
    remove: bool,
) -> Vec<Statement> {
    let start = changed
        .and_then(|c| statements.iter().position(|s| s.contains_id(&c.id)))
        .unwrap_or(0);

    let mut scope = context.child();
    let mut updated = Vec::with_capacity(statements.len());
    for (idx, statement) in statements.iter().enumerate() {
        if idx < start {
            let result = match scope.get_result(&statement.id) {
                Some(result) => result,
                None => execute_statement(statement, &scope),
            };
            publish(&mut scope, statement, result);
            updated.push(statement.clone());
            continue;
        }

        let statement = match changed {
            Some(c) if idx == start && statement.id == c.id => {
                if remove {
                    continue;
                }
                c.clone()
            }
            Some(c) if idx == start => statement.replace_nested(c, remove),
            _ => statement.clone(),
        };
        let (statement, result) = update_statement(&statement, &scope);
        publish(&mut scope, &statement, result);
        updated.push(statement);
    }
    updated
}

fn publish(scope: &mut Context, statement: &Statement, result: IData) {
    if let Some(name) = &statement.name {
        scope.declare(name, &statement.id, result);
    }
}

/// Rebuilds one statement and evaluates it, repairing each chained call on
/// the way.
pub(crate) fn update_statement(statement: &Statement, context: &Context) -> (Statement, IData) {
    let rebuilt = Statement {
        data: update_data(&statement.data, context),
        ..statement.clone()
    };
    let initial = execute_data(&rebuilt.data, context);
    let (result, operations) = execute_chain(&rebuilt, initial, context, repair_operation);
    let operations = match context.is_skipping() {
        true => operations,
        false => operations
            .into_iter()
            .map(|op| with_executed_type(op, context))
            .collect(),
    };
    let result = resolve_reference(&result, context);
    context.set_result(&rebuilt.id, result.clone());
    (
        Statement {
            operations,
            ..rebuilt
        },
        result,
    )
}

// A call is typed by the result it produced, the same way
// `create_operation_call` types a new one.
fn with_executed_type(operation: IData, context: &Context) -> IData {
    let parameters = match &operation.ty {
        DataType::Operation { parameters, .. } => Some(parameters.clone()),
        _ => None,
    };
    match (parameters, context.get_result(&operation.id)) {
        (Some(parameters), Some(result)) if !result.is_error() => IData {
            ty: DataType::operation(parameters, result.ty),
            ..operation
        },
        _ => operation,
    }
}

fn update_data(data: &IData, context: &Context) -> IData {
    match &data.value {
        Value::Reference(reference) => rebind_reference(data, reference, context),
        Value::Array(items) => {
            let child = context.child();
            let items = items.iter().map(|s| update_statement(s, &child).0).collect();
            IData {
                value: Value::Array(Rc::new(items)),
                ..data.clone()
            }
        }
        Value::Object(entries) => {
            let child = context.child();
            let entries = entries
                .iter()
                .map(|(k, s)| (k.clone(), update_statement(s, &child).0))
                .collect();
            IData {
                value: Value::Object(Rc::new(entries)),
                ..data.clone()
            }
        }
        Value::Condition(condition) => IData {
            value: Value::Condition(Rc::new(update_condition(condition, context))),
            ..data.clone()
        },
        Value::Operation(_) => update_operation(data, context, None, false),
        _ => data.clone(),
    }
}

// Follows the declaring statement first so renames are picked up, then falls
// back to the name.
fn rebind_reference(data: &IData, reference: &ReferenceValue, context: &Context) -> IData {
    let by_id = match reference.id.is_empty() {
        true => None,
        false => context.find_variable_by_id(&reference.id),
    };
    let target = by_id.or_else(|| {
        context
            .variables
            .get_key_value(&*reference.name)
    });
    let Some((name, var)) = target else {
        return data.clone();
    };
    if name != &reference.name || var.id != reference.id {
        debug!("rebinding `{}` to `{name}`", reference.name);
    }
    IData {
        id: data.id.clone(),
        ty: DataType::reference(var.data.ty.dereference().clone()),
        value: Value::Reference(ReferenceValue {
            name: name.clone(),
            id: var.id.clone(),
        }),
    }
}

fn update_condition(condition: &ConditionValue, context: &Context) -> ConditionValue {
    let narrowing = get_statement_narrowing(context, &condition.condition);
    let (updated, result) = update_statement(&condition.condition, &context.child());
    let taken = result.as_bool() == Some(true);

    let guarded = context.with_narrowing(narrowing);
    let skip_unless = |live: bool| match live || result.is_error() {
        true => context.skip_execution.clone(),
        false => Some(
            context
                .skip_execution
                .clone()
                .unwrap_or(SkipExecution::Unreachable),
        ),
    };
    let (true_branch, _) = update_statement(
        &condition.true_branch,
        &guarded.enter_branch(Branch::Narrowed).with_skip(skip_unless(taken)),
    );
    let (false_branch, _) = update_statement(
        &condition.false_branch,
        &guarded.enter_branch(Branch::Inverse).with_skip(skip_unless(!taken)),
    );
    ConditionValue {
        condition: updated,
        true_branch,
        false_branch,
    }
}

// Re-validates the arguments of one call against the parameters the
// operation currently resolves to for `data`.
fn repair_operation(data: &IData, operation: &IData, context: &Context) -> IData {
    let Some(call) = operation.as_operation() else {
        return operation.clone();
    };
    let Some(name) = call.name.as_deref() else {
        return operation.clone();
    };
    if let Some(SkipExecution::Error(_)) = get_skip_execution(context, data, None) {
        return operation.clone();
    }
    let Some(op) = find_operation(context, data, name) else {
        return operation.clone();
    };

    let parameters = op.parameters(data);
    let expected = parameters.get(1..).unwrap_or(&[]);
    let lazy = matches!(
        &op,
        OperationRef::Builtin(b) if matches!(b.handler, Handler::Lazy(_))
    );
    let options = default_options(context);

    let mut arguments = Vec::with_capacity(expected.len());
    for (idx, param) in expected.iter().enumerate() {
        match call.parameters.get(idx) {
            Some(argument) => {
                let (argument, ty) = update_argument(argument, param, lazy, context);
                if ty.is_error() || is_type_compatible(&ty, &param.ty) {
                    arguments.push(argument);
                } else {
                    debug!("replacing argument {} of `{name}`", idx + 1);
                    arguments.push(Statement {
                        id: argument.id.clone(),
                        ..default_argument(param, &options)
                    });
                }
            }
            None if !param.is_optional => {
                debug!("adding missing argument {} of `{name}`", idx + 1);
                arguments.push(default_argument(param, &options));
            }
            None => (),
        }
    }
    if call.parameters.len() > expected.len() {
        debug!("dropping extra arguments of `{name}`");
    }

    let ty = match context.is_skipping() {
        true => operation.ty.clone(),
        false => {
            let argument_types: Vec<DataType> =
                arguments.iter().map(Statement::result_type).collect();
            DataType::operation(expected.to_vec(), op.result_type(data, &argument_types))
        }
    };
    IData {
        id: operation.id.clone(),
        ty,
        value: Value::Operation(OperationValue {
            name: call.name.clone(),
            parameters: Rc::new(arguments),
            statements: call.statements.clone(),
        }),
    }
}

// Lazy arguments are only rebound: running them here would bypass the
// short-circuiting their operation performs.
fn update_argument(
    argument: &Statement,
    param: &ParameterType,
    lazy: bool,
    context: &Context,
) -> (Statement, DataType) {
    if lazy {
        let rebound = Statement {
            data: rebind_all(&argument.data, context),
            ..argument.clone()
        };
        let ty = rebound.result_type();
        return (rebound, ty);
    }
    let scope = context.child().with_expected_type(Some(param.ty.clone()));
    let (argument, result) = update_statement(argument, &scope);
    (argument, result.ty)
}

fn rebind_all(data: &IData, context: &Context) -> IData {
    match &data.value {
        Value::Reference(reference) => rebind_reference(data, reference, context),
        _ => data.clone(),
    }
}

/// Rebuilds an operation value: its parameters are re-evaluated and bound,
/// its body is brought up to date and its type is re-derived from both.
pub fn update_operation(
    operation: &IData,
    context: &Context,
    changed: Option<&Statement>,
    remove: bool,
) -> IData {
    let Some(op) = operation.as_operation() else {
        return operation.clone();
    };
    let mut scope = context.child();
    let mut parameters = Vec::with_capacity(op.parameters.len());
    for parameter in op.parameters.iter() {
        let (parameter, result) = update_statement(parameter, &scope);
        publish(&mut scope, &parameter, result);
        parameters.push(parameter);
    }
    let statements = update_statements(&op.statements, &scope, changed, remove);
    let value = Value::Operation(OperationValue {
        name: op.name.clone(),
        parameters: Rc::new(parameters),
        statements: Rc::new(statements),
    });
    IData {
        id: operation.id.clone(),
        ty: infer_type_from_value(&value, &scope),
        value,
    }
}

/// Applies an edited file and brings every other file of the project up to
/// date with it.
pub fn update_files(
    files: &[ProjectFile],
    changed: &ProjectFile,
    context: &Context,
) -> Vec<ProjectFile> {
    let content = update_operation(&changed.content, &project_context(context, files), None, false);
    let changed = ProjectFile {
        content,
        ..changed.clone()
    };
    let mut files: Vec<ProjectFile> = files
        .iter()
        .map(|f| match f.id == changed.id {
            true => changed.clone(),
            false => f.clone(),
        })
        .collect();
    if !files.iter().any(|f| f.id == changed.id) {
        files.push(changed.clone());
    }

    let scope = project_context(context, &files);
    files
        .into_iter()
        .map(|file| match file.id == changed.id {
            true => file,
            false => ProjectFile {
                content: update_operation(&file.content, &scope, None, false),
                ..file
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::OperationValue;

    fn call(name: &str, args: Vec<Statement>) -> IData {
        IData::new(
            DataType::operation(vec![], DataType::Unknown),
            Value::Operation(OperationValue::call(name, args)),
        )
    }

    #[test]
    fn missing_arguments_are_synthesized() {
        let statement = Statement::new(IData::string("a")).with_operations(vec![call("concat", vec![])]);
        let context = Context::default();
        let updated = update_statements(&[statement], &context, None, false);

        let op = updated[0].operations[0].as_operation().map(|o| o.parameters.len());
        assert_eq!(op, Some(1));
        assert_eq!(
            updated[0].operations[0].ty,
            DataType::operation(
                vec![ParameterType::new("value", DataType::String)],
                DataType::String
            )
        );
    }

    #[test]
    fn incompatible_arguments_are_replaced() {
        let argument = Statement::new(IData::number(3.0));
        let id = argument.id.clone();
        let statement = Statement::new(IData::string("a"))
            .with_operations(vec![call("concat", vec![argument])]);
        let updated = update_statements(&[statement], &Context::default(), None, false);

        let args = updated[0].operations[0]
            .as_operation()
            .map(|o| o.parameters.as_ref().clone())
            .unwrap_or_default();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].id, id);
        assert_eq!(args[0].data.as_str(), Some(""));
    }

    #[test]
    fn prefix_is_not_revisited() {
        let first = Statement::new(IData::number(1.0)).with_name("a");
        let second = Statement::new(IData::number(2.0)).with_name("b");
        let context = Context::default();
        // A stale cached value for the first statement must be reused as is.
        context.set_result(&first.id, IData::number(10.0));

        let edited = Statement {
            data: IData::number(5.0),
            ..second.clone()
        };
        let updated = update_statements(&[first.clone(), second], &context, Some(&edited), false);
        assert_eq!(updated[0], first);
        assert_eq!(updated[1].data.as_number(), Some(5.0));
        assert_eq!(
            context.get_result(&first.id).and_then(|d| d.as_number()),
            Some(10.0)
        );
    }

    #[test]
    fn removal_drops_the_statement() {
        let first = Statement::new(IData::number(1.0));
        let second = Statement::new(IData::number(2.0));
        let updated = update_statements(
            &[first.clone(), second.clone()],
            &Context::default(),
            Some(&second),
            true,
        );
        assert_eq!(updated, vec![first]);
    }
}
