// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

#[cfg(feature = "arc")]
pub use std::sync::Arc as Rc;

#[cfg(not(feature = "arc"))]
pub use std::rc::Rc;

pub mod builtins;
mod context;
mod defaults;
mod engine;
mod interpreter;
mod narrowing;
mod project;
mod types;
mod updater;
mod utils;
mod value;

pub use context::{Branch, Context, ExecutionStore, Instance, PromiseState, SkipExecution, Variable};
pub use defaults::{create_default_data, create_default_value, DefaultValueOptions};
pub use engine::{Engine, EngineError, EngineOptions};
pub use interpreter::{
    call_operation, create_operation_call, execute_operation, execute_statement,
    execute_statements, execute_user_operation, get_skip_execution, get_statement_result_type,
    infer_type_from_value, resolve_reference, set_operation_results,
};
pub use narrowing::{
    apply_type_narrowing, get_inverse_types, get_statement_narrowing, matches_type, narrow_type,
    Narrowing, TypeMap,
};
pub use project::{project_context, FileType, Project, ProjectError, ProjectFile};
pub use types::{
    get_type_signature, is_type_compatible, resolve_union_type, DataType, ErrorType,
    ParameterType,
};
pub use updater::{update_files, update_operation, update_statements};
pub use utils::limits::LimitError;
pub use value::{
    create_data, create_entity_id, create_statement, ConditionValue, CreateData, CreateStatement,
    EntityId, ErrorValue, IData, InstanceValue, OperationValue, ReferenceValue, Statement, Value,
};

#[cfg(feature = "http")]
pub use builtins::http::{HttpRequest, HttpResponse, HttpTransport};
pub use builtins::{
    data_supports_operation, find_operation, get_filtered_operations, get_grouped_operations,
    resolve_parameters, OperationListItem, OperationRef,
};
