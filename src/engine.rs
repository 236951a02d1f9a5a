// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::{self, Extension, OperationListItem};
use crate::context::Context;
use crate::interpreter::{self, execute_statements, execute_user_operation};
use crate::project::{project_context, Project, ProjectFile};
use crate::types::{DataType, ParameterType};
use crate::updater::update_files;
use crate::value::{IData, Statement};
use crate::Rc;

#[cfg(feature = "http")]
use crate::builtins::http::HttpTransport;

use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("extension `{0}` is already registered")]
    DuplicateExtension(String),
}

/// Evaluation settings shared by every context derived from an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Nesting depth at which type signatures are truncated.
    pub signature_depth: usize,
    /// Populate optional object properties in default values.
    pub include_optional_properties: bool,
    /// Maximum nesting of user-defined operation calls, callbacks included.
    /// The default stays within a 2 MiB thread stack in debug builds.
    pub max_call_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            signature_depth: 3,
            include_optional_properties: false,
            max_call_depth: 32,
        }
    }
}

/// Owns a project, the root evaluation context and host registrations.
#[derive(Clone)]
pub struct Engine {
    context: Context,
    project: Project,
}

/// Create a default engine.
impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let context = Context {
            options: Rc::new(options),
            ..Context::default()
        };
        Self {
            context,
            project: Project::new("project"),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.context.options
    }

    /// Registers a host operation. `parameters` lists the receiver first.
    /// Extensions are looked up before builtins of the same name.
    ///
    /// ```
    /// use opflow::*;
    /// # fn main() -> anyhow::Result<()> {
    /// let mut engine = Engine::new();
    /// engine.add_extension(
    ///     "double",
    ///     vec![ParameterType::receiver(DataType::Number)],
    ///     DataType::Number,
    ///     |data, _| Ok(IData::number(data.as_number().unwrap_or_default() * 2.0)),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_extension<F>(
        &mut self,
        name: &str,
        parameters: Vec<ParameterType>,
        result: DataType,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(&IData, &[IData]) -> Result<IData> + 'static,
    {
        if self.context.get_extension(name).is_some() {
            return Err(EngineError::DuplicateExtension(name.to_string()).into());
        }
        info!("registering extension `{name}`");
        Rc::make_mut(&mut self.context.extensions).push(Extension {
            name: name.into(),
            parameters,
            result,
            handler: Rc::new(handler),
        });
        Ok(())
    }

    /// Supplies the transport used by `Http` instance operations.
    #[cfg(feature = "http")]
    pub fn set_http_transport<T: HttpTransport + 'static>(&mut self, transport: T) {
        let transport: Rc<dyn HttpTransport> = Rc::new(transport);
        self.context.http = Some(transport);
    }

    pub fn load_project(&mut self, json: &str) -> Result<()> {
        let project = Project::from_json_str(json)?;
        info!(
            "loaded project `{}` with {} files",
            project.name,
            project.files.len()
        );
        self.project = project;
        Ok(())
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Adds a file, or replaces the file with the same id, without
    /// propagating the change.
    pub fn add_file(&mut self, file: ProjectFile) -> Result<()> {
        let mut project = self.project.clone();
        project.upsert_file(file);
        project.validate()?;
        self.project = project;
        Ok(())
    }

    /// Scope in which every project file is visible by name.
    pub fn context(&self) -> Context {
        project_context(&self.context, &self.project.files)
    }

    /// Calls the named file's operation with its parameters at their
    /// current values.
    pub fn eval_file(&self, name: &str) -> Result<IData> {
        let file = self.project.get_file(name)?;
        info!("evaluating `{name}`");
        Ok(execute_user_operation(
            &self.context(),
            &file.content,
            None,
            vec![],
        ))
    }

    /// Evaluates free-standing statements in the project scope.
    pub fn eval_statements(&self, statements: &[Statement]) -> IData {
        execute_statements(statements, &mut self.context())
    }

    /// Applies an edited file and brings the rest of the project in line.
    pub fn update_file(&mut self, file: ProjectFile) -> Result<()> {
        let files = update_files(&self.project.files, &file, &self.context);
        let mut project = self.project.clone();
        project.files = files;
        project.validate()?;
        info!("updated `{}`", file.name);
        self.project = project;
        Ok(())
    }

    pub fn get_result(&self, id: &str) -> Option<IData> {
        self.context.get_result(id)
    }

    /// Drops computed results. Cacheable ones (network responses) are kept.
    pub fn clear_results(&mut self) {
        self.context.store.remove_all();
    }

    pub fn get_filtered_operations(&self, data: &IData) -> Vec<OperationListItem> {
        builtins::get_filtered_operations(data, &self.context())
    }

    pub fn create_operation_call(&self, data: &IData, name: &str) -> Result<IData> {
        interpreter::create_operation_call(&self.context(), data, name)
    }
}
