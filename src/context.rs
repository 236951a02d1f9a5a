// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::Extension;
use crate::engine::EngineOptions;
use crate::narrowing::{Narrowing, TypeMap};
use crate::types::{get_type_signature, DataType};
use crate::value::{EntityId, IData};
use crate::Rc;

#[cfg(feature = "http")]
use crate::builtins::http::HttpTransport;

use core::cell::RefCell;
use core::fmt;

use indexmap::IndexMap;

/// A named value visible to subsequent statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Id of the declaring statement (or parameter).
    pub id: EntityId,
    pub data: IData,
}

pub type Variables = IndexMap<Rc<str>, Variable>;

/// Why a sub-tree must not actually run.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipExecution {
    Unreachable,
    Error(IData),
}

/// Which side of a [`Narrowing`] applies to an entered branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Narrowed,
    Inverse,
}

/// Opaque objects referenced by instance values.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    #[cfg(feature = "date")]
    Date(chrono::DateTime<chrono::Utc>),
    #[cfg(feature = "url")]
    Url(url::Url),
    #[cfg(feature = "http")]
    Http,
    Promise(PromiseState),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    Resolved(IData),
    Rejected(Rc<str>),
}

#[derive(Debug, Clone)]
struct CachedResult {
    data: IData,
    cacheable: bool,
}

#[derive(Debug, Default)]
struct StoreInner {
    results: IndexMap<EntityId, CachedResult>,
    fingerprints: IndexMap<String, IData>,
    instances: IndexMap<EntityId, Instance>,
}

/// Per-entity result cache and instance side table. Clones share the same
/// underlying maps; writes are last-write-wins per id.
#[derive(Clone, Default)]
pub struct ExecutionStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_result(&self, id: &str) -> Option<IData> {
        self.inner.borrow().results.get(id).map(|r| r.data.clone())
    }

    pub fn set_result(&self, id: &str, data: IData) {
        self.insert_result(id, data, false);
    }

    pub fn set_cacheable_result(&self, id: &str, data: IData) {
        self.insert_result(id, data, true);
    }

    // Once an entity is flagged cacheable it stays so.
    fn insert_result(&self, id: &str, data: IData, cacheable: bool) {
        let mut inner = self.inner.borrow_mut();
        match inner.results.get_mut(id) {
            Some(existing) => {
                existing.data = data;
                existing.cacheable |= cacheable;
            }
            None => {
                inner
                    .results
                    .insert(id.into(), CachedResult { data, cacheable });
            }
        }
    }

    pub fn remove_result(&self, id: &str) {
        self.inner.borrow_mut().results.shift_remove(id);
    }

    /// Drops every result not flagged cacheable.
    pub fn remove_all(&self) {
        self.inner.borrow_mut().results.retain(|_, r| r.cacheable);
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Result of a cacheable call previously made with identical inputs.
    pub fn get_fingerprint(&self, fingerprint: &str) -> Option<IData> {
        self.inner.borrow().fingerprints.get(fingerprint).cloned()
    }

    pub fn set_fingerprint(&self, fingerprint: String, data: IData) {
        self.inner.borrow_mut().fingerprints.insert(fingerprint, data);
    }

    pub fn get_instance(&self, id: &str) -> Option<Instance> {
        self.inner.borrow().instances.get(id).cloned()
    }

    pub fn set_instance(&self, id: &str, instance: Instance) {
        self.inner.borrow_mut().instances.insert(id.into(), instance);
    }
}

impl fmt::Debug for ExecutionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ExecutionStore")
            .field("results", &inner.results.len())
            .field("instances", &inner.instances.len())
            .finish()
    }
}

/// Ambient evaluation environment. Cloning is cheap: variables are shared
/// copy-on-write and the store is shared outright.
#[derive(Clone)]
pub struct Context {
    pub variables: Rc<Variables>,
    pub expected_type: Option<DataType>,
    pub narrowed_types: Option<Narrowing>,
    pub skip_execution: Option<SkipExecution>,
    pub store: ExecutionStore,
    pub extensions: Rc<Vec<Extension>>,
    pub options: Rc<EngineOptions>,
    pub call_depth: usize,
    #[cfg(feature = "http")]
    pub http: Option<Rc<dyn HttpTransport>>,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            variables: Rc::default(),
            expected_type: None,
            narrowed_types: None,
            skip_execution: None,
            store: ExecutionStore::new(),
            extensions: Rc::default(),
            options: Rc::default(),
            call_depth: 0,
            #[cfg(feature = "http")]
            http: None,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .field("expected_type", &self.expected_type)
            .field("narrowed_types", &self.narrowed_types)
            .field("skip_execution", &self.skip_execution)
            .field("call_depth", &self.call_depth)
            .finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a variable. A later declaration with the same name shadows
    /// the earlier one.
    pub fn declare(&mut self, name: &str, id: &str, data: IData) {
        Rc::make_mut(&mut self.variables).insert(
            name.into(),
            Variable {
                id: id.into(),
                data,
            },
        );
    }

    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn find_variable_by_id(&self, id: &str) -> Option<(&Rc<str>, &Variable)> {
        self.variables.iter().find(|(_, v)| v.id.as_ref() == id)
    }

    pub fn get_result(&self, id: &str) -> Option<IData> {
        self.store.get_result(id)
    }

    pub fn set_result(&self, id: &str, data: IData) {
        self.store.set_result(id, data)
    }

    pub fn with_expected_type(&self, expected_type: Option<DataType>) -> Context {
        let mut ctx = self.clone();
        ctx.expected_type = expected_type;
        ctx
    }

    pub fn with_narrowing(&self, narrowed_types: Option<Narrowing>) -> Context {
        let mut ctx = self.clone();
        ctx.narrowed_types = narrowed_types;
        ctx
    }

    pub fn with_skip(&self, skip_execution: Option<SkipExecution>) -> Context {
        let mut ctx = self.clone();
        ctx.skip_execution = skip_execution;
        ctx
    }

    /// Scope of a nested statement: no type hint and no pending narrowing.
    pub fn child(&self) -> Context {
        let mut ctx = self.clone();
        ctx.expected_type = None;
        ctx.narrowed_types = None;
        ctx
    }

    /// Scope of a branch guarded by the pending narrowing. The branch's side
    /// of the narrowing is merged into the variables and then discarded.
    pub fn enter_branch(&self, branch: Branch) -> Context {
        let mut ctx = self.child();
        if let Some(narrowing) = &self.narrowed_types {
            let types = match branch {
                Branch::Narrowed => &narrowing.narrowed,
                Branch::Inverse => &narrowing.inverse,
            };
            ctx.apply_types(types);
        }
        ctx
    }

    fn apply_types(&mut self, types: &TypeMap) {
        if types.is_empty() {
            return;
        }
        let variables = Rc::make_mut(&mut self.variables);
        for (name, ty) in types {
            if let Some(var) = variables.get_mut(name) {
                var.data.ty = ty.clone();
            }
        }
    }

    pub fn is_skipping(&self) -> bool {
        self.skip_execution.is_some()
    }

    /// Signature of `ty` truncated at the configured depth.
    pub fn signature(&self, ty: &DataType) -> String {
        get_type_signature(ty, self.options.signature_depth)
    }

    pub fn get_extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name.as_ref() == name)
    }
}
