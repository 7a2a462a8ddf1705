use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::resolver::ViewHandle;
use crate::table::Table;

/// A registered view function: receives a handle exposing every other view
/// and returns the view's table.
pub type ViewFn = Arc<dyn Fn(&mut ViewHandle<'_>) -> Result<Table, ResolveError> + Send + Sync>;

/// Dense index of a registered view name. Interning names keeps the cache
/// and the edge graph keyed by a `Copy` id instead of strings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ViewId(u32);

/// The fixed mapping from view name to view function.
///
/// Registration closes once the registry is handed to
/// [`Resolver::new`](crate::Resolver::new); view functions are never removed
/// or replaced while results computed from them may still be cached.
#[derive(Default)]
pub struct ViewRegistry {
    ids: HashMap<Arc<str>, ViewId>,
    names: Vec<Arc<str>>,
    functions: Vec<ViewFn>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view under `name`.
    pub fn register<F>(&mut self, name: impl Into<Arc<str>>, function: F) -> Result<(), ResolveError>
    where
        F: Fn(&mut ViewHandle<'_>) -> Result<Table, ResolveError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.ids.contains_key(&name) {
            return Err(ResolveError::DuplicateView(name));
        }

        let id = ViewId(self.names.len() as u32);
        self.ids.insert(name.clone(), id);
        self.names.push(name);
        self.functions.push(Arc::new(function));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.names.iter()
    }

    pub(crate) fn id(&self, name: &str) -> Result<ViewId, ResolveError> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| ResolveError::UnknownView(Arc::from(name)))
    }

    pub(crate) fn name(&self, id: ViewId) -> &Arc<str> {
        &self.names[id.0 as usize]
    }

    pub(crate) fn function(&self, id: ViewId) -> &ViewFn {
        &self.functions[id.0 as usize]
    }
}
