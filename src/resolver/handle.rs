use crate::error::ResolveError;
use crate::registry::ViewId;
use crate::table::Table;

use super::{CallStack, Resolver, ResolverState};

/// A handle to the resolver during one view evaluation.
///
/// This is the capability object a view function sees: every other view
/// (and raw-source view) is reachable through [`view`](ViewHandle::view),
/// and each call registers a dependency edge for the view currently being
/// evaluated.
pub struct ViewHandle<'a> {
    resolver: &'a Resolver,
    state: &'a mut ResolverState,
    stack: &'a mut CallStack,
    current: ViewId,
}

impl<'a> ViewHandle<'a> {
    pub(super) fn new(
        resolver: &'a Resolver,
        state: &'a mut ResolverState,
        stack: &'a mut CallStack,
        current: ViewId,
    ) -> Self {
        Self {
            resolver,
            state,
            stack,
            current,
        }
    }

    /// Resolve `name` as a dependency of the view currently being
    /// evaluated.
    ///
    /// Fails with [`ResolveError::CircularDependency`] if `name` is already
    /// mid-evaluation on this call chain (checked before any recursion, so
    /// a cycle can never exhaust the real stack) and with
    /// [`ResolveError::UnknownView`] if `name` was never registered.
    pub fn view(&mut self, name: &str) -> Result<Table, ResolveError> {
        let dependency = self.resolver.registry().id(name)?;

        if self.stack.contains(dependency) {
            return Err(self.stack.cycle_error(dependency, self.resolver.registry()));
        }

        // Record the edge before consulting the cache: a hit still means
        // the current view read this dependency, and invalidation must
        // reach it.
        self.state.edges.add_edge(dependency, self.current, ());

        self.resolver.resolve_in(self.state, self.stack, dependency)
    }

    /// Name of the view currently being evaluated.
    pub fn current_view(&self) -> &str {
        self.resolver.registry().name(self.current)
    }
}
