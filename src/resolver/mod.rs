use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, trace};

use crate::error::ResolveError;
use crate::registry::{ViewId, ViewRegistry};
use crate::table::Table;

mod handle;

pub use handle::ViewHandle;

/// Event emitted to the configured handler when cached results are
/// invalidated. Carries names only, never row contents.
#[derive(Debug, Clone)]
pub enum ResolverEvent {
    /// `view_names` holds the invalidated name first, then its transitive
    /// dependents in discovery order.
    DataInvalidation { view_names: Vec<Arc<str>> },
}

type EventHandler = Arc<dyn Fn(&ResolverEvent) + Send + Sync>;

/// The view resolution engine: a dependency-tracking memoization cache over
/// a fixed registry of views.
///
/// Dependencies are not declared up front. The first evaluation of a view
/// discovers them: every call the view function makes through its
/// [`ViewHandle`] records an edge, and those edges drive
/// [`invalidate`](Resolver::invalidate) later. A view is evaluated at most
/// once per invalidation epoch; between invalidations every `resolve`
/// returns the cached table.
pub struct Resolver {
    registry: ViewRegistry,
    state: Mutex<ResolverState>,
    event_handler: Option<EventHandler>,
}

/// The only mutable state: the result cache and the discovered edge table.
/// Owned exclusively by the resolver; all mutation funnels through one lock.
struct ResolverState {
    cache: HashMap<ViewId, Table>,
    /// Discovered dependency edges, pointing dependency -> dependent.
    edges: DiGraphMap<ViewId, ()>,
}

/// Names currently mid-evaluation in one top-level resolution chain, used
/// solely to detect cycles before they recurse.
#[derive(Default)]
struct CallStack(Vec<ViewId>);

impl CallStack {
    fn push(&mut self, id: ViewId) {
        self.0.push(id);
    }

    fn pop(&mut self) {
        self.0.pop();
    }

    fn contains(&self, id: ViewId) -> bool {
        self.0.contains(&id)
    }

    /// The offending call chain, starting at the earlier occurrence of
    /// `offending` and ending with the call that closed the cycle.
    fn cycle_error(&self, offending: ViewId, registry: &ViewRegistry) -> ResolveError {
        let start = self.0.iter().position(|id| *id == offending).unwrap_or(0);
        let mut cycle: Vec<Arc<str>> = self.0[start..]
            .iter()
            .map(|id| registry.name(*id).clone())
            .collect();
        cycle.push(registry.name(offending).clone());
        ResolveError::CircularDependency { cycle }
    }
}

impl Resolver {
    /// Build a resolver over a closed registry of views.
    pub fn new(registry: ViewRegistry) -> Self {
        Self {
            registry,
            state: Mutex::new(ResolverState {
                cache: HashMap::new(),
                edges: DiGraphMap::new(),
            }),
            event_handler: None,
        }
    }

    /// Install a handler for [`ResolverEvent`]s. The handler runs outside
    /// the engine's lock, so it may call back into the resolver.
    pub fn with_event_handler(
        mut self,
        handler: impl Fn(&ResolverEvent) + Send + Sync + 'static,
    ) -> Self {
        self.event_handler = Some(Arc::new(handler));
        self
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    /// Resolve a view by name, evaluating it and any not-yet-cached
    /// dependencies.
    ///
    /// The returned [`Table`] is lazy; resolution itself never awaits row
    /// data. Concurrent resolutions of the same name serialize on the
    /// engine's lock: the first evaluates, the rest receive clones of the
    /// same table and share its eventual materialization.
    pub fn resolve(&self, name: &str) -> Result<Table, ResolveError> {
        let id = self.registry.id(name)?;
        let mut state = self.state.lock();
        let mut stack = CallStack::default();
        self.resolve_in(&mut state, &mut stack, id)
    }

    fn resolve_in(
        &self,
        state: &mut ResolverState,
        stack: &mut CallStack,
        id: ViewId,
    ) -> Result<Table, ResolveError> {
        if let Some(table) = state.cache.get(&id) {
            match table.settled_error() {
                None => {
                    trace!(view = %self.registry.name(id), "cache hit");
                    return Ok(table.clone());
                }
                Some(error) => {
                    // A result that already failed must not be served again;
                    // evict it and retry the view function from scratch.
                    debug!(view = %self.registry.name(id), %error, "evicting failed result");
                    state.cache.remove(&id);
                }
            }
        }

        trace!(view = %self.registry.name(id), "cache miss");
        let function = self.registry.function(id).clone();
        state.clear_dependencies_of(id);
        stack.push(id);
        let result = {
            let mut handle = ViewHandle::new(self, &mut *state, &mut *stack, id);
            (*function)(&mut handle)
        };
        stack.pop();

        // On failure nothing is cached for this view; dependencies that
        // completed keep their entries so a corrected retry reuses them.
        let table = result?;
        debug!(view = %self.registry.name(id), "evaluated");
        state.cache.insert(id, table.clone());
        Ok(table)
    }

    /// Evict `name` and every transitive dependent recorded by past
    /// evaluations, then notify the event handler with the affected names,
    /// invalidated name first.
    ///
    /// Taking the engine's lock means an invalidation issued while a view
    /// function is mid-evaluation waits for that evaluation to finish and
    /// then evicts, rather than pulling the entry out from under it.
    pub fn invalidate(&self, name: &str) -> Result<(), ResolveError> {
        let id = self.registry.id(name)?;

        let affected = {
            let mut state = self.state.lock();
            let affected = state.transitive_dependents(id);
            for id in &affected {
                state.cache.remove(id);
            }
            affected
        };

        let view_names: Vec<Arc<str>> = affected
            .iter()
            .map(|id| self.registry.name(*id).clone())
            .collect();
        debug!(views = ?view_names, "invalidated");

        if let Some(handler) = &self.event_handler {
            handler(&ResolverEvent::DataInvalidation { view_names });
        }
        Ok(())
    }

    /// Unconditionally clear the whole cache. Walks no edges and emits no
    /// event.
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        debug!(entries = state.cache.len(), "cache cleared");
        state.cache.clear();
    }

    /// Every view whose last evaluation read `name`, directly or
    /// transitively, in discovery order. `name` itself is not included.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<Arc<str>>, ResolveError> {
        let id = self.registry.id(name)?;
        let state = self.state.lock();
        Ok(state
            .transitive_dependents(id)
            .into_iter()
            .skip(1)
            .map(|id| self.registry.name(id).clone())
            .collect())
    }

    /// Read-only snapshot of the recorded dependency edges as
    /// `(dependency, dependent)` name pairs, for diagnostics and tests.
    pub fn dependency_edges(&self) -> Vec<(Arc<str>, Arc<str>)> {
        let state = self.state.lock();
        state
            .edges
            .all_edges()
            .map(|(dependency, dependent, _)| {
                (
                    self.registry.name(dependency).clone(),
                    self.registry.name(dependent).clone(),
                )
            })
            .collect()
    }
}

impl ResolverState {
    /// Drop every edge in which `id` is the dependent. A re-evaluation may
    /// take a different path through conditional logic and read a different
    /// set of dependencies, so the edge set is rebuilt from scratch each
    /// time rather than diffed.
    fn clear_dependencies_of(&mut self, id: ViewId) {
        if !self.edges.contains_node(id) {
            return;
        }
        let dependencies: Vec<ViewId> = self
            .edges
            .neighbors_directed(id, Direction::Incoming)
            .collect();
        for dependency in dependencies {
            self.edges.remove_edge(dependency, id);
        }
    }

    /// `id` first, then its transitive dependents in breadth-first
    /// discovery order. The walk keeps a visited set, so even a malformed
    /// edge graph cannot loop it.
    fn transitive_dependents(&self, id: ViewId) -> Vec<ViewId> {
        let mut order = vec![id];
        let mut visited: HashSet<ViewId> = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);

        while let Some(next) = queue.pop_front() {
            if !self.edges.contains_node(next) {
                continue;
            }
            for dependent in self.edges.neighbors_directed(next, Direction::Outgoing) {
                if visited.insert(dependent) {
                    order.push(dependent);
                    queue.push_back(dependent);
                }
            }
        }

        order
    }
}
