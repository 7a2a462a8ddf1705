use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use crate::error::TableError;
use crate::table::Table;
use crate::value::Row;

type FetchFn<P> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<Vec<Row>, TableError>> + Send + Sync>;

/// A raw source of rows living outside the engine, e.g. a network or disk
/// fetch.
///
/// [`retrieve`](DataSource::retrieve) wraps the fetch in a lazy [`Table`];
/// the fetch itself does not run until the table is consumed. Results are
/// optionally cached per parameter set (keyed by the parameters' canonical
/// JSON encoding) for a configurable time-to-live. Without a TTL nothing is
/// cached and every `retrieve` produces a fresh fetch.
///
/// A view backed by a data source looks, to the resolver, like any other
/// view with no dependencies; its data changing is signalled externally via
/// [`Resolver::invalidate`](crate::Resolver::invalidate).
pub struct DataSource<P = Row> {
    fetch: FetchFn<P>,
    cache: DashMap<String, CacheEntry>,
    ttl: Option<Duration>,
}

struct CacheEntry {
    table: Table,
    inserted: Instant,
}

impl CacheEntry {
    fn fresh(&self, ttl: Duration) -> bool {
        self.inserted.elapsed() < ttl
    }
}

impl<P: Serialize> DataSource<P> {
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Row>, TableError>> + Send + 'static,
    {
        Self {
            fetch: Arc::new(move |params| fetch(params).boxed()),
            cache: DashMap::new(),
            ttl: None,
        }
    }

    /// Keep retrieved tables for `ttl` per parameter set. Use
    /// `Duration::MAX` to cache until explicitly cleared.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// A lazy table of the rows for `params`.
    pub fn retrieve(&self, params: P) -> Table {
        let key = params_key(&params);

        if let Some(ttl) = self.ttl {
            if let Some(entry) = self.cache.get(&key) {
                if entry.fresh(ttl) {
                    return entry.table.clone();
                }
            }
        }

        debug!(params = %key, "fetching data source");
        let table = Table::from_future((self.fetch)(params));

        if self.ttl.is_some() {
            // An expired entry is simply overwritten on the next retrieve.
            self.cache.insert(
                key,
                CacheEntry {
                    table: table.clone(),
                    inserted: Instant::now(),
                },
            );
        }

        table
    }

    /// Drop the cached table for one parameter set.
    pub fn clear(&self, params: &P) {
        self.cache.remove(&params_key(params));
    }

    /// Drop every cached table.
    pub fn clear_all(&self) {
        self.cache.clear();
    }
}

fn params_key<P: Serialize>(params: &P) -> String {
    serde_json::to_string(params).expect("data source parameters must encode as JSON")
}
