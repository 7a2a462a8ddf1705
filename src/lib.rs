//! # incview
//!
//! incview computes derived tabular views over raw data sources. Views may
//! depend on other views and on raw sources, dependencies are discovered by
//! watching which views a view actually calls while it runs, and results
//! stay memoized until an upstream input is invalidated.
//!
//! There is no up-front dependency declaration and no static analysis: the
//! first evaluation of a view records an edge for every dependency it
//! reads, cycle detection happens at the moment an offending call is made,
//! and [`Resolver::invalidate`] evicts exactly the invalidated name plus
//! the transitive dependents those recorded edges reach.
//!
//! Views are registered once, by name, in a [`ViewRegistry`]. A view
//! function receives a [`ViewHandle`] through which every other view is
//! reachable, and returns a [`Table`], an immutable, lazily-evaluated,
//! possibly-asynchronous row sequence. Resolution itself is synchronous and
//! cheap; row data is only produced when a table is consumed.
//!
//! ```
//! use incview::{Resolver, Table, Value, ViewRegistry, row};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut views = ViewRegistry::new();
//!
//!     // A raw source: no dependencies of its own. In a real program this
//!     // would wrap a `DataSource` fetching from the network or disk.
//!     views.register("raw", |_| {
//!         Ok(Table::from_rows([row! { "v" => 1 }, row! { "v" => 2 }]))
//!     })?;
//!
//!     // Calling `ctx.view("raw")` is what makes `doubled` depend on
//!     // `raw`; there is no other declaration anywhere.
//!     views.register("doubled", |ctx| {
//!         Ok(ctx.view("raw")?.extend(|row, _| {
//!             let v = row.get("v")?.as_number()?;
//!             Some(row! { "v" => v * 2.0 })
//!         }))
//!     })?;
//!
//!     // Aggregating views wrap their async consumption in a new table.
//!     views.register("summed", |ctx| {
//!         let doubled = ctx.view("doubled")?;
//!         Ok(Table::from_future(async move {
//!             let total = doubled
//!                 .sum_by(|row, _| row.get("v").and_then(Value::as_number).unwrap_or(0.0))
//!                 .await?;
//!             Ok(vec![row! { "total" => total.unwrap_or(0.0) }])
//!         }))
//!     })?;
//!
//!     let resolver = Resolver::new(views);
//!
//!     let summed = resolver.resolve("summed")?;
//!     let first = futures::executor::block_on(summed.first())?;
//!     assert_eq!(first.unwrap()["total"], Value::Number(6.0));
//!
//!     // Cached: this re-runs nothing.
//!     resolver.resolve("summed")?;
//!
//!     // `raw` changed upstream; `doubled` and `summed` are evicted with
//!     // it and re-evaluate on the next resolve.
//!     resolver.invalidate("raw")?;
//!     let summed = resolver.resolve("summed")?;
//!     let first = futures::executor::block_on(summed.first())?;
//!     assert_eq!(first.unwrap()["total"], Value::Number(6.0));
//!
//!     Ok(())
//! }
//! ```
//!
//! A view that calls itself, directly or through other views, fails with
//! [`ResolveError::CircularDependency`] before any recursion happens, and
//! a view naming an unregistered dependency fails with
//! [`ResolveError::UnknownView`], never a silent empty result. Failed
//! evaluations are not cached; a later `resolve` retries from scratch.

mod error;
mod registry;
mod resolver;
mod source;
mod table;
mod value;

pub use error::{ResolveError, TableError};
pub use registry::{ViewFn, ViewRegistry};
pub use resolver::{Resolver, ResolverEvent, ViewHandle};
pub use source::DataSource;
pub use table::{Rows, Table};
pub use value::{Row, Value, compare_lexicographic, compare_values, row_key};
