use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::error::TableError;
use crate::value::{Row, Value, compare_lexicographic, compare_values, row_key, value_key};

/// Materialized table contents: an immutable, shared slice of rows.
pub type Rows = Arc<[Row]>;

type SharedRows = Shared<BoxFuture<'static, Result<Rows, TableError>>>;

/// An immutable, lazily-evaluated, possibly-asynchronous sequence of rows.
///
/// A `Table` is a handle to a deferred computation of its rows.
/// Transformations (`map`, `filter`, `sort_by`, ...) are cheap: they build a
/// new `Table` whose computation chains on this one, without running
/// anything. Consumers (`rows`, `first`, `fold`, ...) are `async` and
/// trigger materialization.
///
/// Cloning shares the underlying computation: however many handles exist and
/// however many of them are awaited, the rows are computed at most once and
/// every waiter sees the same result, including a failed one, which is why
/// [`TableError`] is cheaply cloneable.
#[derive(Clone)]
pub struct Table {
    data: SharedRows,
}

impl Table {
    fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Vec<Row>, TableError>> + Send + 'static,
    {
        let data = async move { future.await.map(Rows::from) }.boxed().shared();
        Self { data }
    }

    /// A table over rows that are already in memory.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let rows: Vec<Row> = rows.into_iter().collect();
        Self::new(async move { Ok(rows) })
    }

    /// A table whose rows are produced by `future` on first consumption.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Vec<Row>, TableError>> + Send + 'static,
    {
        Self::new(future)
    }

    /// A table with no rows. Distinct from "not computed": an empty table is
    /// a perfectly valid result.
    pub fn empty() -> Self {
        Self::from_rows([])
    }

    /// The error this table's computation already settled with, if any.
    /// Does not trigger materialization.
    pub(crate) fn settled_error(&self) -> Option<TableError> {
        match self.data.peek() {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }

    // Consumers

    /// Materialize the rows. Runs the deferred computation on first call;
    /// later calls (on any clone) return the shared result.
    pub async fn rows(&self) -> Result<Rows, TableError> {
        self.data.clone().await
    }

    pub async fn len(&self) -> Result<usize, TableError> {
        Ok(self.rows().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, TableError> {
        Ok(self.rows().await?.is_empty())
    }

    pub async fn first(&self) -> Result<Option<Row>, TableError> {
        self.nth(0).await
    }

    pub async fn last(&self) -> Result<Option<Row>, TableError> {
        self.nth(-1).await
    }

    /// The row at `n`. Negative indices count back from the end.
    pub async fn nth(&self, n: isize) -> Result<Option<Row>, TableError> {
        let rows = self.rows().await?;
        let len = rows.len() as isize;
        let index = if n < 0 {
            if len == 0 {
                return Ok(None);
            }
            (n % len + len) % len
        } else {
            n
        };
        Ok(rows.get(index as usize).cloned())
    }

    pub async fn find(
        &self,
        mut predicate: impl FnMut(&Row, usize) -> bool,
    ) -> Result<Option<Row>, TableError> {
        let rows = self.rows().await?;
        Ok(rows
            .iter()
            .enumerate()
            .find(|(index, row)| predicate(row, *index))
            .map(|(_, row)| row.clone()))
    }

    pub async fn position(
        &self,
        mut predicate: impl FnMut(&Row, usize) -> bool,
    ) -> Result<Option<usize>, TableError> {
        let rows = self.rows().await?;
        Ok(rows
            .iter()
            .enumerate()
            .position(|(index, row)| predicate(row, index)))
    }

    pub async fn all(
        &self,
        mut predicate: impl FnMut(&Row, usize) -> bool,
    ) -> Result<bool, TableError> {
        let rows = self.rows().await?;
        Ok(rows
            .iter()
            .enumerate()
            .all(|(index, row)| predicate(row, index)))
    }

    pub async fn any(
        &self,
        mut predicate: impl FnMut(&Row, usize) -> bool,
    ) -> Result<bool, TableError> {
        let rows = self.rows().await?;
        Ok(rows
            .iter()
            .enumerate()
            .any(|(index, row)| predicate(row, index)))
    }

    pub async fn fold<T>(
        &self,
        init: T,
        mut step: impl FnMut(T, &Row, usize) -> T,
    ) -> Result<T, TableError> {
        let rows = self.rows().await?;
        let mut acc = init;
        for (index, row) in rows.iter().enumerate() {
            acc = step(acc, row, index);
        }
        Ok(acc)
    }

    /// Partition rows into sub-tables by key, in order of first appearance.
    pub async fn group_by(
        &self,
        key: impl Fn(&Row, usize) -> Value,
    ) -> Result<Vec<Table>, TableError> {
        let rows = self.rows().await?;
        let mut group_of: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<Row>> = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            match group_of.entry(value_key(&key(row, index))) {
                Entry::Occupied(entry) => groups[*entry.get()].push(row.clone()),
                Entry::Vacant(entry) => {
                    entry.insert(groups.len());
                    groups.push(vec![row.clone()]);
                }
            }
        }

        Ok(groups.into_iter().map(Table::from_rows).collect())
    }

    /// Sum of `key` over all rows, `None` when the table is empty.
    pub async fn sum_by(
        &self,
        key: impl Fn(&Row, usize) -> f64,
    ) -> Result<Option<f64>, TableError> {
        self.fold(None, |acc: Option<f64>, row, index| {
            let value = key(row, index);
            Some(acc.map_or(value, |sum| sum + value))
        })
        .await
    }

    pub async fn average_by(
        &self,
        key: impl Fn(&Row, usize) -> f64,
    ) -> Result<Option<f64>, TableError> {
        let rows = self.rows().await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let sum: f64 = rows
            .iter()
            .enumerate()
            .map(|(index, row)| key(row, index))
            .sum();
        Ok(Some(sum / rows.len() as f64))
    }

    /// The row with the smallest key; the earliest such row on ties.
    pub async fn min_by(
        &self,
        key: impl Fn(&Row, usize) -> Value,
    ) -> Result<Option<Row>, TableError> {
        self.best_by(key, std::cmp::Ordering::Less).await
    }

    /// The row with the largest key; the earliest such row on ties.
    pub async fn max_by(
        &self,
        key: impl Fn(&Row, usize) -> Value,
    ) -> Result<Option<Row>, TableError> {
        self.best_by(key, std::cmp::Ordering::Greater).await
    }

    async fn best_by(
        &self,
        key: impl Fn(&Row, usize) -> Value,
        prefer: std::cmp::Ordering,
    ) -> Result<Option<Row>, TableError> {
        let rows = self.rows().await?;
        let mut best: Option<(Value, &Row)> = None;
        for (index, row) in rows.iter().enumerate() {
            let value = key(row, index);
            let better = match &best {
                Some((best_value, _)) => compare_values(&value, best_value) == prefer,
                None => true,
            };
            if better {
                best = Some((value, row));
            }
        }
        Ok(best.map(|(_, row)| row.clone()))
    }

    // Transformations

    /// Transform every row; rows mapped to `None` are dropped.
    pub fn map<F>(&self, f: F) -> Table
    where
        F: Fn(&Row, usize) -> Option<Row> + Send + Sync + 'static,
    {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            Ok(rows
                .iter()
                .enumerate()
                .filter_map(|(index, row)| f(row, index))
                .collect())
        })
    }

    /// Merge extra columns into every row; rows extended with `None` are
    /// dropped. Columns produced by `f` replace existing ones of the same
    /// name.
    pub fn extend<F>(&self, f: F) -> Table
    where
        F: Fn(&Row, usize) -> Option<Row> + Send + Sync + 'static,
    {
        self.map(move |row, index| {
            let extension = f(row, index)?;
            let mut merged = row.clone();
            merged.extend(extension);
            Some(merged)
        })
    }

    pub fn filter<F>(&self, predicate: F) -> Table
    where
        F: Fn(&Row, usize) -> bool + Send + Sync + 'static,
    {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            Ok(rows
                .iter()
                .enumerate()
                .filter(|(index, row)| predicate(row, *index))
                .map(|(_, row)| row.clone())
                .collect())
        })
    }

    /// Expand every row into a sub-table and concatenate the results in
    /// order.
    pub fn flat_map<F>(&self, f: F) -> Table
    where
        F: Fn(&Row, usize) -> Table + Send + Sync + 'static,
    {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            let mut out = Vec::new();
            for (index, row) in rows.iter().enumerate() {
                let sub = f(row, index).rows().await?;
                out.extend(sub.iter().cloned());
            }
            Ok(out)
        })
    }

    /// This table's rows followed by `other`'s.
    pub fn chain(&self, other: &Table) -> Table {
        let first = self.data.clone();
        let second = other.data.clone();
        Table::new(async move {
            let (first, second) = (first.await?, second.await?);
            Ok(first.iter().chain(second.iter()).cloned().collect())
        })
    }

    /// Stable sort by a single key.
    pub fn sort_by<F>(&self, key: F) -> Table
    where
        F: Fn(&Row, usize) -> Value + Send + Sync + 'static,
    {
        self.sort_by_keys(move |row, index| vec![key(row, index)])
    }

    /// Stable sort by a key tuple, compared lexicographically. The key
    /// function runs once per row.
    pub fn sort_by_keys<F>(&self, key: F) -> Table
    where
        F: Fn(&Row, usize) -> Vec<Value> + Send + Sync + 'static,
    {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            let mut decorated: Vec<(Vec<Value>, &Row)> = rows
                .iter()
                .enumerate()
                .map(|(index, row)| (key(row, index), row))
                .collect();
            decorated.sort_by(|(a, _), (b, _)| compare_lexicographic(a, b));
            Ok(decorated.into_iter().map(|(_, row)| row.clone()).collect())
        })
    }

    /// Drop duplicate rows, keeping the first occurrence. Rows are compared
    /// by their canonical encoding.
    pub fn unique(&self) -> Table {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            let mut seen = HashSet::new();
            Ok(rows
                .iter()
                .filter(|row| seen.insert(row_key(row)))
                .cloned()
                .collect())
        })
    }

    pub fn skip(&self, n: usize) -> Table {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            Ok(rows.iter().skip(n).cloned().collect())
        })
    }

    pub fn take(&self, n: usize) -> Table {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            Ok(rows.iter().take(n).cloned().collect())
        })
    }

    pub fn skip_while<F>(&self, predicate: F) -> Table
    where
        F: Fn(&Row, usize) -> bool + Send + Sync + 'static,
    {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            let start = rows
                .iter()
                .enumerate()
                .position(|(index, row)| !predicate(row, index));
            Ok(match start {
                Some(start) => rows[start..].to_vec(),
                None => Vec::new(),
            })
        })
    }

    pub fn take_while<F>(&self, predicate: F) -> Table
    where
        F: Fn(&Row, usize) -> bool + Send + Sync + 'static,
    {
        let data = self.data.clone();
        Table::new(async move {
            let rows = data.await?;
            let end = rows
                .iter()
                .enumerate()
                .position(|(index, row)| !predicate(row, index));
            Ok(match end {
                Some(end) => rows[..end].to_vec(),
                None => rows.to_vec(),
            })
        })
    }

    /// Keep only the named columns.
    pub fn pick<I, S>(&self, columns: I) -> Table
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.map(move |row, _| {
            Some(
                columns
                    .iter()
                    .filter_map(|column| Some((column.clone(), row.get(column)?.clone())))
                    .collect(),
            )
        })
    }

    /// Drop the named columns.
    pub fn omit<I, S>(&self, columns: I) -> Table
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.map(move |row, _| {
            let mut row = row.clone();
            for column in &columns {
                row.remove(column);
            }
            Some(row)
        })
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.peek() {
            Some(Ok(rows)) => write!(f, "Table({} rows)", rows.len()),
            Some(Err(_)) => write!(f, "Table(failed)"),
            None => write!(f, "Table(pending)"),
        }
    }
}
