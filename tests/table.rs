use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use incview::{Row, Table, TableError, Value, row};

fn people() -> Table {
    Table::from_rows([
        row! { "name" => "Mario", "age" => 32 },
        row! { "name" => "Luigi", "age" => 36 },
        row! { "name" => "Peach", "age" => 27 },
        row! { "name" => "Toad", "age" => 27 },
    ])
}

fn number(row: &Row, column: &str) -> f64 {
    row.get(column).and_then(Value::as_number).unwrap()
}

fn text<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).and_then(Value::as_str).unwrap()
}

#[tokio::test]
async fn map_transforms_and_drops_none() {
    let initials = people()
        .map(|row, index| {
            let name = row.get("name")?.as_str()?;
            if name == "Toad" {
                return None;
            }
            Some(row! { "initial" => &name[..1], "index" => index as i64 })
        })
        .rows()
        .await
        .unwrap();

    assert_eq!(initials.len(), 3);
    assert_eq!(text(&initials[0], "initial"), "M");
    assert_eq!(number(&initials[2], "index"), 2.0);
}

#[tokio::test]
async fn extend_merges_and_overwrites_columns() {
    let extended = people()
        .extend(|row, _| Some(row! { "age" => number(row, "age") * 2.0, "tall" => true }))
        .first()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(number(&extended, "age"), 64.0);
    assert_eq!(extended["tall"], Value::Bool(true));
    assert_eq!(text(&extended, "name"), "Mario");
}

#[tokio::test]
async fn filter_keeps_matching_rows() {
    let young = people().filter(|row, _| number(row, "age") < 30.0);
    assert_eq!(young.len().await.unwrap(), 2);
    assert!(
        young
            .all(|row, _| number(row, "age") == 27.0)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn sort_is_stable_and_null_sorts_first() {
    let table = Table::from_rows([
        row! { "k" => "b", "tag" => 1 },
        row! { "k" => Value::Null, "tag" => 2 },
        row! { "k" => "a", "tag" => 3 },
        row! { "k" => "a", "tag" => 4 },
    ]);

    let sorted = table.sort_by(|row, _| row["k"].clone()).rows().await.unwrap();
    let tags: Vec<f64> = sorted.iter().map(|row| number(row, "tag")).collect();
    assert_eq!(tags, [2.0, 3.0, 4.0, 1.0]);
}

#[tokio::test]
async fn sort_by_keys_compares_lexicographically() {
    let sorted = people()
        .sort_by_keys(|row, _| vec![row["age"].clone(), row["name"].clone()])
        .rows()
        .await
        .unwrap();

    let names: Vec<&str> = sorted.iter().map(|row| text(row, "name")).collect();
    assert_eq!(names, ["Peach", "Toad", "Mario", "Luigi"]);
}

#[tokio::test]
async fn dates_sort_like_numbers() {
    let date = |y| Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).unwrap();
    let table = Table::from_rows([
        row! { "at" => date(2021), "tag" => 1 },
        row! { "at" => date(2019), "tag" => 2 },
        row! { "at" => date(2020), "tag" => 3 },
    ]);

    let sorted = table.sort_by(|row, _| row["at"].clone()).rows().await.unwrap();
    let tags: Vec<f64> = sorted.iter().map(|row| number(row, "tag")).collect();
    assert_eq!(tags, [2.0, 3.0, 1.0]);
}

#[tokio::test]
async fn chain_concatenates_in_order() {
    let more = Table::from_rows([row! { "name" => "Bowser", "age" => 40 }]);
    let all = people().chain(&more);

    assert_eq!(all.len().await.unwrap(), 5);
    assert_eq!(text(&all.last().await.unwrap().unwrap(), "name"), "Bowser");
}

#[tokio::test]
async fn flat_map_expands_each_row() {
    let table = Table::from_rows([row! { "n" => 2 }, row! { "n" => 1 }]);
    let expanded = table
        .flat_map(|row, _| {
            let n = number(row, "n") as usize;
            Table::from_rows(vec![row.clone(); n])
        })
        .rows()
        .await
        .unwrap();

    assert_eq!(expanded.len(), 3);
    assert_eq!(number(&expanded[0], "n"), 2.0);
    assert_eq!(number(&expanded[2], "n"), 1.0);
}

#[tokio::test]
async fn unique_keeps_first_occurrences() {
    let table = Table::from_rows([
        row! { "v" => 1 },
        row! { "v" => 2 },
        row! { "v" => 1 },
        row! { "v" => 3 },
        row! { "v" => 2 },
    ]);

    let unique = table.unique().rows().await.unwrap();
    let values: Vec<f64> = unique.iter().map(|row| number(row, "v")).collect();
    assert_eq!(values, [1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn group_by_preserves_first_appearance_order() {
    let groups = people()
        .group_by(|row, _| row["age"].clone())
        .await
        .unwrap();

    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].len().await.unwrap(), 1); // 32
    assert_eq!(groups[1].len().await.unwrap(), 1); // 36
    let youngest = groups[2].rows().await.unwrap(); // 27, 27
    assert_eq!(youngest.len(), 2);
    assert_eq!(text(&youngest[0], "name"), "Peach");
}

#[tokio::test]
async fn folds_and_aggregates() {
    let table = people();

    let total = table
        .fold(0.0, |acc, row, _| acc + number(row, "age"))
        .await
        .unwrap();
    assert_eq!(total, 122.0);

    assert_eq!(table.sum_by(|row, _| number(row, "age")).await.unwrap(), Some(122.0));
    assert_eq!(
        table.average_by(|row, _| number(row, "age")).await.unwrap(),
        Some(30.5)
    );

    let empty = Table::empty();
    assert_eq!(empty.sum_by(|_, _| 1.0).await.unwrap(), None);
    assert_eq!(empty.average_by(|_, _| 1.0).await.unwrap(), None);

    // Earliest row wins ties.
    let youngest = table.min_by(|row, _| row["age"].clone()).await.unwrap();
    assert_eq!(text(&youngest.unwrap(), "name"), "Peach");
    let oldest = table.max_by(|row, _| row["age"].clone()).await.unwrap();
    assert_eq!(text(&oldest.unwrap(), "name"), "Luigi");
}

#[tokio::test]
async fn positional_access() {
    let table = people();

    assert_eq!(text(&table.first().await.unwrap().unwrap(), "name"), "Mario");
    assert_eq!(text(&table.last().await.unwrap().unwrap(), "name"), "Toad");
    assert_eq!(text(&table.nth(-2).await.unwrap().unwrap(), "name"), "Peach");
    assert!(table.nth(17).await.unwrap().is_none());

    assert!(Table::empty().first().await.unwrap().is_none());
    assert!(Table::empty().last().await.unwrap().is_none());

    assert_eq!(
        table.position(|row, _| text(row, "name") == "Peach").await.unwrap(),
        Some(2)
    );
    assert!(
        table
            .find(|row, _| number(row, "age") > 100.0)
            .await
            .unwrap()
            .is_none()
    );
    assert!(table.any(|row, _| text(row, "name") == "Luigi").await.unwrap());
}

#[tokio::test]
async fn slicing_operations() {
    let table = people();

    assert_eq!(table.skip(3).len().await.unwrap(), 1);
    assert_eq!(table.take(2).len().await.unwrap(), 2);
    assert_eq!(table.take(99).len().await.unwrap(), 4);

    let after_thirty = table.skip_while(|row, _| number(row, "age") >= 30.0);
    assert_eq!(text(&after_thirty.first().await.unwrap().unwrap(), "name"), "Peach");

    let while_thirty = table.take_while(|row, _| number(row, "age") >= 30.0);
    assert_eq!(while_thirty.len().await.unwrap(), 2);

    assert_eq!(
        table.take_while(|_, _| true).len().await.unwrap(),
        4,
        "take_while with no break keeps everything"
    );
}

#[tokio::test]
async fn column_selection() {
    let picked = people().pick(["name"]).first().await.unwrap().unwrap();
    assert_eq!(picked.len(), 1);
    assert!(picked.contains_key("name"));

    let omitted = people().omit(["name"]).first().await.unwrap().unwrap();
    assert_eq!(omitted.len(), 1);
    assert!(omitted.contains_key("age"));
}

#[tokio::test]
async fn tables_are_lazy_and_share_materialization() {
    let calls = Arc::new(AtomicU32::new(0));

    let counted = calls.clone();
    let mapped = people().map(move |row, _| {
        counted.fetch_add(1, Ordering::SeqCst);
        Some(row.clone())
    });

    assert_eq!(calls.load(Ordering::SeqCst), 0, "nothing runs before consumption");

    mapped.rows().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // A second consumer, and a clone, reuse the shared result.
    mapped.len().await.unwrap();
    mapped.clone().first().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn async_sources_and_errors_propagate() {
    let delayed = Table::from_future(async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(vec![row! { "v" => 1 }])
    });
    assert_eq!(delayed.len().await.unwrap(), 1);

    let failed = Table::from_future(async { Err(TableError::msg("boom")) });
    let error = failed.rows().await.unwrap_err();
    assert_eq!(error.to_string(), "boom");

    // Transformations over a failed table fail with the same error.
    let mapped_error = failed.map(|row, _| Some(row.clone())).len().await.unwrap_err();
    assert_eq!(mapped_error.to_string(), "boom");
}
