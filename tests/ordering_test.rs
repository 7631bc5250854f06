//! Fast-field ordering of search results.

use fathom::schema::{FieldOptions, Schema};
use fathom::{FathomError, Index, Order, Query, SearchOptions};

fn order_index(values: &[u64]) -> Index {
    let mut builder = Schema::builder();
    let title = builder.add_text_field("title", FieldOptions::default());
    let order = builder.add_u64_field("order", FieldOptions::default().fast());
    let schema = builder.build().unwrap();
    let index = Index::create_in_ram(schema).unwrap();

    let mut writer = index.writer().unwrap();
    for &value in values {
        let mut doc = fathom::Document::new();
        doc.add_text(title, format!("doc number {value}"));
        doc.add_u64(order, value);
        writer.add_document(doc).unwrap();
    }
    writer.commit().unwrap();
    index
}

fn ordered_values(index: &Index, order: Order) -> Vec<u64> {
    let searcher = index.reader().unwrap().searcher();
    let options = SearchOptions::top(10).order_by("order", order);
    let results = searcher.search_with(&Query::All, &options).unwrap();
    let field = searcher.schema().get_field("order").unwrap();
    results
        .hits
        .iter()
        .map(|hit| {
            let doc = searcher.doc(hit.address).unwrap();
            doc.get_first(field).and_then(|v| v.as_u64()).unwrap()
        })
        .collect()
}

#[test]
fn test_order_by_fast_field_ascending_and_descending() {
    let index = order_index(&[0, 2, 1]);
    assert_eq!(ordered_values(&index, Order::Asc), vec![0, 1, 2]);
    assert_eq!(ordered_values(&index, Order::Desc), vec![2, 1, 0]);
}

#[test]
fn test_order_by_spans_segments() {
    let mut builder = Schema::builder();
    let order = builder.add_u64_field("order", FieldOptions::default().fast());
    let schema = builder.build().unwrap();
    let index = Index::create_in_ram(schema).unwrap();

    let mut writer = index.writer().unwrap();
    for value in [5u64, 1, 3] {
        let mut doc = fathom::Document::new();
        doc.add_u64(order, value);
        writer.add_document(doc).unwrap();
        writer.commit().unwrap();
    }

    let searcher = index.reader().unwrap().searcher();
    let results = searcher
        .search_with(
            &Query::All,
            &SearchOptions::top(10).order_by("order", Order::Asc),
        )
        .unwrap();
    let values: Vec<u64> = results
        .hits
        .iter()
        .map(|hit| {
            searcher
                .doc(hit.address)
                .unwrap()
                .get_first(order)
                .and_then(|v| v.as_u64())
                .unwrap()
        })
        .collect();
    assert_eq!(values, vec![1, 3, 5]);
}

#[test]
fn test_order_by_non_fast_field_is_an_error() {
    let index = order_index(&[0]);
    let searcher = index.reader().unwrap().searcher();
    let err = searcher
        .search_with(
            &Query::All,
            &SearchOptions::top(10).order_by("title", Order::Asc),
        )
        .unwrap_err();
    assert!(matches!(err, FathomError::Config(_)));
}
