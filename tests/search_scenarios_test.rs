//! End-to-end indexing and search scenarios.

use fathom::schema::{FieldOptions, Schema};
use fathom::{Index, Query, QueryParser, Term};

#[test]
fn test_two_titles_term_hits() {
    let mut builder = Schema::builder();
    let title = builder.add_text_field("title", FieldOptions::default());
    let schema = builder.build().unwrap();
    let index = Index::create_in_ram(schema).unwrap();

    let mut writer = index.writer().unwrap();
    for text in ["The Old Man and the Sea", "Of Mice and Men"] {
        let mut doc = fathom::Document::new();
        doc.add_text(title, text);
        writer.add_document(doc).unwrap();
    }
    writer.commit().unwrap();

    let searcher = index.reader().unwrap().searcher();
    let parser = QueryParser::for_index(&index, vec![title]);
    for (input, expected) in [("sea", 1), ("men", 1), ("and", 2)] {
        let query = parser.parse(input).unwrap();
        let results = searcher.search(&query, 10).unwrap();
        assert_eq!(results.count, expected, "query `{input}`");
    }
}

#[test]
fn test_term_count_independent_of_segment_layout() {
    let mut builder = Schema::builder();
    let body = builder.add_text_field("body", FieldOptions::default());
    let schema = builder.build().unwrap();
    let index = Index::create_in_ram(schema).unwrap();

    // one commit per document: one segment each
    let mut writer = index.writer().unwrap();
    for i in 0..5u32 {
        let mut doc = fathom::Document::new();
        let text = if i % 2 == 0 { "shared token" } else { "other" };
        doc.add_text(body, text);
        writer.add_document(doc).unwrap();
        writer.commit().unwrap();
    }

    let searcher = index.reader().unwrap().searcher();
    let query = Query::Term(Term::from_field_text(body, "shared"));
    assert_eq!(searcher.search(&query, 10).unwrap().count, 3);
    assert_eq!(searcher.doc_freq(&Term::from_field_text(body, "shared")), 3);
}

#[test]
fn test_stored_fields_round_trip() {
    let mut builder = Schema::builder();
    let kept = builder.add_text_field("kept", FieldOptions::default());
    let hidden = builder.add_text_field("hidden", FieldOptions::default().unstored());
    let count = builder.add_u64_field("count", FieldOptions::default());
    let schema = builder.build().unwrap();
    let index = Index::create_in_ram(schema).unwrap();

    let mut writer = index.writer().unwrap();
    let mut doc = fathom::Document::new();
    doc.add_text(kept, "visible text");
    doc.add_text(hidden, "searchable but not stored");
    doc.add_u64(count, 7);
    writer.add_document(doc).unwrap();
    writer.commit().unwrap();

    let searcher = index.reader().unwrap().searcher();
    let results = searcher
        .search(&Query::Term(Term::from_field_text(hidden, "searchable")), 1)
        .unwrap();
    assert_eq!(results.count, 1);

    let stored = searcher.doc(results.hits[0].address).unwrap();
    assert_eq!(
        stored.get_first(kept).and_then(|v| v.as_str()),
        Some("visible text")
    );
    assert_eq!(stored.get_first(count).and_then(|v| v.as_u64()), Some(7));
    assert!(stored.get_first(hidden).is_none());
}

#[test]
fn test_multi_valued_field_preserved() {
    let mut builder = Schema::builder();
    let tag = builder.add_text_field("tag", FieldOptions::default());
    let schema = builder.build().unwrap();
    let index = Index::create_in_ram(schema).unwrap();

    let mut writer = index.writer().unwrap();
    let mut doc = fathom::Document::new();
    doc.add_text(tag, "first");
    doc.add_text(tag, "second");
    doc.add_text(tag, "first");
    writer.add_document(doc).unwrap();
    writer.commit().unwrap();

    let searcher = index.reader().unwrap().searcher();
    let results = searcher
        .search(&Query::Term(Term::from_field_text(tag, "second")), 1)
        .unwrap();
    let stored = searcher.doc(results.hits[0].address).unwrap();
    let values: Vec<&str> = stored.get_all(tag).filter_map(|v| v.as_str()).collect();
    assert_eq!(values, vec!["first", "second", "first"]);
}
