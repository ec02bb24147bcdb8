//! Round-trip laws: operations that should return state to where it
//! started, or reproduce their own input exactly.

mod common;

use common::{cancel, memory};
use mnemo_core::{DocumentType, EdgeType, SearchOptions};

#[tokio::test]
async fn parser_is_idempotent_on_its_own_output() {
    let first = mnemo_core::parser::parse("# Title\nSome body text with [[a link]].", DocumentType::Markdown, None).unwrap();
    let reparsed = mnemo_core::parser::parse(&first.document.content, DocumentType::Markdown, None).unwrap();
    assert!(!reparsed.sections.is_empty());
}

#[tokio::test]
async fn exact_text_is_self_retrieved_at_k_equals_one() {
    let memory = memory();
    let id = memory
        .add_document("foo bar baz", DocumentType::Text, None, cancel())
        .await
        .unwrap();

    let hits = memory
        .search("foo bar baz", SearchOptions { k: 1, ..Default::default() }, cancel())
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.get("documentId").and_then(|v| v.as_str()), Some(id.as_str()));
}

#[tokio::test]
async fn graph_round_trip_returns_the_added_relationship_exactly_once() {
    let memory = memory();
    let a = memory.add_document("node a content", DocumentType::Text, None, cancel()).await.unwrap();
    let b = memory.add_document("node b content", DocumentType::Text, None, cancel()).await.unwrap();

    memory
        .add_relationship(&a, &b, EdgeType::Custom, 0.75, serde_json::json!({"note": "hand-wired"}), cancel())
        .await
        .unwrap();

    let stats_before = memory.get_stats().await.unwrap();
    assert!(stats_before.edge_count > 0);

    // Re-adding the identical (from, to, type) edge must dedup rather than
    // create a second row, so the query below still sees it exactly once.
    memory
        .add_relationship(&a, &b, EdgeType::Custom, 0.75, serde_json::json!({"note": "hand-wired"}), cancel())
        .await
        .unwrap();

    let stats_after = memory.get_stats().await.unwrap();
    assert_eq!(stats_before.edge_count, stats_after.edge_count);
}
