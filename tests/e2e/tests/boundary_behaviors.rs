//! Boundary behaviors: inputs at the edge of what's valid, checked for
//! graceful handling rather than errors.

mod common;

use common::{cancel, memory};
use mnemo_core::{DocumentType, HashingEmbeddingProvider, EmbeddingProvider, SearchOptions};

#[tokio::test]
async fn empty_corpus_search_returns_empty_list_not_an_error() {
    let memory = memory();
    let hits = memory.search("anything", SearchOptions::default(), cancel()).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn embedding_whitespace_only_text_returns_zero_vector_not_an_error() {
    let provider = HashingEmbeddingProvider::new(32);
    let embedding = provider.embed("   \n\t  ").await.unwrap();
    assert!(embedding.vector.iter().all(|&x| x == 0.0));
}

#[tokio::test]
async fn k_zero_returns_empty_and_k_above_index_size_returns_everything() {
    let memory = memory();
    memory.add_document("one document about widgets", DocumentType::Text, None, cancel()).await.unwrap();
    memory.add_document("another document about gadgets", DocumentType::Text, None, cancel()).await.unwrap();

    let zero = memory
        .search("widgets", SearchOptions { k: 0, ..Default::default() }, cancel())
        .await
        .unwrap();
    assert!(zero.is_empty());

    let stats = memory.get_stats().await.unwrap();
    let all = memory
        .search("widgets", SearchOptions { k: stats.vector_count + 100, ..Default::default() }, cancel())
        .await
        .unwrap();
    assert_eq!(all.len(), stats.vector_count);
}

#[tokio::test]
async fn deleting_a_childless_node_succeeds_and_unknown_id_is_not_found() {
    let memory = memory();
    let id = memory.add_document("a lone document with no relationships", DocumentType::Text, None, cancel()).await.unwrap();
    memory.delete_document(&id, cancel()).await.unwrap();

    let err = memory.delete_document("never-existed", cancel()).await.unwrap_err();
    assert!(matches!(err, mnemo_core::MemoryError::NotFound(_)));
}

#[tokio::test]
async fn graph_depth_zero_disables_expansion_and_matches_pure_vector_search() {
    let memory = memory();
    memory.add_document("widgets are handy tools", DocumentType::Text, None, cancel()).await.unwrap();

    let hits = memory
        .search(
            "widgets",
            SearchOptions { graph_depth: 0, include_related: true, ..Default::default() },
            cancel(),
        )
        .await
        .unwrap();

    for hit in &hits {
        assert_eq!(hit.provenance.graph_score, 0.0);
        assert_eq!(hit.provenance.combined_score, hit.provenance.vector_score * SearchOptions::default().vector_weight);
    }
}
