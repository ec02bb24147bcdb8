//! Named end-to-end scenarios exercising the full ingest/search/learn
//! lifecycle together rather than one operation at a time.

mod common;

use common::{cancel, memory};
use mnemo_core::{DocumentType, EdgeType, PyramidLevel, SearchOptions};

/// 1. Cite-and-retrieve.
#[tokio::test]
async fn cite_and_retrieve() {
    let memory = memory();
    let a = memory
        .add_document("---\ntitle: IntroToWidgets\n---\nintro to widgets\n", DocumentType::Markdown, None, cancel())
        .await
        .unwrap();
    let b = memory
        .add_document(
            "---\ntitle: SeeMore\n---\nsee [1] for details\n\n[1]: IntroToWidgets\n",
            DocumentType::Markdown,
            None,
            cancel(),
        )
        .await
        .unwrap();

    let hits = memory
        .search(
            "details about widgets",
            SearchOptions { k: 2, include_related: true, graph_depth: 1, ..Default::default() },
            cancel(),
        )
        .await
        .unwrap();

    let doc_ids: Vec<&str> = hits.iter().filter_map(|h| h.metadata.get("documentId").and_then(|v| v.as_str())).collect();
    assert!(doc_ids.contains(&a.as_str()));
    assert!(doc_ids.contains(&b.as_str()));

    let b_hit = hits
        .iter()
        .find(|h| h.metadata.get("documentId").and_then(|v| v.as_str()) == Some(b.as_str()))
        .unwrap();
    assert!(b_hit.provenance.graph_score > 0.0, "B should inherit a non-zero graph score via its CITES edge to A");
}

/// 2. Duplicate ingestion.
#[tokio::test]
async fn duplicate_ingestion_is_a_no_op() {
    let memory = memory();
    let first = memory.add_document("identical content every time", DocumentType::Text, None, cancel()).await.unwrap();
    let before = memory.get_stats().await.unwrap();

    let second = memory.add_document("identical content every time", DocumentType::Text, None, cancel()).await.unwrap();
    let after = memory.get_stats().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(before.node_count, after.node_count);
    assert_eq!(before.vector_count, after.vector_count);
}

/// 3. Pyramid happy path.
#[tokio::test]
async fn pyramid_happy_path() {
    let memory = memory();
    let doc = memory
        .add_document("project deliverable supporting the objective", DocumentType::Text, None, cancel())
        .await
        .unwrap();

    let mission = memory
        .create_pyramid_entity("acme", PyramidLevel::Mission, None, "Mission", Some("grow sustainably".to_string()), vec![], cancel())
        .await
        .unwrap();
    let objective = memory
        .create_pyramid_entity(
            "acme",
            PyramidLevel::Objective,
            Some(&mission),
            "Objective",
            Some("grow sustainably this year".to_string()),
            vec![],
            cancel(),
        )
        .await
        .unwrap();
    let project = memory
        .create_pyramid_entity(
            "acme",
            PyramidLevel::Project,
            Some(&objective),
            "Project",
            Some("grow sustainably this year via widget rollout".to_string()),
            vec![doc],
            cancel(),
        )
        .await
        .unwrap();

    let alignment = memory.calculate_alignment(&project, cancel()).await.unwrap();
    assert!(alignment.score >= 0.5 && alignment.score <= 1.0);

    let path = memory.get_path_to_mission(&project, cancel()).await.unwrap();
    assert_eq!(path.iter().map(|e| e.id.clone()).collect::<Vec<_>>(), vec![objective, mission]);
}

/// 4. Cascade delete.
#[tokio::test]
async fn cascade_delete_leaves_cited_document_intact() {
    let memory = memory();
    let long_body = "word ".repeat(2_500); // several 500-char chunks
    let a = memory.add_document(&long_body, DocumentType::Text, None, cancel()).await.unwrap();
    let b = memory.add_document("an unrelated document b", DocumentType::Text, None, cancel()).await.unwrap();

    memory
        .add_relationship(&a, &b, EdgeType::Cites, 0.8, serde_json::json!({}), cancel())
        .await
        .unwrap();

    let before = memory.get_stats().await.unwrap();
    memory.delete_document(&a, cancel()).await.unwrap();
    let after = memory.get_stats().await.unwrap();

    // B's own chunk survives untouched; only A's chunks (and the edge
    // between them) are gone.
    assert_eq!(after.vector_count, 1);
    assert_eq!(before.edge_count - after.edge_count, 1);
}

/// 5. Trajectory round-trip.
#[tokio::test]
async fn trajectory_round_trip() {
    let memory = memory();
    let chunk = memory.add_document("widgets learned from a trajectory", DocumentType::Text, None, cancel()).await.unwrap();

    let trajectory = memory.begin_trajectory(cancel()).await.unwrap();
    for reward in [0.2, 0.8, 0.6] {
        memory
            .record_trajectory_step(&trajectory, "q".to_string(), vec![chunk.clone()], Some(chunk.clone()), reward, cancel())
            .await
            .unwrap();
    }
    memory.end_trajectory(&trajectory, 0.9, cancel()).await.unwrap();

    let before = memory.get_stats().await.unwrap().learned_patterns;
    let learned = memory.force_learn(cancel()).await.unwrap();
    let after = memory.get_stats().await.unwrap().learned_patterns;

    assert_eq!(learned, 1);
    assert_eq!(after, before + 1);
}

/// 6. Hybrid fusion.
#[tokio::test]
async fn hybrid_fusion_boosts_the_related_document() {
    let memory = memory();
    let x = memory.add_document("widgets are excellent tools #gizmo", DocumentType::Text, None, cancel()).await.unwrap();
    let y = memory.add_document("completely unrelated wording #gizmo", DocumentType::Text, None, cancel()).await.unwrap();

    let hits = memory
        .search(
            "widgets are excellent tools",
            SearchOptions { k: 2, vector_weight: 0.5, include_related: true, ..Default::default() },
            cancel(),
        )
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    let y_hit = hits
        .iter()
        .find(|h| h.metadata.get("documentId").and_then(|v| v.as_str()) == Some(y.as_str()))
        .expect("Y should be pulled in via its RELATES_TO edge to X");
    assert!(y_hit.provenance.graph_score >= 0.5);
    let _ = x;
}
