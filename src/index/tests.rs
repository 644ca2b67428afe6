use super::*;

fn qa_schema() -> Schema {
    Schema::new([
        FieldSpec::text("question"),
        FieldSpec::text("answer"),
        FieldSpec::number("timestamp"),
    ])
}

fn cosine_spec(name: &str, dimension: usize) -> NamespaceSpec {
    NamespaceSpec::new(name, dimension, DistanceMetric::Cosine, qa_schema())
}

fn index_with(name: &str, dimension: usize) -> VectorIndex {
    let index = VectorIndex::new();
    index
        .ensure(cosine_spec(name, dimension), HnswParams::default())
        .expect("namespace creation should succeed");
    index
}

fn record(id: &str, vector: Vec<f32>) -> IndexedRecord {
    IndexedRecord::new(id, vector, Attributes::new())
}

#[test]
fn test_ensure_is_idempotent() {
    let index = index_with("qa", 3);
    assert!(
        index
            .ensure(cosine_spec("qa", 3), HnswParams::default())
            .is_ok()
    );
}

#[test]
fn test_ensure_rejects_dimension_change() {
    let index = index_with("qa", 3);
    let err = index
        .ensure(cosine_spec("qa", 4), HnswParams::default())
        .unwrap_err();
    assert!(matches!(err, IndexError::NamespaceMismatch { .. }));
}

#[test]
fn test_ensure_rejects_metric_change() {
    let index = index_with("qa", 3);
    let spec = NamespaceSpec::new("qa", 3, DistanceMetric::Euclidean, qa_schema());
    let err = index.ensure(spec, HnswParams::default()).unwrap_err();
    assert!(matches!(err, IndexError::NamespaceMismatch { .. }));
}

#[test]
fn test_ensure_rejects_schema_change() {
    let index = index_with("qa", 3);
    let spec = NamespaceSpec::new(
        "qa",
        3,
        DistanceMetric::Cosine,
        Schema::new([FieldSpec::text("question")]),
    );
    let err = index.ensure(spec, HnswParams::default()).unwrap_err();
    assert!(matches!(err, IndexError::NamespaceMismatch { .. }));
}

#[test]
fn test_add_dimension_mismatch_never_mutates() {
    let index = index_with("qa", 3);

    let err = index.add("qa", record("bad", vec![1.0, 0.0])).unwrap_err();
    assert!(matches!(
        err,
        IndexError::DimensionMismatch {
            expected: 3,
            actual: 2,
            ..
        }
    ));

    assert_eq!(index.stats("qa").unwrap().records, 0);
}

#[test]
fn test_add_rejects_undeclared_attribute() {
    let index = index_with("qa", 3);

    let mut attrs = Attributes::new();
    attrs.insert("category".into(), "misc".into());
    let err = index
        .add("qa", IndexedRecord::new("r", vec![1.0, 0.0, 0.0], attrs))
        .unwrap_err();

    assert!(matches!(err, IndexError::SchemaViolation { .. }));
    assert_eq!(index.stats("qa").unwrap().records, 0);
}

#[test]
fn test_add_rejects_wrong_kind() {
    let index = index_with("qa", 3);

    let mut attrs = Attributes::new();
    attrs.insert("timestamp".into(), "not a number".into());
    let err = index
        .add("qa", IndexedRecord::new("r", vec![1.0, 0.0, 0.0], attrs))
        .unwrap_err();

    assert!(matches!(err, IndexError::SchemaViolation { .. }));
}

#[test]
fn test_unknown_namespace() {
    let index = VectorIndex::new();
    let err = index.search("ghost", &[1.0], 1, 0.0).unwrap_err();
    assert!(matches!(err, IndexError::NamespaceNotFound { .. }));
}

#[test]
fn test_exact_match_cosine_similarity_is_one() {
    let index = index_with("qa", 3);
    let mut attrs = Attributes::new();
    attrs.insert("question".into(), "x".into());
    index
        .add("qa", IndexedRecord::new("d1", vec![1.0, 0.0, 0.0], attrs))
        .unwrap();

    let hits = index.search("qa", &[1.0, 0.0, 0.0], 1, 0.99).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "d1");
    assert_eq!(hits[0].similarity, 1.0);
}

#[test]
fn test_threshold_filters_results() {
    let index = index_with("qa", 2);
    index.add("qa", record("near", vec![1.0, 0.0])).unwrap();
    index.add("qa", record("far", vec![0.0, 1.0])).unwrap();

    let hits = index.search("qa", &[1.0, 0.0], 10, 0.9).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "near");
    for hit in &hits {
        assert!(hit.similarity >= 0.9);
    }
}

#[test]
fn test_no_qualifying_match_is_empty_not_error() {
    let index = index_with("qa", 2);
    index.add("qa", record("a", vec![0.0, 1.0])).unwrap();

    let hits = index.search("qa", &[1.0, 0.0], 5, 0.99).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_results_sorted_descending() {
    let index = index_with("qa", 3);
    index.add("qa", record("a", vec![1.0, 0.0, 0.0])).unwrap();
    index.add("qa", record("b", vec![0.9, 0.1, 0.0])).unwrap();
    index.add("qa", record("c", vec![0.5, 0.5, 0.0])).unwrap();

    let hits = index.search("qa", &[1.0, 0.0, 0.0], 10, 0.0).unwrap();
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    assert_eq!(hits[0].id, "a");
}

#[test]
fn test_equal_similarity_breaks_ties_by_recency() {
    let index = index_with("qa", 2);

    // Same vector, different creation times: identical similarity.
    index
        .add(
            "qa",
            record("old", vec![1.0, 0.0]).with_created_at(1_000),
        )
        .unwrap();
    index
        .add(
            "qa",
            record("new", vec![1.0, 0.0]).with_created_at(2_000),
        )
        .unwrap();

    let hits = index.search("qa", &[1.0, 0.0], 2, 0.0).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "new");
    assert_eq!(hits[1].id, "old");
}

#[test]
fn test_top_k_truncates() {
    let index = index_with("qa", 2);
    for i in 0..10 {
        let angle = i as f32 * 0.05;
        index
            .add("qa", record(&format!("r{i}"), vec![angle.cos(), angle.sin()]))
            .unwrap();
    }

    let hits = index.search("qa", &[1.0, 0.0], 3, 0.0).unwrap();
    assert_eq!(hits.len(), 3);
}

#[test]
fn test_overwrite_is_last_write_wins() {
    let index = index_with("qa", 2);

    let mut first = Attributes::new();
    first.insert("answer".into(), "v1".into());
    index
        .add("qa", IndexedRecord::new("r", vec![1.0, 0.0], first))
        .unwrap();

    let mut second = Attributes::new();
    second.insert("answer".into(), "v2".into());
    index
        .add("qa", IndexedRecord::new("r", vec![1.0, 0.0], second))
        .unwrap();

    assert_eq!(index.stats("qa").unwrap().records, 1);
    let stored = index.get("qa", "r").unwrap().unwrap();
    assert_eq!(
        stored.attributes.get("answer").and_then(|v| v.as_text()),
        Some("v2")
    );
}

#[test]
fn test_delete_reports_existence() {
    let index = index_with("qa", 2);
    index.add("qa", record("r", vec![1.0, 0.0])).unwrap();

    assert!(index.delete("qa", "r").unwrap());
    assert!(!index.delete("qa", "r").unwrap());
    assert!(index.search("qa", &[1.0, 0.0], 5, 0.0).unwrap().is_empty());
}

#[test]
fn test_set_ef_runtime_applies_without_rebuild() {
    let index = index_with("qa", 2);
    for i in 0..50 {
        let angle = i as f32 * 0.02;
        index
            .add("qa", record(&format!("r{i}"), vec![angle.cos(), angle.sin()]))
            .unwrap();
    }

    index.set_ef_runtime("qa", 64).unwrap();
    let hits = index.search("qa", &[1.0, 0.0], 5, 0.0).unwrap();
    assert_eq!(hits.len(), 5);
    assert_eq!(hits[0].id, "r0");
}

#[test]
fn test_stats_counts_tombstones() {
    let index = index_with("qa", 2);
    index.add("qa", record("a", vec![1.0, 0.0])).unwrap();
    index.add("qa", record("b", vec![0.0, 1.0])).unwrap();
    index.delete("qa", "a").unwrap();

    let stats = index.stats("qa").unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(stats.tombstones, 1);
    assert_eq!(stats.dimension, 2);
}

#[test]
fn test_euclidean_similarity_normalization() {
    let index = VectorIndex::new();
    let spec = NamespaceSpec::new("docs", 2, DistanceMetric::Euclidean, Schema::default());
    index.ensure(spec, HnswParams::default()).unwrap();

    index.add("docs", record("origin", vec![0.0, 0.0])).unwrap();
    index.add("docs", record("unit", vec![1.0, 0.0])).unwrap();

    let hits = index.search("docs", &[0.0, 0.0], 2, 0.0).unwrap();
    assert_eq!(hits[0].id, "origin");
    assert_eq!(hits[0].similarity, 1.0);
    assert_eq!(hits[1].similarity, 0.5);
}

#[test]
fn test_concurrent_adds_and_searches() {
    use std::sync::Arc;

    let index = Arc::new(index_with("qa", 2));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let angle = (w * 50 + i) as f32 * 0.01;
                    index
                        .add(
                            "qa",
                            IndexedRecord::new(
                                format!("w{w}-r{i}"),
                                vec![angle.cos(), angle.sin()],
                                Attributes::new(),
                            ),
                        )
                        .unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let _ = index.search("qa", &[1.0, 0.0], 5, 0.0).unwrap();
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(index.stats("qa").unwrap().records, 200);
}

#[test]
fn test_attribute_values_serialize_untagged() {
    let mut attrs = Attributes::new();
    attrs.insert("question".into(), "why?".into());
    attrs.insert("timestamp".into(), AttributeValue::Number(42.0));

    let json = serde_json::to_value(&attrs).unwrap();
    assert_eq!(json["question"], "why?");
    assert_eq!(json["timestamp"], 42.0);

    let back: Attributes = serde_json::from_value(json).unwrap();
    assert_eq!(back, attrs);
}

#[tokio::test]
async fn test_vector_store_trait_surface() {
    let index = VectorIndex::new();
    let spec = NamespaceSpec::new("docs", 2, DistanceMetric::Cosine, Schema::default());

    VectorStore::ensure(&index, spec, HnswParams::default())
        .await
        .unwrap();
    VectorStore::add(&index, "docs", record("a", vec![1.0, 0.0]))
        .await
        .unwrap();

    let hits = VectorStore::search(&index, "docs", &[1.0, 0.0], 1, 0.5)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    let all = VectorStore::records(&index, "docs").await.unwrap();
    assert_eq!(all.len(), 1);

    assert!(VectorStore::delete(&index, "docs", "a").await.unwrap());
}
