//! End-to-end request flows against mock collaborators.

use std::sync::Arc;

use tokio_test::assert_ok;

use recall::{
    AnswerSource, CachedEmbedder, Config, DocumentIndex, EmbeddingCache, MockEmbedder,
    MockGenerator, MockRetriever, Orchestrator, PipelineError, RetrievedDocument, SemanticCache,
    VectorIndex,
};

const DIM: usize = 32;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct TestSystem {
    orchestrator:
        Orchestrator<VectorIndex, MockEmbedder, MockRetriever, MockGenerator>,
    provider: MockEmbedder,
    retriever: MockRetriever,
    generator: MockGenerator,
}

/// Wires the full stack from a [`Config`], swapping only the three
/// external collaborators for mocks.
async fn spawn_system() -> TestSystem {
    init_tracing();

    let config = Config {
        dimension: DIM,
        // Mock embeddings are hash-derived, so unrelated questions sit
        // near zero similarity while same-text matches score exactly 1.0;
        // 0.9 keeps the two cleanly apart.
        cache_score_threshold: 0.9,
        document_score_threshold: 0.9,
        ..Config::default()
    };
    config.validate().expect("test config should validate");

    let store = Arc::new(VectorIndex::new());
    let provider = MockEmbedder::new(config.dimension);
    let embedder = Arc::new(CachedEmbedder::new(
        provider.clone(),
        EmbeddingCache::with_capacity(config.embed_cache_capacity),
    ));

    let semantic = Arc::new(SemanticCache::new(
        Arc::clone(&store),
        Arc::clone(&embedder),
        config.semantic_cache_config(),
    ));
    let documents = Arc::new(DocumentIndex::new(
        store,
        embedder,
        config.document_index_config(),
    ));

    let retriever = MockRetriever::new();
    let generator = MockGenerator::answering("default answer");

    let orchestrator = Orchestrator::new(
        semantic,
        documents,
        retriever.clone(),
        generator.clone(),
        config.pipeline_config(),
    );
    orchestrator
        .ensure()
        .await
        .expect("namespaces should ensure");

    TestSystem {
        orchestrator,
        provider,
        retriever,
        generator,
    }
}

#[tokio::test]
async fn test_external_fallback_then_cache_hit() {
    let system = spawn_system().await;
    system.retriever.respond_with(vec![RetrievedDocument {
        source_url: "u1".into(),
        content: "c1".into(),
    }]);
    system.generator.respond_with("A1");

    // First request: nothing cached, nothing indexed — full fallback.
    let first = system.orchestrator.answer("Q1").await.unwrap();
    assert_eq!(first.text, "A1");
    assert_eq!(first.source, AnswerSource::External);

    let entries = system.orchestrator.semantic().entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].question, "Q1");
    assert_eq!(entries[0].answer, "A1");

    // Second identical request: answered from the cache, with no further
    // provider embedding, retrieval, or generation calls.
    let embed_calls_before = system.provider.calls();
    let second = system.orchestrator.answer("Q1").await.unwrap();

    assert_eq!(second.text, "A1");
    assert_eq!(second.source, AnswerSource::Cache);
    assert_eq!(system.provider.calls(), embed_calls_before);
    assert_eq!(system.retriever.calls(), 1);
    assert_eq!(system.generator.calls(), 1);
}

#[tokio::test]
async fn test_single_provider_embedding_per_request_chain() {
    let system = spawn_system().await;

    // Miss path touches the semantic cache, the document index, and the
    // write-back — all on one query text, so one provider call total.
    system.orchestrator.answer("only question").await.unwrap();

    assert_eq!(system.provider.calls(), 1);
}

#[tokio::test]
async fn test_grounded_answers_skip_external_retrieval() {
    let system = spawn_system().await;
    system
        .orchestrator
        .documents()
        .add_document("paper straws carry a plastic lining", Some("https://example.org/a"))
        .await
        .unwrap();
    system.generator.respond_with("Lined with plastic.");

    let answer = system
        .orchestrator
        .answer("paper straws carry a plastic lining")
        .await
        .unwrap();

    assert_eq!(answer.source, AnswerSource::Grounded);
    assert_eq!(answer.text, "Lined with plastic.");
    assert_eq!(system.retriever.calls(), 0);
}

#[tokio::test]
async fn test_retrieved_documents_ground_later_queries() {
    let system = spawn_system().await;
    system.retriever.respond_with(vec![RetrievedDocument {
        source_url: "https://example.org/ev".into(),
        content: "life-cycle emissions of electric cars".into(),
    }]);

    // First query goes external and writes the fetched document into the
    // grounding index.
    let first = tokio_test::assert_ok!(
        system
            .orchestrator
            .answer("life-cycle emissions of electric cars")
            .await
    );
    assert_eq!(first.source, AnswerSource::External);

    let docs = system.orchestrator.documents().documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source_url.as_deref(), Some("https://example.org/ev"));
}

#[tokio::test]
async fn test_failed_request_caches_nothing() {
    let system = spawn_system().await;
    system.generator.fail_with("model down");

    let err = system.orchestrator.answer("doomed question").await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));

    assert!(system.orchestrator.semantic().entries().await.unwrap().is_empty());

    // After the generator recovers, the same question goes through the
    // full miss path (it was never cached) and succeeds.
    system.generator.respond_with("recovered");
    let answer = system.orchestrator.answer("doomed question").await.unwrap();
    assert_eq!(answer.text, "recovered");
    assert_eq!(answer.source, AnswerSource::Ungrounded);
}

#[tokio::test]
async fn test_distinct_questions_get_distinct_entries() {
    let system = spawn_system().await;
    system.generator.respond_with("first");
    system.orchestrator.answer("question one").await.unwrap();

    system.generator.respond_with("second");
    let answer = system.orchestrator.answer("question two").await.unwrap();

    // The second question is not similar to the first, so it is not a
    // cache hit.
    assert_ne!(answer.source, AnswerSource::Cache);
    assert_eq!(answer.text, "second");
    assert_eq!(system.orchestrator.semantic().entries().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let system = Arc::new(spawn_system().await);
    system.generator.respond_with("shared answer");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let system = Arc::clone(&system);
            tokio::spawn(async move {
                system
                    .orchestrator
                    .answer(&format!("concurrent question {i}"))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let answer = handle.await.expect("task should not panic").unwrap();
        assert_eq!(answer.text, "shared answer");
    }

    assert_eq!(
        system.orchestrator.semantic().entries().await.unwrap().len(),
        8
    );
}

#[tokio::test]
async fn test_answer_serializes_for_request_layers() {
    let system = spawn_system().await;
    system.generator.respond_with("serialized answer");

    let answer = system.orchestrator.answer("serialize me").await.unwrap();

    let json = serde_json::to_value(&answer).unwrap();
    assert_eq!(json["text"], "serialized answer");
    assert_eq!(json["source"], "ungrounded");
}

#[tokio::test]
async fn test_exact_vector_search_scenario() {
    use recall::{
        Attributes, DistanceMetric, FieldSpec, HnswParams, IndexedRecord, NamespaceSpec, Schema,
    };

    let index = VectorIndex::new();
    index
        .ensure(
            NamespaceSpec::new(
                "docs",
                3,
                DistanceMetric::Cosine,
                Schema::new([FieldSpec::text("text")]),
            ),
            HnswParams::default(),
        )
        .unwrap();

    let mut attrs = Attributes::new();
    attrs.insert("text".into(), "x".into());
    index
        .add("docs", IndexedRecord::new("d1", vec![1.0, 0.0, 0.0], attrs))
        .unwrap();

    let hits = index.search("docs", &[1.0, 0.0, 0.0], 1, 0.99).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "d1");
    assert_eq!(hits[0].similarity, 1.0);
}
