//! End-to-end RAG service tests over the in-memory store and index

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use knowledge_core::{
    ChunkRepository, DocumentChunk, DocumentRepository, DocumentType, Error, RagQuery,
    RetrievedChunk, TrainingDocument,
};
use knowledge_media::{MediaError, MediaToTextConverter};
use knowledge_persistence::MemoryStore;
use knowledge_rag::{
    Chunker, ChunkerConfig, ContentProcessor, EmbedMode, Embedder, HashEmbedder, InMemoryIndex,
    QueryDefaults, RagError, RagService, SplitVectorStore, UnifiedVectorStore, VectorStore,
};
use uuid::Uuid;

const DIM: usize = 256;

const FAQ: &str = "Q: When does the branch open?\nA: Nine in the morning.\n\n\
Q: Is there a processing fee?\nA: No processing fee on gold loans.\n\n\
Q: What documents are needed?\nA: One photo id and an address proof.";

#[derive(Clone, Copy, Debug)]
enum Layout {
    Unified,
    Split,
}

struct Harness {
    service: RagService,
    store: MemoryStore,
    index: Arc<InMemoryIndex>,
}

fn service(
    store: &MemoryStore,
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorStore>,
    media: Option<Arc<dyn MediaToTextConverter>>,
    defaults: QueryDefaults,
) -> RagService {
    let processor = ContentProcessor::new(
        Chunker::new(ChunkerConfig {
            text_chars: 40,
            ..ChunkerConfig::default()
        }),
        embedder,
        media,
    );
    RagService::new(Arc::new(store.clone()), processor, vectors, defaults)
}

fn harness(layout: Layout, media: Option<Arc<dyn MediaToTextConverter>>) -> Harness {
    let store = MemoryStore::new();
    let index = Arc::new(InMemoryIndex::new());

    let vectors: Arc<dyn VectorStore> = match layout {
        Layout::Unified => Arc::new(UnifiedVectorStore::new(Arc::new(store.clone()))),
        Layout::Split => Arc::new(SplitVectorStore::new(
            Arc::new(store.clone()),
            index.clone(),
        )),
    };

    Harness {
        service: service(
            &store,
            Arc::new(HashEmbedder::new(DIM)),
            vectors,
            media,
            QueryDefaults::default(),
        ),
        store,
        index,
    }
}

/// Embedding provider that is down
struct UnavailableEmbedder;

#[async_trait]
impl Embedder for UnavailableEmbedder {
    async fn embed(&self, _texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, RagError> {
        Err(RagError::Embedding("503 service unavailable".into()))
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Delegates to a real store, failing the n-th `store` call (1-based)
/// and counting searches
struct FlakyStore {
    inner: Arc<dyn VectorStore>,
    fail_on: usize,
    stores: AtomicUsize,
    searches: AtomicUsize,
}

impl FlakyStore {
    fn new(inner: Arc<dyn VectorStore>, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            stores: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn store(&self, chunk: &DocumentChunk) -> Result<(), RagError> {
        if self.stores.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(RagError::VectorStore("index unavailable".into()));
        }
        self.inner.store(chunk).await
    }

    async fn search(
        &self,
        agent_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(agent_id, embedding, top_k, threshold).await
    }

    async fn delete(&self, agent_id: Uuid) -> Result<(), RagError> {
        self.inner.delete(agent_id).await
    }

    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<(), RagError> {
        self.inner.delete_document(agent_id, document_id).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[tokio::test]
async fn test_ingest_marks_processed_and_stores_chunks() {
    for layout in [Layout::Unified, Layout::Split] {
        let h = harness(layout, None);
        let agent = Uuid::new_v4();

        let ingested = h
            .service
            .process_document(agent, "Branch FAQ", DocumentType::Faq, FAQ, None)
            .await
            .unwrap();

        assert_eq!(ingested.chunk_count, 3, "{:?}", layout);
        assert!(ingested.document.is_processed());

        let chunks = h.store.chunks_for_document(ingested.document.id);
        assert_eq!(chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(chunks.iter().all(|c| !c.id.is_nil()));
        assert!(chunks[0].content.starts_with("Q: When does the branch open?"));

        match layout {
            Layout::Unified => {
                assert!(chunks.iter().all(|c| c.embedding.len() == DIM));
                assert!(h.index.is_empty());
            }
            Layout::Split => {
                assert!(chunks.iter().all(|c| c.embedding.is_empty()));
                assert_eq!(h.index.count_for_agent(agent), 3);
            }
        }

        let docs = h.service.get_agent_documents(agent).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].processed_at.is_some());
    }
}

#[tokio::test]
async fn test_query_respects_top_k_and_threshold() {
    for layout in [Layout::Unified, Layout::Split] {
        let h = harness(layout, None);
        let agent = Uuid::new_v4();

        let faq = (0..10)
            .map(|i| format!("Q: question number {i}?\nA: answer number {i}."))
            .collect::<Vec<_>>()
            .join("\n\n");
        h.service
            .process_document(agent, "Many", DocumentType::Faq, &faq, None)
            .await
            .unwrap();

        let query = RagQuery::new(agent, "Q: question number 3?\nA: answer number 3.")
            .with_top_k(5)
            .with_threshold(0.9);
        let response = h.service.query(query).await.unwrap();

        assert!(!response.chunks.is_empty(), "{:?}", layout);
        assert!(response.chunks.len() <= 5);
        assert!(response.chunks.iter().all(|c| c.score >= 0.9));
        assert!(response.chunks[0].content.contains("number 3"));
        assert!((response.chunks[0].score - 1.0).abs() < 1e-4);

        let loose = h
            .service
            .query(RagQuery::new(agent, "question answer number").with_top_k(4).with_threshold(0.01))
            .await
            .unwrap();
        assert_eq!(loose.chunks.len(), 4);
        let scores: Vec<f32> = loose.chunks.iter().map(|c| c.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}

#[tokio::test]
async fn test_context_joins_with_blank_line() {
    let h = harness(Layout::Unified, None);
    let agent = Uuid::new_v4();
    h.service
        .process_document(agent, "FAQ", DocumentType::Faq, FAQ, None)
        .await
        .unwrap();

    let response = h
        .service
        .query(RagQuery::new(agent, "branch open morning fee gold loans").with_threshold(0.01))
        .await
        .unwrap();

    let expected = response
        .chunks
        .iter()
        .map(|c| c.content.clone())
        .collect::<Vec<_>>()
        .join("\n\n");
    assert_eq!(response.context, expected);
    assert_eq!(response.chunks[0].document_type, Some(DocumentType::Faq));
}

#[tokio::test]
async fn test_delete_agent_documents_empties_both_layouts() {
    for layout in [Layout::Unified, Layout::Split] {
        let h = harness(layout, None);
        let agent = Uuid::new_v4();
        let other = Uuid::new_v4();

        h.service
            .process_document(agent, "FAQ", DocumentType::Faq, FAQ, None)
            .await
            .unwrap();
        h.service
            .process_document(other, "FAQ", DocumentType::Faq, FAQ, None)
            .await
            .unwrap();

        h.service.delete_agent_documents(agent).await.unwrap();

        let response = h
            .service
            .query(RagQuery::new(agent, "Q: When does the branch open?").with_threshold(0.01))
            .await
            .unwrap();
        assert!(response.chunks.is_empty(), "{:?}", layout);
        assert_eq!(response.context, "");
        assert!(h.service.get_agent_documents(agent).await.unwrap().is_empty());
        assert_eq!(h.index.count_for_agent(agent), 0);

        // other agent untouched
        let response = h
            .service
            .query(RagQuery::new(other, "Q: When does the branch open?").with_threshold(0.01))
            .await
            .unwrap();
        assert!(!response.chunks.is_empty());
    }
}

#[tokio::test]
async fn test_queries_are_agent_scoped() {
    let h = harness(Layout::Split, None);
    let owner = Uuid::new_v4();
    h.service
        .process_document(owner, "FAQ", DocumentType::Faq, FAQ, None)
        .await
        .unwrap();

    let response = h
        .service
        .query(RagQuery::new(Uuid::new_v4(), "Q: When does the branch open?").with_threshold(0.01))
        .await
        .unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_delete_single_document() {
    for layout in [Layout::Unified, Layout::Split] {
        let h = harness(layout, None);
        let agent = Uuid::new_v4();

        let keep = h
            .service
            .process_document(agent, "Keep", DocumentType::Text, "gold rates today", None)
            .await
            .unwrap();
        let gone = h
            .service
            .process_document(agent, "Gone", DocumentType::Faq, FAQ, None)
            .await
            .unwrap();

        h.service.delete_document(agent, gone.document.id).await.unwrap();

        let docs = h.service.get_agent_documents(agent).await.unwrap();
        assert_eq!(docs.iter().map(|d| d.id).collect::<Vec<_>>(), vec![keep.document.id]);
        assert!(h.store.chunks_for_document(gone.document.id).is_empty());
        assert_eq!(h.store.chunk_count(), keep.chunk_count);
        if let Layout::Split = layout {
            assert_eq!(h.index.count_for_agent(agent), keep.chunk_count);
        }

        let err = h
            .service
            .delete_document(agent, gone.document.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}

#[tokio::test]
async fn test_delete_document_of_other_agent_is_not_found() {
    let h = harness(Layout::Unified, None);
    let owner = Uuid::new_v4();
    let doc = h
        .service
        .process_document(owner, "FAQ", DocumentType::Faq, FAQ, None)
        .await
        .unwrap();

    let err = h
        .service
        .delete_document(Uuid::new_v4(), doc.document.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(h.store.chunk_count(), 3);
}

#[tokio::test]
async fn test_empty_content_is_processed_with_no_chunks() {
    let h = harness(Layout::Unified, None);
    let agent = Uuid::new_v4();

    let ingested = h
        .service
        .process_document(agent, "Blank", DocumentType::Text, "  \n ", None)
        .await
        .unwrap();

    assert_eq!(ingested.chunk_count, 0);
    assert!(ingested.document.is_processed());
    assert_eq!(h.store.document_count(), 1);
    assert_eq!(h.store.chunk_count(), 0);
}

#[tokio::test]
async fn test_nil_agent_rejected_everywhere() {
    let h = harness(Layout::Unified, None);
    let nil = Uuid::nil();

    let err = h
        .service
        .process_document(nil, "t", DocumentType::Text, "x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert!(matches!(
        h.service.query(RagQuery::new(nil, "q")).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.service.delete_agent_documents(nil).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.service.get_agent_documents(nil).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.service.delete_document(nil, Uuid::new_v4()).await,
        Err(Error::Validation(_))
    ));
    assert_eq!(h.store.document_count(), 0);
}

#[tokio::test]
async fn test_blank_query_rejected() {
    let h = harness(Layout::Unified, None);
    let err = h
        .service
        .query(RagQuery::new(Uuid::new_v4(), "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_inactive_documents_are_not_searched() {
    for layout in [Layout::Unified, Layout::Split] {
        let h = harness(layout, None);
        let agent = Uuid::new_v4();
        let ingested = h
            .service
            .process_document(agent, "FAQ", DocumentType::Faq, FAQ, None)
            .await
            .unwrap();

        let mut doc = ingested.document;
        doc.is_active = false;
        DocumentRepository::update_document(&h.store, &doc).await.unwrap();

        let response = h
            .service
            .query(RagQuery::new(agent, "Q: When does the branch open?").with_threshold(0.01))
            .await
            .unwrap();
        assert!(response.is_empty(), "{:?}", layout);
    }
}

#[tokio::test]
async fn test_embedding_failure_leaves_document_unprocessed() {
    let store = MemoryStore::new();
    let vectors = Arc::new(UnifiedVectorStore::new(Arc::new(store.clone())));
    let service = service(
        &store,
        Arc::new(UnavailableEmbedder),
        vectors,
        None,
        QueryDefaults::default(),
    );
    let agent = Uuid::new_v4();

    let err = service
        .process_document(agent, "FAQ", DocumentType::Faq, FAQ, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::External { .. }));
    assert!(err.to_string().contains("503"));

    // nothing is rolled back
    let docs = service.get_agent_documents(agent).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].processed_at.is_none());
    assert_eq!(store.chunk_count(), 0);
}

#[tokio::test]
async fn test_store_failure_keeps_earlier_chunks() {
    let store = MemoryStore::new();
    let unified: Arc<dyn VectorStore> = Arc::new(UnifiedVectorStore::new(Arc::new(store.clone())));
    let service = service(
        &store,
        Arc::new(HashEmbedder::new(DIM)),
        Arc::new(FlakyStore::new(unified, 2)),
        None,
        QueryDefaults::default(),
    );
    let agent = Uuid::new_v4();

    let err = service
        .process_document(agent, "FAQ", DocumentType::Faq, FAQ, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::External { .. }));

    let docs = service.get_agent_documents(agent).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].processed_at.is_none());

    let chunks = store.chunks_for_document(docs[0].id);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chunk_index, 0);
    assert!(chunks[0].content.starts_with("Q: When does the branch open?"));
}

#[tokio::test]
async fn test_zero_query_values_use_configured_defaults() {
    let store = MemoryStore::new();
    let vectors = Arc::new(UnifiedVectorStore::new(Arc::new(store.clone())));
    let service = service(
        &store,
        Arc::new(HashEmbedder::new(DIM)),
        vectors,
        None,
        QueryDefaults {
            top_k: 1,
            threshold: 0.01,
        },
    );
    let agent = Uuid::new_v4();
    service
        .process_document(agent, "FAQ", DocumentType::Faq, FAQ, None)
        .await
        .unwrap();

    let question = "branch open morning fee gold loans";
    let defaulted = service.query(RagQuery::new(agent, question)).await.unwrap();
    assert_eq!(defaulted.chunks.len(), 1);

    let explicit = service
        .query(RagQuery::new(agent, question).with_top_k(3))
        .await
        .unwrap();
    assert!(explicit.chunks.len() > 1);
}

#[tokio::test]
async fn test_query_without_words_skips_search() {
    let store = MemoryStore::new();
    let unified: Arc<dyn VectorStore> = Arc::new(UnifiedVectorStore::new(Arc::new(store.clone())));
    let vectors = Arc::new(FlakyStore::new(unified, usize::MAX));
    let service = service(
        &store,
        Arc::new(HashEmbedder::new(DIM)),
        vectors.clone(),
        None,
        QueryDefaults::default(),
    );
    let agent = Uuid::new_v4();
    service
        .process_document(agent, "FAQ", DocumentType::Faq, FAQ, None)
        .await
        .unwrap();

    let response = service
        .query(RagQuery::new(agent, "???").with_threshold(0.01))
        .await
        .unwrap();
    assert!(response.is_empty());
    assert_eq!(response.context, "");
    assert_eq!(vectors.searches.load(Ordering::SeqCst), 0);

    service
        .query(RagQuery::new(agent, "branch").with_threshold(0.01))
        .await
        .unwrap();
    assert_eq!(vectors.searches.load(Ordering::SeqCst), 1);
}

/// Converter that returns fixed text for images and fails everything else
struct FixedImageText;

#[async_trait]
impl MediaToTextConverter for FixedImageText {
    async fn image_to_text(&self, _data: &[u8], _mime_type: &str) -> Result<String, MediaError> {
        Ok("Open daily from nine to five".into())
    }

    async fn image_url_to_text(&self, url: &str) -> Result<String, MediaError> {
        Ok(format!("Poster at {}", url))
    }

    async fn audio_to_text(&self, _data: &[u8], _mime_type: &str) -> Result<String, MediaError> {
        Err(MediaError::backend("fixed", "asr offline"))
    }

    async fn video_to_text(&self, _data: &[u8], _mime_type: &str) -> Result<String, MediaError> {
        Err(MediaError::not_supported("fixed", "video_to_text"))
    }

    async fn pdf_to_text(&self, _data: &[u8]) -> Result<String, MediaError> {
        Err(MediaError::not_supported("fixed", "pdf_to_text"))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[tokio::test]
async fn test_media_file_ingest() {
    let h = harness(Layout::Split, Some(Arc::new(FixedImageText)));
    let agent = Uuid::new_v4();
    let url = Some("https://cdn.example.com/hours.png".to_string());

    let ingested = h
        .service
        .process_media_file(agent, "Hours sign", DocumentType::Image, b"\x89PNG", "image/png", url.clone())
        .await
        .unwrap();
    assert_eq!(ingested.chunk_count, 1);

    let chunks = h.store.chunks_for_document(ingested.document.id);
    assert_eq!(chunks[0].content, "Open daily from nine to five");
    assert_eq!(chunks[0].metadata.get("source"), url.as_ref());
    assert_eq!(chunks[0].metadata.get("type").map(String::as_str), Some("image"));

    let by_url = h
        .service
        .process_media_file(agent, "Poster", DocumentType::Image, &[], "image/png", url)
        .await
        .unwrap();
    let chunks = h.store.chunks_for_document(by_url.document.id);
    assert_eq!(chunks[0].content, "Poster at https://cdn.example.com/hours.png");
}

#[tokio::test]
async fn test_media_failures_map_to_taxonomy() {
    let h = harness(Layout::Unified, Some(Arc::new(FixedImageText)));
    let agent = Uuid::new_v4();

    let err = h
        .service
        .process_media_file(agent, "Call", DocumentType::Audio, b"ID3", "audio/mpeg", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::External { .. }));

    let err = h
        .service
        .process_media_file(agent, "Clip", DocumentType::Video, b"mp4", "video/mp4", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));

    let err = h
        .service
        .process_media_file(agent, "Notes", DocumentType::Text, b"hi", "text/plain", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(h.store.document_count(), 0);
}

#[tokio::test]
async fn test_media_without_converter_is_config_error() {
    let h = harness(Layout::Unified, None);
    let err = h
        .service
        .process_media_file(Uuid::new_v4(), "Scan", DocumentType::Pdf, b"%PDF", "application/pdf", None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("media processor not configured"));
}

#[tokio::test]
async fn test_unified_round_trip_scores_one() {
    let store = MemoryStore::new();
    let vectors = UnifiedVectorStore::new(Arc::new(store.clone()));
    let embedder = HashEmbedder::new(DIM);
    let agent = Uuid::new_v4();

    let doc = TrainingDocument::new(agent, "Rates", DocumentType::Text, None);
    DocumentRepository::create_document(&store, &doc).await.unwrap();

    let mut target = None;
    for (i, text) in ["gold loan interest rate", "branch opening hours", "savings account fees"]
        .into_iter()
        .enumerate()
    {
        let mut chunk = DocumentChunk::for_document(&doc, i, text.into(), Default::default(), embedder.embed_one(text));
        chunk.id = Uuid::new_v4();
        vectors.store(&chunk).await.unwrap();
        if i == 1 {
            target = Some(chunk);
        }
    }
    let target = target.unwrap();

    let results = vectors.search(agent, &target.embedding, 3, 0.0).await.unwrap();
    assert_eq!(results[0].chunk_id, target.id);
    assert!((results[0].score - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_split_drops_hits_without_rows() {
    let store = MemoryStore::new();
    let index = Arc::new(InMemoryIndex::new());
    let vectors = SplitVectorStore::new(Arc::new(store.clone()), index.clone());
    let embedder = HashEmbedder::new(DIM);
    let agent = Uuid::new_v4();

    let doc = TrainingDocument::new(agent, "Rates", DocumentType::Text, None);
    DocumentRepository::create_document(&store, &doc).await.unwrap();

    let mut chunk = DocumentChunk::for_document(&doc, 0, "gold".into(), Default::default(), embedder.embed_one("gold"));
    chunk.id = Uuid::new_v4();
    vectors.store(&chunk).await.unwrap();

    // rows gone, vector left behind
    ChunkRepository::delete_chunks_for_document(&store, agent, doc.id).await.unwrap();
    assert_eq!(index.len(), 1);

    let results = vectors.search(agent, &chunk.embedding, 5, 0.0).await.unwrap();
    assert!(results.is_empty());
}
