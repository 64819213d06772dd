//! Retriever - 청킹 + 임베딩 + L2 인덱스 통합
//!
//! FAQ 원문을 검색 가능한 메모리 코퍼스로 만들고,
//! 쿼리에 가장 가까운 청크들을 순위대로 돌려줍니다.

use crate::embedding::EmbeddingProvider;
use crate::error::{BotError, Result};

use super::chunker::{default_chunker, Chunker};
use super::vector::FlatL2Index;

/// 기본 검색 청크 수
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Progress Reporting
// ============================================================================

/// 인덱싱 진행률 관찰자
///
/// 청크 하나가 임베딩될 때마다 `(i + 1) / N` 비율로 호출됩니다.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, ratio: f32);
}

impl<F> ProgressObserver for F
where
    F: Fn(f32) + Send + Sync,
{
    fn on_progress(&self, ratio: f32) {
        self(ratio)
    }
}

/// 진행률을 무시하는 관찰자
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _ratio: f32) {}
}

// ============================================================================
// Types
// ============================================================================

/// 구축된 코퍼스 (청크 + 위치 정렬된 인덱스)
#[derive(Debug, Clone)]
pub struct Corpus {
    chunks: Vec<String>,
    index: FlatL2Index,
}

impl Corpus {
    /// 문서 순서대로 정렬된 청크
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// 검색된 청크
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// 문서 내 청크 위치
    pub position: usize,
    /// 청크 텍스트
    pub text: String,
    /// 쿼리와의 L2 거리 (작을수록 관련도 높음)
    pub distance: f32,
}

// ============================================================================
// Retriever
// ============================================================================

/// 검색기
///
/// 임베딩 프로바이더(와 그 캐시)와 구축된 코퍼스를 소유합니다.
pub struct Retriever<E> {
    embedder: E,
    chunker: Box<dyn Chunker>,
    corpus: Option<Corpus>,
}

impl<E: EmbeddingProvider> Retriever<E> {
    /// 기본 청커로 생성
    pub fn new(embedder: E) -> Self {
        Self::with_chunker(embedder, default_chunker())
    }

    /// 청커를 지정하여 생성
    pub fn with_chunker(embedder: E, chunker: Box<dyn Chunker>) -> Self {
        Self {
            embedder,
            chunker,
            corpus: None,
        }
    }

    /// 문서 인덱싱
    ///
    /// 청킹 후 모든 청크를 순서대로 임베딩하고 L2 인덱스를 구축합니다.
    /// 중간에 임베딩이 하나라도 실패하면 새 코퍼스는 버려지고 에러를 반환합니다.
    ///
    /// # Arguments
    /// * `raw_text` - FAQ 원문
    /// * `progress` - 진행률 관찰자
    ///
    /// # Returns
    /// 구축된 코퍼스
    pub async fn index_document(
        &mut self,
        raw_text: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<&Corpus> {
        let chunks = self.chunker.chunk(raw_text);
        let total = chunks.len();

        tracing::info!(
            "Indexing {} chunks with {} ({})",
            total,
            self.embedder.name(),
            self.chunker.name()
        );

        let mut embeddings = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let embedding = self.embedder.embed(chunk).await.map_err(|e| {
                tracing::warn!("Embedding failed at chunk {}/{}: {}", i + 1, total, e);
                e
            })?;
            embeddings.push(embedding);
            progress.on_progress((i + 1) as f32 / total as f32);
        }

        if total == 0 {
            progress.on_progress(1.0);
        }

        let index = FlatL2Index::build(embeddings)?;
        tracing::info!(
            "Index built: {} entries (dimension: {:?})",
            index.len(),
            index.dimension()
        );

        Ok(self.corpus.insert(Corpus { chunks, index }))
    }

    /// 쿼리와 가장 가까운 청크 텍스트 검색 (관련도 순)
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        let results = self.search_with_scores(query, k).await?;
        Ok(results.into_iter().map(|r| r.text).collect())
    }

    /// 거리 정보를 포함한 검색
    ///
    /// 인덱스 구축 전에는 `IndexNotBuilt`, 빈 코퍼스에서는 빈 결과를 반환합니다.
    pub async fn search_with_scores(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let corpus = self.corpus.as_ref().ok_or(BotError::IndexNotBuilt)?;
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let neighbors = corpus.index.search(&query_embedding, k)?;

        tracing::debug!("Retrieved {} chunks for query", neighbors.len());

        Ok(neighbors
            .into_iter()
            .map(|n| RetrievedChunk {
                position: n.position,
                text: corpus.chunks[n.position].clone(),
                distance: n.distance,
            })
            .collect())
    }

    /// 구축된 코퍼스 (없으면 None)
    pub fn corpus(&self) -> Option<&Corpus> {
        self.corpus.as_ref()
    }

    /// 임베딩 프로바이더 접근
    pub fn embedder(&self) -> &E {
        &self.embedder
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::embedding::CachedEmbedding;

    /// 텍스트별로 고정된 벡터를 돌려주는 스텁
    struct TableEmbedding {
        table: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl TableEmbedding {
        fn new(pairs: &[(&str, [f32; 3])]) -> Self {
            Self {
                table: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                calls: AtomicUsize::new(0),
                fail_on_call: None,
            }
        }

        fn failing_on(mut self, call: usize) -> Self {
            self.fail_on_call = Some(call);
            self
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TableEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(BotError::Api {
                    service: "embeddings",
                    status: 429,
                    message: "rate limited".to_string(),
                });
            }
            Ok(self
                .table
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.0, 0.0, 0.0]))
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    const DOC: &str = "# alpha\n# beta\n# gamma\n";

    fn synthetic() -> TableEmbedding {
        TableEmbedding::new(&[
            ("alpha", [1.0, 0.0, 0.0]),
            ("beta", [0.0, 1.0, 0.0]),
            ("gamma", [0.0, 0.0, 1.0]),
            ("query near beta", [0.1, 0.9, 0.0]),
        ])
    }

    #[tokio::test]
    async fn test_index_document_builds_aligned_corpus() {
        let mut retriever = Retriever::new(synthetic());
        let corpus = retriever.index_document(DOC, &NoProgress).await.unwrap();

        assert_eq!(corpus.chunks(), &["alpha", "beta", "gamma"]);
        assert_eq!(corpus.index().len(), 3);
        assert_eq!(corpus.index().dimension(), Some(3));
    }

    #[tokio::test]
    async fn test_search_returns_known_nearest() {
        let mut retriever = Retriever::new(synthetic());
        retriever.index_document(DOC, &NoProgress).await.unwrap();

        let results = retriever.search("query near beta", 1).await.unwrap();
        assert_eq!(results, vec!["beta"]);
    }

    #[tokio::test]
    async fn test_search_ranks_best_first() {
        let mut retriever = Retriever::new(synthetic());
        retriever.index_document(DOC, &NoProgress).await.unwrap();

        let results = retriever
            .search_with_scores("query near beta", 3)
            .await
            .unwrap();
        assert_eq!(results[0].text, "beta");
        assert_eq!(results[0].position, 1);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_search_caps_k_at_corpus_size() {
        let mut retriever = Retriever::new(synthetic());
        retriever
            .index_document("# alpha\n# beta", &NoProgress)
            .await
            .unwrap();

        let results = retriever.search("anything", 10).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_one() {
        let seen = Mutex::new(Vec::new());
        let observer = |ratio: f32| seen.lock().unwrap().push(ratio);

        let mut retriever = Retriever::new(synthetic());
        retriever.index_document(DOC, &observer).await.unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!((seen[2] - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_document_yields_empty_search() {
        let seen = Mutex::new(Vec::new());
        let observer = |ratio: f32| seen.lock().unwrap().push(ratio);

        let mut retriever = Retriever::new(synthetic());
        let corpus = retriever.index_document("  \n", &observer).await.unwrap();
        assert!(corpus.is_empty());

        let results = retriever.search("anything", 3).await.unwrap();
        assert!(results.is_empty());
        // 빈 코퍼스에서는 쿼리 임베딩도 하지 않음
        assert_eq!(retriever.embedder().calls.load(Ordering::SeqCst), 0);
        assert_eq!(seen.into_inner().unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn test_search_before_index_fails() {
        let retriever = Retriever::new(synthetic());
        let result = retriever.search("alpha", 3).await;
        assert!(matches!(result, Err(BotError::IndexNotBuilt)));
    }

    #[tokio::test]
    async fn test_failed_build_leaves_no_queryable_index() {
        let mut retriever = Retriever::new(synthetic().failing_on(3));

        let result = retriever.index_document(DOC, &NoProgress).await;
        assert!(matches!(result, Err(BotError::Api { status: 429, .. })));
        assert!(retriever.corpus().is_none());

        let search = retriever.search("query near beta", 3).await;
        assert!(matches!(search, Err(BotError::IndexNotBuilt)));
    }

    #[tokio::test]
    async fn test_failed_build_reports_partial_progress_only() {
        let seen = Mutex::new(Vec::new());
        let observer = |ratio: f32| seen.lock().unwrap().push(ratio);

        let mut retriever = Retriever::new(synthetic().failing_on(2));
        assert!(retriever.index_document(DOC, &observer).await.is_err());

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0] < 1.0);
    }

    #[tokio::test]
    async fn test_cached_embedder_skips_repeated_query_calls() {
        let mut retriever = Retriever::new(CachedEmbedding::new(synthetic()));
        retriever.index_document(DOC, &NoProgress).await.unwrap();

        retriever.search("query near beta", 1).await.unwrap();
        retriever.search("query near beta", 1).await.unwrap();

        // 청크 3회 + 쿼리 1회
        let calls = retriever.embedder().inner().calls.load(Ordering::SeqCst);
        assert_eq!(calls, 4);
    }
}
