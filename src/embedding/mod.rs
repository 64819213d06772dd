//! 임베딩 모듈 - Mistral API를 통한 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 임베딩 프로바이더와
//! 동일 입력에 대한 재호출을 막는 캐시 래퍼를 제공합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = CachedEmbedding::new(MistralEmbedding::new(&config)?);
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use crate::config::BotConfig;
use crate::error::{api_error, BotError, Result};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Mistral Embedding
// ============================================================================

/// Mistral 임베딩 구현체
///
/// 재시도하지 않습니다. 실패는 그대로 호출자에게 전달됩니다.
#[derive(Debug)]
pub struct MistralEmbedding {
    api_key: String,
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

impl MistralEmbedding {
    /// 설정에서 생성
    pub fn new(config: &BotConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            client,
            endpoint: config.endpoint("embeddings")?,
            model: config.embed_model.clone(),
        })
    }
}

/// Mistral API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

/// Mistral API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// 응답 본문에서 첫 번째 임베딩 추출
fn parse_embed_response(body: &str) -> Result<Vec<f32>> {
    let response: EmbedResponse = serde_json::from_str(body)?;
    let embedding = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| BotError::Parse("Embedding response contained no data".to_string()))?;

    if embedding.is_empty() {
        return Err(BotError::Parse("Embedding response vector is empty".to_string()));
    }

    Ok(embedding)
}

#[async_trait]
impl EmbeddingProvider for MistralEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.model,
            input: vec![text],
        };

        tracing::debug!("Embedding request ({} chars)", text.len());

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error("embeddings", status.as_u16(), &body));
        }

        parse_embed_response(&body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Cached Embedding
// ============================================================================

/// 메모이제이션 임베딩 래퍼
///
/// 정확히 같은 입력 문자열은 외부 호출 없이 캐시된 벡터를 반환합니다.
/// 캐시는 프로세스 수명 동안 유지되며 무효화 경로는 없습니다.
pub struct CachedEmbedding<P> {
    inner: P,
    cache: Mutex<HashMap<String, Vec<f32>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<P: EmbeddingProvider> CachedEmbedding<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// 캐시된 항목 수
    pub async fn cached_count(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// 내부 프로바이더 접근
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbedding<P> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.lock().await.get(text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.clone());
        }

        // 외부 호출 중에는 락을 잡지 않음
        let embedding = self.inner.embed(text).await?;
        self.misses.fetch_add(1, Ordering::Relaxed);

        self.cache
            .lock()
            .await
            .insert(text.to_string(), embedding.clone());

        Ok(embedding)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ============================================================================
// Tests
// ============================================================================
