//! 설정 모듈
//!
//! 환경변수에서 서비스 설정을 읽습니다.
//! 필수값은 `MISTRAL_API_KEY` 하나이며 나머지는 기본값이 있습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let config = BotConfig::from_env()?;
//! let endpoint = config.endpoint("embeddings")?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::assistant::DEFAULT_HISTORY_WINDOW;
use crate::error::{BotError, Result};
use crate::knowledge::DEFAULT_TOP_K;

// ============================================================================
// Environment Keys
// ============================================================================

/// API 키 환경변수
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";
/// API 베이스 URL 환경변수
pub const BASE_URL_ENV: &str = "MISTRAL_BASE_URL";
/// 임베딩 모델 환경변수
pub const EMBED_MODEL_ENV: &str = "SERVICE_BOT_EMBED_MODEL";
/// 채팅 모델 환경변수
pub const CHAT_MODEL_ENV: &str = "SERVICE_BOT_CHAT_MODEL";
/// FAQ 파일 경로 환경변수
pub const FAQ_PATH_ENV: &str = "SERVICE_BOT_FAQ";

// ============================================================================
// Defaults
// ============================================================================

/// Mistral API 기본 엔드포인트
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1/";
pub const DEFAULT_EMBED_MODEL: &str = "mistral-embed";
pub const DEFAULT_CHAT_MODEL: &str = "mistral-small";
pub const DEFAULT_FAQ_PATH: &str = "faq.md";
/// 임베딩 요청 전체 타임아웃, 채팅 요청은 연결 타임아웃으로만 사용
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// BotConfig
// ============================================================================

/// 서비스 설정
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// 서비스 인증 키
    pub api_key: String,
    /// API 베이스 URL (항상 `/`로 끝남)
    pub base_url: Url,
    /// 임베딩 모델 이름
    pub embed_model: String,
    /// 채팅 모델 이름
    pub chat_model: String,
    /// FAQ 문서 경로
    pub faq_path: PathBuf,
    /// 검색 청크 수
    pub top_k: usize,
    /// 이전 대화 창 크기
    pub history_window: usize,
    /// HTTP 타임아웃 (임베딩: 요청 전체, 채팅: 연결)
    pub timeout: Duration,
}

impl BotConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키-값 조회 함수로 설정 로드
    ///
    /// 빈 문자열은 미설정으로 취급합니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| is_set(v));

        let api_key = get(API_KEY_ENV).ok_or_else(|| {
            BotError::Config(format!(
                "API key not found. Set the {} environment variable.",
                API_KEY_ENV
            ))
        })?;

        let base_url = parse_base_url(
            get(BASE_URL_ENV).as_deref().unwrap_or(DEFAULT_BASE_URL),
        )?;

        Ok(Self {
            api_key,
            base_url,
            embed_model: get(EMBED_MODEL_ENV).unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string()),
            chat_model: get(CHAT_MODEL_ENV).unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            faq_path: get(FAQ_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FAQ_PATH)),
            top_k: DEFAULT_TOP_K,
            history_window: DEFAULT_HISTORY_WINDOW,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// 베이스 URL 변경 (검증 포함)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    /// API 엔드포인트 URL 생성
    ///
    /// # Arguments
    /// * `path` - 베이스 기준 상대 경로 (예: `embeddings`)
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BotError::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }
}

/// 베이스 URL 파싱 및 정규화
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut normalized = raw.trim().to_string();
    // join()이 마지막 경로 세그먼트를 대체하지 않도록
    if !normalized.ends_with('/') {
        normalized.push('/');
    }

    let url = Url::parse(&normalized)
        .map_err(|e| BotError::Config(format!("Invalid base URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BotError::Config(format!(
            "Unsupported URL scheme '{}' in {}",
            other, raw
        ))),
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 존재 여부 확인
///
/// `BotConfig::from_env`와 같은 규칙을 따릅니다 (공백뿐인 값은 미설정).
pub fn has_api_key() -> bool {
    api_key_in(|key| std::env::var(key).ok())
}

fn api_key_in<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(API_KEY_ENV).is_some_and(|v| is_set(&v))
}

fn is_set(value: &str) -> bool {
    !value.trim().is_empty()
}

// ============================================================================
// Tests
// ============================================================================
