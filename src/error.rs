//! 에러 타입
//!
//! 라이브러리 전체에서 사용하는 에러 분류입니다.
//! - 설정 에러: 시작 시점에 치명적 (API 키 누락 등)
//! - 외부 서비스 에러: 임베딩/채팅 호출 실패, 재시도 없음
//! - 내부 에러: 차원 불일치, 인덱스 미구축, FAQ 읽기 실패

use thiserror::Error;

/// service-bot 에러
#[derive(Debug, Error)]
pub enum BotError {
    /// 설정 누락 또는 잘못된 설정값
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP 전송 실패 (연결, 타임아웃, 스트림 중단)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 외부 API가 실패 상태 코드를 반환
    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// 응답 페이로드 파싱 실패
    #[error("Parse error: {0}")]
    Parse(String),

    /// 벡터 차원이 인덱스 차원과 다름
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 인덱스 구축 전 검색 시도
    #[error("Index has not been built")]
    IndexNotBuilt,

    /// FAQ 파일 I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// 외부 서비스 호출 실패 여부
    pub fn is_external(&self) -> bool {
        matches!(self, BotError::Http(_) | BotError::Api { .. } | BotError::Parse(_))
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Parse(err.to_string())
    }
}

/// 라이브러리 Result 별칭
pub type Result<T> = std::result::Result<T, BotError>;

/// API 에러 응답 본문 (`message` 또는 `detail` 필드)
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// 실패 상태 코드 응답을 `BotError::Api`로 변환
///
/// 본문이 JSON 에러 형식이면 메시지만 추출하고, 아니면 본문 그대로 사용합니다.
pub(crate) fn api_error(service: &'static str, status: u16, body: &str) -> BotError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ApiErrorBody {
            detail: Some(detail),
            ..
        }) => match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        },
        _ => body.trim().to_string(),
    };

    BotError::Api {
        service,
        status,
        message,
    }
}
