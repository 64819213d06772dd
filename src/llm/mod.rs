//! LLM 모듈 - 스트리밍 채팅 완성
//!
//! 채팅 메시지 타입과 스트리밍 프로바이더 트레이트를 정의합니다.
//! 응답은 도착 순서대로 한 번만 소비할 수 있는 텍스트 조각 스트림입니다.

mod mistral;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use mistral::{fragment_stream, MistralChat};

// ============================================================================
// Types
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 채팅 요청 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 응답 조각 스트림
///
/// 유한하며 재시작할 수 없습니다. 중간 실패는 `Err` 항목으로 전달되고 스트림이 끝납니다.
pub type FragmentStream = BoxStream<'static, Result<String>>;

// ============================================================================
// ChatProvider Trait
// ============================================================================

/// 스트리밍 채팅 프로바이더 트레이트
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// 메시지 목록을 보내고 응답 조각 스트림을 반환
    ///
    /// 첫 조각 이전의 실패(연결, 인증, 상태 코드)는 여기서 `Err`로 반환됩니다.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<FragmentStream>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Canned Text Streaming
// ============================================================================

/// 고정 문자열 스트리밍 기본 속도 (문자/초)
pub const DEFAULT_TEXT_SPEED: f64 = 250.0;

/// 고정 문자열을 한 글자씩 스트리밍
///
/// 안내 문구 같은 미리 정해진 어시스턴트 메시지를 모델 응답과 같은 방식으로 출력할 때 사용합니다.
/// `chars_per_sec`가 0 이하면 지연 없이 내보냅니다.
pub fn stream_text(text: &str, chars_per_sec: f64) -> FragmentStream {
    let delay = (chars_per_sec > 0.0).then(|| Duration::from_secs_f64(1.0 / chars_per_sec));
    let chars: Vec<String> = text.chars().map(String::from).collect();

    stream::iter(chars)
        .then(move |c| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(c)
        })
        .boxed()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[test]
    fn test_role_serialization() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");

        let role: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_stream_text_yields_each_char_in_order() {
        let fragments: Vec<String> = stream_text("héllo", 0.0).try_collect().await.unwrap();
        assert_eq!(fragments, vec!["h", "é", "l", "l", "o"]);
    }

    #[tokio::test]
    async fn test_stream_text_paces_output() {
        let start = std::time::Instant::now();
        let text: String = stream_text("abcd", 200.0).try_collect().await.unwrap();
        assert_eq!(text, "abcd");
        // 4글자 x 5ms
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_stream_text_empty() {
        let fragments: Vec<String> = stream_text("", 250.0).try_collect().await.unwrap();
        assert!(fragments.is_empty());
    }
}
