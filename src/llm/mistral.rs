//! Mistral 채팅 완성 - SSE 스트리밍
//!
//! `stream: true` 요청의 server-sent events 응답을 텍스트 조각 스트림으로 변환합니다.
//! 각 이벤트는 `data: {json}` 줄이며 `data: [DONE]`으로 끝납니다.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::BotConfig;
use crate::error::{api_error, BotError, Result};

use super::{ChatMessage, ChatProvider, FragmentStream};

// ============================================================================
// MistralChat
// ============================================================================

/// Mistral 스트리밍 채팅 구현체
#[derive(Debug)]
pub struct MistralChat {
    api_key: String,
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

impl MistralChat {
    /// 설정에서 생성
    ///
    /// 타임아웃은 연결에만 적용됩니다. 응답 스트림은 끝나거나 실패할 때까지 읽습니다.
    pub fn new(config: &BotConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            client,
            endpoint: config.endpoint("chat/completions")?,
            model: config.chat_model.clone(),
        })
    }
}

/// 채팅 요청 본문
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// 스트리밍 응답 이벤트
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for MistralChat {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        tracing::debug!(
            "Chat request: model={}, messages={}",
            self.model,
            messages.len()
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error("chat", status.as_u16(), &body));
        }

        Ok(fragment_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// SSE Decoding
// ============================================================================

/// SSE 이벤트
#[derive(Debug, Clone, PartialEq)]
enum SseEvent {
    /// 텍스트 조각
    Delta(String),
    /// 스트림 종료 마커
    Done,
}

/// 줄 단위 SSE 디코더
///
/// 바이트 청크 경계가 줄이나 UTF-8 문자 중간에 걸려도 완성된 줄만 해석합니다.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// 바이트 청크 추가 후 완성된 줄의 해석 결과 반환
    ///
    /// 잘못된 줄을 만나면 그 에러까지만 반환합니다. 앞서 해석된 이벤트는 유지됩니다.
    fn feed(&mut self, bytes: &[u8]) -> Vec<Result<SseEvent>> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            match parse_line(&String::from_utf8_lossy(&line)) {
                Ok(Some(event)) => events.push(Ok(event)),
                Ok(None) => {}
                Err(e) => {
                    events.push(Err(e));
                    break;
                }
            }
        }
        events
    }

    /// 스트림 종료 시 남은 줄 처리
    fn finish(&mut self) -> Vec<Result<SseEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&rest))
            .transpose()
            .into_iter()
            .collect()
    }
}

/// SSE 한 줄 해석
///
/// `data:` 이외의 줄(빈 줄, 주석, event/id 필드)은 무시합니다.
fn parse_line(line: &str) -> Result<Option<SseEvent>> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }
    if data.is_empty() {
        return Ok(None);
    }

    let parsed: StreamResponse = serde_json::from_str(data)
        .map_err(|e| BotError::Parse(format!("Invalid stream event: {}", e)))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty());

    Ok(content.map(SseEvent::Delta))
}

// ============================================================================
// Fragment Stream
// ============================================================================

struct StreamState<B, E> {
    body: BoxStream<'static, std::result::Result<B, E>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl<B, E> StreamState<B, E> {
    /// 디코딩 결과를 대기열에 추가, 종료 마커나 에러면 스트림 종료
    fn absorb(&mut self, events: Vec<Result<SseEvent>>) {
        for event in events {
            match event {
                Ok(SseEvent::Delta(text)) => self.pending.push_back(Ok(text)),
                Ok(SseEvent::Done) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Malformed chat stream event: {}", e);
                    self.pending.push_back(Err(e));
                    self.finished = true;
                    break;
                }
            }
        }
    }
}

/// SSE 바이트 스트림을 텍스트 조각 스트림으로 변환
///
/// 조각은 도착 순서대로 나오며, 전송 중 실패는 이미 나온 조각 뒤에 `Err`로 한 번 전달됩니다.
pub fn fragment_stream<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<BotError> + Send + 'static,
{
    let state = StreamState {
        body: body.boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.feed(bytes.as_ref());
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    let err: BotError = e.into();
                    tracing::warn!("Chat stream interrupted: {}", err);
                    state.pending.push_back(Err(err));
                    state.finished = true;
                }
                None => {
                    let events = state.decoder.finish();
                    state.absorb(events);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

// ============================================================================
// Tests
// ============================================================================
