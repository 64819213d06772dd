//! Assistant - 한 턴의 검색 → 프롬프트 조립 → 응답 스트리밍
//!
//! 턴 상태: `Idle → Retrieving → Assembling → Streaming → Complete | Failed`
//!
//! 취소는 없습니다. 스트리밍이 시작되면 끝나거나 실패할 때까지 진행합니다.
//! 실패한 턴은 대화 기록에 어시스턴트 메시지를 남기지 않지만,
//! 이미 전달된 조각은 호출자 화면에 그대로 남습니다.

use futures::StreamExt;

use crate::embedding::EmbeddingProvider;
use crate::error::{BotError, Result};
use crate::knowledge::{Retriever, DEFAULT_TOP_K};
use crate::llm::{stream_text, ChatMessage, ChatProvider, Role};
use crate::prompt::{build_prompt, UserProfile};
use crate::session::ConversationSession;

/// 채팅 요청에 포함하는 기본 이전 메시지 수
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

// ============================================================================
// Types
// ============================================================================

/// 턴 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Retrieving,
    Assembling,
    Streaming,
    Complete,
    Failed,
}

/// 턴 진행 이벤트
#[derive(Debug)]
pub enum TurnEvent<'a> {
    /// 상태 전이
    State(TurnState),
    /// 검색된 컨텍스트 (관련도 순)
    Context(&'a [String]),
    /// 응답 조각 (도착 순)
    Fragment(&'a str),
}

/// 완료된 턴
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub context: Vec<String>,
    /// 조각을 순서대로 이어붙인 최종 응답
    pub reply: String,
}

// ============================================================================
// Assistant
// ============================================================================

/// 상담 어시스턴트
///
/// 검색기와 채팅 프로바이더를 소유하며 프로세스 시작 시 한 번 생성됩니다.
pub struct Assistant<E, C> {
    retriever: Retriever<E>,
    chat: C,
    top_k: usize,
    history_window: usize,
}

impl<E, C> Assistant<E, C>
where
    E: EmbeddingProvider,
    C: ChatProvider,
{
    pub fn new(retriever: Retriever<E>, chat: C) -> Self {
        Self {
            retriever,
            chat,
            top_k: DEFAULT_TOP_K,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    pub fn retriever(&self) -> &Retriever<E> {
        &self.retriever
    }

    pub fn chat(&self) -> &C {
        &self.chat
    }

    /// 대화 한 턴 실행
    ///
    /// `record_query`가 참이면 질문을 사용자 메시지로 먼저 기록합니다.
    /// 이전 메시지 창은 방금 기록한 질문까지 포함합니다.
    /// 응답이 끝까지 도착해야 어시스턴트 메시지가 기록됩니다.
    pub async fn respond<F>(
        &self,
        session: &mut ConversationSession,
        query: &str,
        record_query: bool,
        mut on_event: F,
    ) -> Result<TurnOutcome>
    where
        F: FnMut(TurnEvent<'_>),
    {
        if record_query {
            session.append_message(Role::User, query);
        }
        let history = session.recent(self.history_window);

        on_event(TurnEvent::State(TurnState::Retrieving));
        let context = match self.retriever.search(query, self.top_k).await {
            Ok(context) => context,
            Err(e) => return Err(fail(&mut on_event, e)),
        };
        on_event(TurnEvent::Context(&context));

        on_event(TurnEvent::State(TurnState::Assembling));
        let messages = assemble_messages(&history, &context, session.profile(), query);

        let mut fragments = match self.chat.stream_chat(&messages).await {
            Ok(stream) => stream,
            Err(e) => return Err(fail(&mut on_event, e)),
        };

        on_event(TurnEvent::State(TurnState::Streaming));
        let mut reply = String::new();
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => {
                    on_event(TurnEvent::Fragment(&text));
                    reply.push_str(&text);
                }
                Err(e) => {
                    tracing::warn!("Reply interrupted after {} chars", reply.len());
                    return Err(fail(&mut on_event, e));
                }
            }
        }

        session.append_message(Role::Assistant, reply.clone());
        on_event(TurnEvent::State(TurnState::Complete));
        tracing::info!(
            session = %session.id(),
            "Turn complete: {} context chunks, {} reply chars",
            context.len(),
            reply.len()
        );

        Ok(TurnOutcome { context, reply })
    }
}

/// 고정 문구를 스트리밍하고 어시스턴트 메시지로 기록
pub async fn announce<F>(
    session: &mut ConversationSession,
    text: &str,
    chars_per_sec: f64,
    mut on_fragment: F,
) -> String
where
    F: FnMut(&str),
{
    let mut output = String::new();
    let mut fragments = stream_text(text, chars_per_sec);
    while let Some(Ok(fragment)) = fragments.next().await {
        on_fragment(&fragment);
        output.push_str(&fragment);
    }
    session.append_message(Role::Assistant, output.clone());
    output
}

/// 이전 메시지 + 조립된 프롬프트(사용자 메시지)
fn assemble_messages(
    history: &[ChatMessage],
    context: &[String],
    profile: &UserProfile,
    query: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(build_prompt(context, profile, query)));
    messages
}

fn fail<F>(on_event: &mut F, error: BotError) -> BotError
where
    F: FnMut(TurnEvent<'_>),
{
    tracing::warn!("Turn failed: {}", error);
    on_event(TurnEvent::State(TurnState::Failed));
    error
}

// ============================================================================
// Tests
// ============================================================================
