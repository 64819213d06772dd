//! 대화 세션
//!
//! 호출 애플리케이션이 소유하는 메모리 내 대화 기록과 사용자 프로필입니다.
//! 메시지는 추가만 가능하며 생성 후 변경되지 않습니다.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::llm::{ChatMessage, Role};
use crate::prompt::UserProfile;

/// 대화 메시지
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// 대화 세션
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    messages: Vec<Message>,
    profile: UserProfile,
}

impl ConversationSession {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            profile,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 메시지 추가 (시간 순)
    pub fn append_message(&mut self, role: Role, content: impl Into<String>) -> &Message {
        self.messages.push(Message {
            role,
            content: content.into(),
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// 전체 대화 기록
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// 최근 `n`개 메시지를 채팅 요청 형식으로
    pub fn recent(&self, n: usize) -> Vec<ChatMessage> {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..].iter().map(ChatMessage::from).collect()
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 대화 초기화
    pub fn reset(&mut self) {
        tracing::info!(session = %self.id, "Conversation reset ({} messages)", self.messages.len());
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_temporal_order() {
        let mut session = ConversationSession::new(UserProfile::default());
        session.append_message(Role::User, "first");
        session.append_message(Role::Assistant, "second");

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].role, Role::Assistant);
        assert!(history[0].created_at <= history[1].created_at);
    }

    #[test]
    fn test_recent_window() {
        let mut session = ConversationSession::new(UserProfile::default());
        for i in 0..7 {
            session.append_message(Role::User, format!("m{}", i));
        }

        let recent = session.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "m2");
        assert_eq!(recent[4].content, "m6");

        assert_eq!(session.recent(100).len(), 7);
        assert!(session.recent(0).is_empty());
    }

    #[test]
    fn test_reset_clears_history_keeps_profile() {
        let mut session = ConversationSession::new(UserProfile::default());
        session.append_message(Role::User, "hello");
        session.reset();

        assert!(session.is_empty());
        assert_eq!(session.profile().name, "Neo");
    }
}
