//! service-bot - FAQ 기반 고객 상담 챗봇
//!
//! FAQ 문서를 섹션 단위로 임베딩해 L2 최근접 이웃으로 검색하고,
//! 검색된 컨텍스트와 사용자 프로필로 프롬프트를 만들어
//! Mistral 채팅 응답을 스트리밍합니다.

pub mod assistant;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod prompt;
pub mod session;

// Re-exports
pub use assistant::{announce, Assistant, TurnEvent, TurnOutcome, TurnState};
pub use config::{has_api_key, BotConfig};
pub use embedding::{CachedEmbedding, EmbeddingProvider, MistralEmbedding};
pub use error::{BotError, Result};
pub use knowledge::{
    default_chunker, load_faq, Chunker, Corpus, FlatL2Index, NoProgress, ProgressObserver,
    RetrievedChunk, Retriever, SectionChunker,
};
pub use llm::{stream_text, ChatMessage, ChatProvider, FragmentStream, MistralChat, Role};
pub use prompt::{build_prompt, Plan, UserProfile};
pub use session::{ConversationSession, Message};
