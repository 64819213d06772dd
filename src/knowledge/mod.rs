//! Knowledge 모듈 - FAQ 검색 코퍼스
//!
//! - Chunker: 헤더 마커 기준 섹션 분할
//! - Vector: 전수 탐색 L2 인덱스
//! - Retriever: 청킹 + 임베딩 + 인덱스 통합, 쿼리별 top-k 검색

mod chunker;
mod retriever;
mod vector;

// Re-exports
pub use chunker::{default_chunker, ChunkConfig, Chunker, SectionChunker, DEFAULT_DELIMITER};
pub use retriever::{
    Corpus, NoProgress, ProgressObserver, RetrievedChunk, Retriever, DEFAULT_TOP_K,
};
pub use vector::{l2_distance, l2_distance_squared, FlatL2Index, Neighbor};

use std::path::Path;

use crate::error::Result;

/// FAQ 문서 읽기
///
/// 프로세스 시작 시 한 번 호출됩니다.
pub fn load_faq(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)?;
    tracing::debug!("Loaded FAQ from {} ({} bytes)", path.display(), text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_faq() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# Refunds\nFive days.\n").unwrap();

        let text = load_faq(file.path()).unwrap();
        let chunks = default_chunker().chunk(&text);
        assert_eq!(chunks, vec!["Refunds\nFive days."]);
    }

    #[test]
    fn test_load_faq_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_faq(&dir.path().join("missing.md"));
        assert!(matches!(result, Err(crate::error::BotError::Io(_))));
    }
}
