//! Text Chunking Module
//!
//! FAQ 문서를 섹션 구분자(헤더 마커) 기준으로 분할합니다.
//! 각 섹션은 독립적으로 검색 가능한 컨텍스트 단위가 됩니다.

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 기본 섹션 구분자 (Markdown 헤더 마커)
pub const DEFAULT_DELIMITER: char = '#';

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 섹션 구분 문자
    pub delimiter: char,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    ///
    /// 반환되는 청크는 모두 trim 되어 있고 비어있지 않으며 문서 순서를 따릅니다.
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SectionChunker
// ============================================================================

/// 헤더 마커 청커
///
/// 구분 문자가 나타나는 모든 위치에서 분할합니다.
/// - `## 제목`처럼 연속된 마커는 빈 조각을 만들고 버려짐
/// - 구분자가 없으면 문서 전체가 하나의 청크
/// - 빈 문서는 청크 없음
pub struct SectionChunker {
    config: ChunkConfig,
}

impl SectionChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }
}

impl Chunker for SectionChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        text.split(self.config.delimiter)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn name(&self) -> &'static str {
        "SectionChunker"
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(SectionChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================
