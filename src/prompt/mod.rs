//! 프롬프트 모듈
//!
//! 사용자 프로필, 검색된 FAQ 컨텍스트, 질문을 하나의 프롬프트로 조립합니다.
//! 내용 이스케이프는 하지 않습니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BotError;

// ============================================================================
// User Profile
// ============================================================================

/// 요금제
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Premium,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "premium" => Ok(Plan::Premium),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(BotError::Config(format!(
                "Unknown plan '{}' (expected free, premium or enterprise)",
                other
            ))),
        }
    }
}

/// 크레딧 허용 범위
pub const CREDITS_RANGE: std::ops::RangeInclusive<f64> = 0.0..=1000.0;

/// 시뮬레이션된 사용자 계정 정보
///
/// 매 질문마다 새로 전달되며 세션 외부에 식별자가 없습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub plan: Plan,
    pub credits: f64,
    pub profession: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "Neo".to_string(),
            plan: Plan::Free,
            credits: 100.0,
            profession: "Engineer".to_string(),
        }
    }
}

impl UserProfile {
    /// 프롬프트에 들어갈 (키, 값) 목록 - 필드 선언 순서
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("plan", self.plan.to_string()),
            // 정수값도 소수점 표기 유지 (100 -> "100.0")
            ("credits", format!("{:?}", self.credits)),
            ("profession", self.profession.clone()),
        ]
    }

    /// `key: value` 줄 단위 렌더링
    pub fn render(&self) -> String {
        self.attributes()
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Prompt Template
// ============================================================================

/// 프롬프트 조립
///
/// 모델에게 정보가 부족하면 답변을 거절하고 주어진 정보 밖의 내용은
/// 출력하지 말라고 지시합니다. 지시일 뿐 코드로 강제하지는 않습니다.
///
/// # Arguments
/// * `context` - 검색 순위대로 정렬된 청크
/// * `profile` - 사용자 프로필
/// * `query` - 사용자 질문 (그대로 삽입)
pub fn build_prompt(context: &[String], profile: &UserProfile, query: &str) -> String {
    format!(
        "
You are a customer service bot answering a query
from a user.

Here is the user information:

---------------------
{user_info}
---------------------

Here is a fragment of the Frequently Asked Questions (FAQ) guide
that may be relevant to answer the user query:

---------------------
{context}
---------------------

Given the user info and the FAQ guide, answer the following query.
If there is not enough information, decline to answer.
Do not output anything that can't be answered from the previous information.

Query: {query}
Answer:
",
        user_info = profile.render(),
        context = context.join("\n\n"),
        query = query,
    )
}

// ============================================================================
// Tests
// ============================================================================
