//! CLI 모듈
//!
//! service-bot 터미널 드라이버. 대화 세션을 소유하고 코어를 호출합니다.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::assistant::{announce, Assistant, TurnEvent, TurnState};
use crate::config::{has_api_key, BotConfig, API_KEY_ENV};
use crate::embedding::{CachedEmbedding, MistralEmbedding};
use crate::knowledge::{default_chunker, load_faq, ProgressObserver, Retriever};
use crate::llm::{MistralChat, DEFAULT_TEXT_SPEED};
use crate::prompt::{Plan, UserProfile, CREDITS_RANGE};
use crate::session::ConversationSession;

/// 빈 대화에서 보여주는 소개 문구
const INTRO_MESSAGE: &str = "\
This is a simple demonstration of how to use a large language model
and a vector database to implement a customer service bot
personalized with user data.

This application uses Mistral as language model,
so to run it you will need a corresponding API key.

The command line flags (--name, --plan, --credits, --profession)
simulate a user account. Change those values and ask something
related to them to see the chatbot in action.";

/// 첫 인사용 숨은 질문 (기록되지 않음)
const GREETING_QUERY: &str = "Greet the user and tell them, \
in a single sentence, about your main service.";

const READY_MESSAGE: &str = "I'm ready to answer your questions. If you don't know where to start, \
just ask me to suggest you some questions.";

type MistralAssistant = Assistant<CachedEmbedding<MistralEmbedding>, MistralChat>;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "service-bot")]
#[command(version, about = "FAQ 기반 고객 상담 챗봇", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(flatten)]
    pub profile: ProfileArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 환경변수 설정을 덮어쓰는 옵션
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// FAQ 문서 경로
    #[arg(long, global = true)]
    pub faq: Option<PathBuf>,

    /// API 베이스 URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// 채팅 모델
    #[arg(long, global = true)]
    pub chat_model: Option<String>,

    /// 임베딩 모델
    #[arg(long, global = true)]
    pub embed_model: Option<String>,

    /// 검색할 청크 수
    #[arg(short = 'k', long, global = true)]
    pub top_k: Option<usize>,

    /// 요청에 포함할 이전 메시지 수
    #[arg(long, global = true)]
    pub history: Option<usize>,

    /// 고정 문구 출력 속도 (문자/초, 0이면 즉시)
    #[arg(long, global = true, default_value_t = DEFAULT_TEXT_SPEED)]
    pub speed: f64,
}

/// 시뮬레이션 사용자 계정
#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    /// 사용자 이름
    #[arg(long, global = true, default_value = "Neo")]
    pub name: String,

    /// 요금제 (free, premium, enterprise)
    #[arg(long, global = true, default_value = "free")]
    pub plan: Plan,

    /// 크레딧 (0 ~ 1000)
    #[arg(long, global = true, default_value = "100.0", value_parser = parse_credits)]
    pub credits: f64,

    /// 직업
    #[arg(
        long,
        global = true,
        default_value = "Engineer",
        value_parser = ["Engineer", "PhD student", "Other"]
    )]
    pub profession: String,
}

impl From<&ProfileArgs> for UserProfile {
    fn from(args: &ProfileArgs) -> Self {
        UserProfile {
            name: args.name.clone(),
            plan: args.plan,
            credits: args.credits,
            profession: args.profession.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 대화형 상담 (/reset, /profile, /quit)
    Chat,

    /// 질문 하나에 답변
    Ask {
        /// 질문
        query: String,

        /// 검색된 FAQ 청크도 출력
        #[arg(long)]
        show_context: bool,
    },

    /// 설정 및 FAQ 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let profile = UserProfile::from(&cli.profile);
    match cli.command {
        Commands::Chat => cmd_chat(&cli.settings, profile).await,
        Commands::Ask {
            query,
            show_context,
        } => cmd_ask(&cli.settings, profile, &query, show_context).await,
        Commands::Status => cmd_status(&cli.settings),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 대화형 상담 (chat)
///
/// 빈 대화에서는 소개 → 인사 → 준비 안내 순으로 시작합니다.
async fn cmd_chat(settings: &SettingsArgs, profile: UserProfile) -> Result<()> {
    let config = load_config(settings)?;
    let assistant = build_assistant(&config).await?;
    let mut session = ConversationSession::new(profile);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if session.is_empty() {
            open_conversation(&assistant, &mut session, settings.speed).await;
        }

        print!("\n> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };
        let query = line.trim();

        match query {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("[OK] 대화가 초기화되었습니다.");
                continue;
            }
            "/profile" => {
                println!("{}", session.profile().render());
                continue;
            }
            _ => {}
        }

        println!();
        if let Err(e) = run_turn(&assistant, &mut session, query, true, false).await {
            if e.is_external() {
                println!("\n[!] 외부 서비스 오류로 응답하지 못했습니다: {}", e);
            } else {
                println!("\n[!] 응답 실패: {}", e);
            }
        }
    }

    println!();
    Ok(())
}

/// 단일 질문 명령어 (ask)
async fn cmd_ask(
    settings: &SettingsArgs,
    profile: UserProfile,
    query: &str,
    show_context: bool,
) -> Result<()> {
    let config = load_config(settings)?;
    let assistant = build_assistant(&config).await?;
    let mut session = ConversationSession::new(profile);

    run_turn(&assistant, &mut session, query, true, show_context)
        .await
        .context("응답 생성 실패")?;

    Ok(())
}

/// 상태 명령어 (status)
///
/// API 호출 없이 설정과 FAQ 청크 수만 확인합니다.
fn cmd_status(settings: &SettingsArgs) -> Result<()> {
    println!("service-bot v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if !has_api_key() {
        println!("[!] API 키: 미설정");
        println!("    설정: export {}=your-key", API_KEY_ENV);
        return Ok(());
    }
    println!("[OK] API 키: 설정됨");

    let config = load_config(settings)?;
    println!("[*] API: {}", config.base_url);
    println!("[*] 임베딩 모델: {}", config.embed_model);
    println!("[*] 채팅 모델: {}", config.chat_model);
    println!(
        "[*] 검색 청크 수: {}, 이전 메시지 수: {}",
        config.top_k, config.history_window
    );

    match load_faq(&config.faq_path) {
        Ok(text) => {
            let chunks = default_chunker().chunk(&text);
            println!(
                "[OK] FAQ: {} ({} 청크, {})",
                config.faq_path.display(),
                chunks.len(),
                format_bytes(text.len())
            );
        }
        Err(e) => {
            println!("[!] FAQ 읽기 실패 ({}): {}", config.faq_path.display(), e);
        }
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// 환경변수 설정 로드 후 CLI 옵션 적용
fn load_config(settings: &SettingsArgs) -> Result<BotConfig> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export {}=your-api-key",
            API_KEY_ENV
        );
    }

    let mut config = BotConfig::from_env().context("설정 로드 실패")?;

    if let Some(ref base_url) = settings.base_url {
        config = config
            .with_base_url(base_url)
            .context("잘못된 --base-url")?;
    }
    if let Some(ref faq) = settings.faq {
        config.faq_path = faq.clone();
    }
    if let Some(ref model) = settings.chat_model {
        config.chat_model = model.clone();
    }
    if let Some(ref model) = settings.embed_model {
        config.embed_model = model.clone();
    }
    if let Some(top_k) = settings.top_k {
        config.top_k = top_k;
    }
    if let Some(history) = settings.history {
        config.history_window = history;
    }

    Ok(config)
}

/// FAQ를 인덱싱하고 어시스턴트 생성
async fn build_assistant(config: &BotConfig) -> Result<MistralAssistant> {
    let text = load_faq(&config.faq_path)
        .with_context(|| format!("FAQ 읽기 실패: {}", config.faq_path.display()))?;

    let embedder = CachedEmbedding::new(
        MistralEmbedding::new(config).context("임베딩 클라이언트 생성 실패")?,
    );
    let chat = MistralChat::new(config).context("채팅 클라이언트 생성 실패")?;

    let mut retriever = Retriever::new(embedder);
    let chunk_count = default_chunker().chunk(&text).len();
    eprintln!("[*] {} 청크 인덱싱 중...", chunk_count);

    let progress = IndexProgress::new(chunk_count);
    let indexed = retriever.index_document(&text, &progress).await;
    match indexed {
        Ok(_) => progress.bar.finish(),
        Err(_) => progress.bar.abandon(),
    }
    indexed.context("FAQ 인덱싱 실패")?;

    let (hits, misses) = retriever.embedder().stats();
    tracing::debug!(
        "Embedding cache: {} entries (hits={}, misses={})",
        retriever.embedder().cached_count().await,
        hits,
        misses
    );

    Ok(Assistant::new(retriever, chat)
        .with_top_k(config.top_k)
        .with_history_window(config.history_window))
}

/// 소개 → 인사 → 준비 안내
async fn open_conversation(
    assistant: &MistralAssistant,
    session: &mut ConversationSession,
    speed: f64,
) {
    announce(session, INTRO_MESSAGE, speed, print_fragment).await;
    println!("\n");

    if let Err(e) = run_turn(assistant, session, GREETING_QUERY, false, false).await {
        println!("\n[!] 인사 생성 실패: {}", e);
    }
    println!("\n");

    announce(session, READY_MESSAGE, speed, print_fragment).await;
    println!();
}

/// 한 턴 실행 및 출력
async fn run_turn(
    assistant: &MistralAssistant,
    session: &mut ConversationSession,
    query: &str,
    record_query: bool,
    show_context: bool,
) -> crate::error::Result<()> {
    let mut state = TurnState::Idle;
    let result = assistant
        .respond(session, query, record_query, |event| match event {
            TurnEvent::State(next) => {
                tracing::debug!("Turn state: {:?} -> {:?}", state, next);
                state = next;
            }
            TurnEvent::Context(chunks) if show_context => {
                println!("[*] 검색된 FAQ ({} 건):", chunks.len());
                for (i, chunk) in chunks.iter().enumerate() {
                    println!("  {}. {}", i + 1, truncate_text(chunk, 120));
                }
                println!();
            }
            TurnEvent::Context(_) => {}
            TurnEvent::Fragment(text) => print_fragment(text),
        })
        .await;

    tracing::debug!("Turn finished: {:?}", state);
    println!();
    result.map(|_| ())
}

fn print_fragment(text: &str) {
    print!("{}", text);
    std::io::stdout().flush().ok();
}

/// 크레딧 값 검증
fn parse_credits(raw: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if !CREDITS_RANGE.contains(&value) {
        return Err(format!(
            "credits must be between {} and {}",
            CREDITS_RANGE.start(),
            CREDITS_RANGE.end()
        ));
    }
    Ok(value)
}

/// 인덱싱 진행률 막대 (청크 단위)
struct IndexProgress {
    bar: ProgressBar,
    total: u64,
}

impl IndexProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "    [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        Self::with_bar(bar, total)
    }

    fn with_bar(bar: ProgressBar, total: usize) -> Self {
        Self {
            bar,
            total: total as u64,
        }
    }
}

impl ProgressObserver for IndexProgress {
    fn on_progress(&self, ratio: f32) {
        let done = (ratio.clamp(0.0, 1.0) * self.total as f32).round() as u64;
        self.bar.set_position(done);
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credits() {
        assert_eq!(parse_credits("100.0"), Ok(100.0));
        assert_eq!(parse_credits(" 0 "), Ok(0.0));
        assert!(parse_credits("1000.01").is_err());
        assert!(parse_credits("-1").is_err());
        assert!(parse_credits("lots").is_err());
    }

    #[test]
    fn test_profile_defaults_from_cli() {
        let cli = Cli::try_parse_from(["service-bot", "status"]).unwrap();
        let profile = UserProfile::from(&cli.profile);
        assert_eq!(profile, UserProfile::default());
    }

    #[test]
    fn test_profile_flags() {
        let cli = Cli::try_parse_from([
            "service-bot",
            "ask",
            "How much is premium?",
            "--plan",
            "enterprise",
            "--credits",
            "12.5",
            "--profession",
            "PhD student",
        ])
        .unwrap();

        let profile = UserProfile::from(&cli.profile);
        assert_eq!(profile.plan, Plan::Enterprise);
        assert_eq!(profile.credits, 12.5);
        assert_eq!(profile.profession, "PhD student");
        assert!(matches!(cli.command, Commands::Ask { .. }));
    }

    #[test]
    fn test_invalid_profession_rejected() {
        let result = Cli::try_parse_from(["service-bot", "chat", "--profession", "Pilot"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_index_progress_tracks_chunks() {
        let progress = IndexProgress::with_bar(ProgressBar::hidden(), 4);

        progress.on_progress(0.25);
        assert_eq!(progress.bar.position(), 1);
        progress.on_progress(0.5);
        assert_eq!(progress.bar.position(), 2);
        progress.on_progress(1.0);
        assert_eq!(progress.bar.position(), 4);
    }

    #[test]
    fn test_index_progress_empty_document() {
        let progress = IndexProgress::with_bar(ProgressBar::hidden(), 0);
        progress.on_progress(1.0);
        assert_eq!(progress.bar.position(), 0);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
