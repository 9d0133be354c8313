//! 回合编排集成测试
//!
//! 用 Mock 后端跑完整链路：摄取 -> 检索 grounding -> 两阶段工具调用 ->
//! 首轮问候 -> 偏好抽取 -> 记忆持久化。

use std::sync::Arc;

use docent::core::{Agent, AiError, RetryPolicy};
use docent::ingest::DocumentIngestor;
use docent::llm::{ChatClient, FailingChatClient, MockChatClient, MockEmbedder};
use docent::memory::{
    InMemoryMemoryStore, InMemorySessionStore, MemoryStore, Role, SessionManager,
};
use docent::retrieval::{EmbeddingGateway, InMemoryVectorStore, RetrievalService};
use docent::tools::{
    SiteStats, SiteStatsTool, StaticStatsSource, ToolExecutor, ToolRegistry,
};

struct Harness {
    agent: Agent,
    sessions: Arc<SessionManager>,
    memory: Arc<InMemoryMemoryStore>,
    store: Arc<InMemoryVectorStore>,
    embedder: MockEmbedder,
}

fn harness(chat: Arc<dyn ChatClient>) -> Harness {
    let embedder = MockEmbedder::default();
    let store = Arc::new(InMemoryVectorStore::new());
    let retrieval = Arc::new(RetrievalService::new(
        Arc::new(embedder.clone()),
        store.clone(),
    ));
    let sessions = Arc::new(SessionManager::new(Arc::new(InMemorySessionStore::new())));
    let memory = Arc::new(InMemoryMemoryStore::new());

    let mut registry = ToolRegistry::new();
    registry.register(SiteStatsTool::new(StaticStatsSource::new(SiteStats {
        total_views: 5000,
        total_likes: 321,
        total_comments: 87,
        post_count: 42,
    })));
    let executor = ToolExecutor::new(Arc::new(registry));

    let agent = Agent::new(
        chat,
        retrieval,
        sessions.clone(),
        memory.clone(),
        executor,
    );

    Harness {
        agent,
        sessions,
        memory,
        store,
        embedder,
    }
}

#[tokio::test]
async fn test_tool_call_turn_end_to_end() {
    let chat = Arc::new(MockChatClient::with_tool_call(
        "get_site_stats",
        "{}",
        "The site has 42 posts and 5000 views.",
    ));
    let h = harness(chat);

    let reply = h.agent.process_turn("session_tools", "how is the site doing?").await;
    assert_eq!(reply.tool_invocations, 1);
    assert!(reply.reply.contains("42 posts"));
}

#[tokio::test]
async fn test_plain_turn_makes_no_tool_calls() {
    let chat = Arc::new(MockChatClient::replying("Just an answer."));
    let h = harness(chat);

    let reply = h.agent.process_turn("session_plain", "hello there").await;
    assert_eq!(reply.tool_invocations, 0);
    assert!(reply.reply.contains("Just an answer."));
}

#[tokio::test]
async fn test_greeting_only_on_first_turn() {
    let chat = Arc::new(MockChatClient::replying("answer"));
    let h = harness(chat);

    let first = h.agent.process_turn("session_greet", "hi").await;
    assert!(first.reply.starts_with("Good "));

    let second = h.agent.process_turn("session_greet", "and again").await;
    assert!(!second.reply.starts_with("Good "));
    assert_eq!(second.reply, "answer");
}

#[tokio::test]
async fn test_interests_merged_into_preferences() {
    let chat = Arc::new(MockChatClient::replying("noted"));
    let h = harness(chat);

    h.agent
        .process_turn("session_prefs", "I am interested in ai and machine learning.")
        .await;

    let session = h
        .sessions
        .get_session("session_prefs")
        .await
        .unwrap()
        .expect("session exists");
    assert!(session
        .preferences
        .interests
        .contains("ai and machine learning"));
    assert_eq!(
        session.last_question.as_deref(),
        Some("I am interested in ai and machine learning.")
    );
}

#[tokio::test]
async fn test_history_recorded_in_replay_order() {
    let chat = Arc::new(MockChatClient::replying("reply"));
    let h = harness(chat);

    h.agent.process_turn("session_hist", "first question").await;
    h.agent.process_turn("session_hist", "second question").await;

    let session = h
        .sessions
        .get_session("session_hist")
        .await
        .unwrap()
        .expect("session exists");
    assert_eq!(session.messages.len(), 4);
    assert_eq!(session.messages[0].role, Role::User);
    assert_eq!(session.messages[0].content, "first question");
    assert_eq!(session.messages[1].role, Role::Assistant);
    assert_eq!(session.messages[2].content, "second question");
}

#[tokio::test]
async fn test_conversation_memory_persisted_with_context() {
    let chat = Arc::new(MockChatClient::replying("grounded answer"));
    let h = harness(chat);

    // 先摄取一篇文档，保证检索能命中并产生溯源
    let gateway = Arc::new(EmbeddingGateway::new(
        Arc::new(h.embedder.clone()),
        h.store.clone(),
    ));
    let ingestor = DocumentIngestor::new(gateway);
    ingestor
        .ingest_content(
            "docs/setup.md",
            "Documentation: how to install and configure the site",
        )
        .await
        .unwrap();

    h.agent
        .process_turn(
            "session_mem",
            "how to install and configure the site",
        )
        .await;

    let record = h
        .memory
        .load("session_mem")
        .await
        .unwrap()
        .expect("memory record exists");
    assert_eq!(record.session_id, "session_mem");
    assert_eq!(record.messages.len(), 2);
    assert!(!record.context.is_empty());
    assert_eq!(record.context[0].path, "docs/setup.md");
}

#[tokio::test]
async fn test_provider_failure_degrades_to_fallback() {
    let chat = Arc::new(FailingChatClient::new(AiError::Network(
        "connection refused".to_string(),
    )));
    let h = harness(chat.clone());
    let agent = h.agent.with_retry(RetryPolicy::new(1));

    let reply = agent.process_turn("session_fail", "hello?").await;
    assert_eq!(reply.tool_invocations, 0);
    assert!(reply
        .reply
        .contains(AiError::Network(String::new()).fallback_text()));
    assert_eq!(chat.attempt_count(), 1);
}

#[tokio::test]
async fn test_invalid_request_not_retried() {
    let chat = Arc::new(FailingChatClient::new(AiError::InvalidRequest(
        "bad payload".to_string(),
    )));
    let h = harness(chat.clone());

    h.agent.process_turn("session_invalid", "hi").await;
    // 不可重试错误只打一次
    assert_eq!(chat.attempt_count(), 1);
}
