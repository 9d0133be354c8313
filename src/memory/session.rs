//! 会话与偏好管理
//!
//! 会话状态机：absent --create--> active --update/add_message--> active --清理扫描--> expired。
//! 会话存储是注入的 SessionStore 接口（而非模块级全局 Map），内存实现把读-改-写
//! 放在同一把写锁内完成，避免并发轮次对同一会话的竞态。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::AiError;
use crate::memory::{Message, Role};

/// 对话风格：影响问候模板
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStyle {
    Technical,
    Casual,
    Detailed,
    #[default]
    Default,
}

/// 访客偏好
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Preferences {
    pub interests: BTreeSet<String>,
    pub preferred_topics: BTreeSet<String>,
    pub language: String,
    pub conversation_style: ConversationStyle,
    pub last_interaction: DateTime<Utc>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            interests: BTreeSet::new(),
            preferred_topics: BTreeSet::new(),
            language: "en".to_string(),
            conversation_style: ConversationStyle::Default,
            last_interaction: Utc::now(),
        }
    }
}

/// 偏好补丁：只更新给出的字段，其余保持不变（浅合并）
#[derive(Clone, Debug, Default)]
pub struct PreferencesUpdate {
    pub interests: Option<BTreeSet<String>>,
    pub preferred_topics: Option<BTreeSet<String>>,
    pub language: Option<String>,
    pub conversation_style: Option<ConversationStyle>,
}

/// 单个访客会话
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub preferences: Preferences,
    pub messages: Vec<Message>,
    /// 最近一条用户提问，作为会话上下文
    pub last_question: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            preferences: Preferences::default(),
            messages: Vec::new(),
            last_question: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 生成随机 id 的新会话
    pub fn with_random_id() -> Self {
        Self::new(format!("session_{}", uuid::Uuid::new_v4()))
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.preferences.last_interaction = now;
    }
}

/// 会话仓库接口：注入给 SessionManager，便于替换为持久化实现。
/// update 以回调形式在仓库内部的锁 / 事务中执行，读-改-写不跨越锁边界。
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Session>, AiError>;

    async fn put(&self, session: Session) -> Result<(), AiError>;

    /// 在仓库内部原子地修改一个会话；会话不存在时返回 false
    async fn update(
        &self,
        id: &str,
        mutate: Box<dyn for<'a> FnOnce(&'a mut Session) + Send>,
    ) -> Result<bool, AiError>;

    async fn remove(&self, id: &str) -> Result<bool, AiError>;

    /// 删除 updated_at 早于 cutoff 的所有会话，返回删除数量
    async fn remove_updated_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AiError>;

    async fn count(&self) -> Result<usize, AiError>;
}

/// 内存实现：RwLock<HashMap>，所有修改在写锁内完成
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, AiError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put(&self, session: Session) -> Result<(), AiError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        mutate: Box<dyn for<'a> FnOnce(&'a mut Session) + Send>,
    ) -> Result<bool, AiError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                mutate(session);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool, AiError> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn remove_updated_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AiError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at >= cutoff);
        Ok(before - sessions.len())
    }

    async fn count(&self) -> Result<usize, AiError> {
        Ok(self.sessions.read().await.len())
    }
}

/// 会话管理器：建会话、浅合并偏好、追加消息、过期清理
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// 创建会话（偏好为固定默认值）；id 已存在时保持原会话不变
    pub async fn create_session(&self, id: &str) -> Result<Session, AiError> {
        if let Some(existing) = self.store.get(id).await? {
            return Ok(existing);
        }
        let session = Session::new(id);
        self.store.put(session.clone()).await?;
        Ok(session)
    }

    /// 无 id 访客入口：生成随机 id 的新会话并落库
    pub async fn create_anonymous(&self) -> Result<Session, AiError> {
        let session = Session::with_random_id();
        self.store.put(session.clone()).await?;
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, AiError> {
        self.store.get(id).await
    }

    /// 首次交互即建会话
    pub async fn get_or_create(&self, id: &str) -> Result<Session, AiError> {
        self.create_session(id).await
    }

    /// 浅合并偏好：只覆盖补丁给出的字段；总是刷新 last_interaction / updated_at
    pub async fn update_preferences(
        &self,
        id: &str,
        patch: PreferencesUpdate,
    ) -> Result<(), AiError> {
        let found = self
            .store
            .update(
                id,
                Box::new(move |session| {
                    if let Some(interests) = patch.interests {
                        session.preferences.interests = interests;
                    }
                    if let Some(topics) = patch.preferred_topics {
                        session.preferences.preferred_topics = topics;
                    }
                    if let Some(language) = patch.language {
                        session.preferences.language = language;
                    }
                    if let Some(style) = patch.conversation_style {
                        session.preferences.conversation_style = style;
                    }
                    session.touch();
                }),
            )
            .await?;
        if found {
            Ok(())
        } else {
            Err(AiError::Session(format!("session not found: {id}")))
        }
    }

    /// 将抽取出的兴趣 / 主题并入偏好（集合并集，入参已规范为小写）
    pub async fn merge_extracted(
        &self,
        id: &str,
        interests: BTreeSet<String>,
        topics: BTreeSet<String>,
    ) -> Result<(), AiError> {
        if interests.is_empty() && topics.is_empty() {
            return Ok(());
        }
        let found = self
            .store
            .update(
                id,
                Box::new(move |session| {
                    session.preferences.interests.extend(interests);
                    session.preferences.preferred_topics.extend(topics);
                    session.touch();
                }),
            )
            .await?;
        if found {
            Ok(())
        } else {
            Err(AiError::Session(format!("session not found: {id}")))
        }
    }

    /// 追加消息（插入序即回放序）；用户消息同时记为会话的「最近提问」
    pub async fn add_message(&self, id: &str, role: Role, content: &str) -> Result<(), AiError> {
        let content = content.to_string();
        let found = self
            .store
            .update(
                id,
                Box::new(move |session| {
                    if role == Role::User {
                        session.last_question = Some(content.clone());
                    }
                    let message = Message {
                        role,
                        content,
                        tool_calls: Vec::new(),
                        tool_call_id: None,
                    };
                    session.messages.push(message);
                    session.touch();
                }),
            )
            .await?;
        if found {
            Ok(())
        } else {
            Err(AiError::Session(format!("session not found: {id}")))
        }
    }

    /// 清理扫描：删除 now - updated_at > max_age 的会话，返回删除数量
    pub async fn cleanup_old_sessions(&self, max_age: Duration) -> Result<usize, AiError> {
        let cutoff = Utc::now() - max_age;
        self.store.remove_updated_before(cutoff).await
    }

    pub async fn active_count(&self) -> Result<usize, AiError> {
        self.store.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemorySessionStore::new()))
    }

    #[tokio::test]
    async fn test_create_session_defaults() {
        let mgr = manager();
        let session = mgr.create_session("visitor_1").await.unwrap();
        assert_eq!(session.id, "visitor_1");
        assert!(session.preferences.interests.is_empty());
        assert_eq!(session.preferences.language, "en");
        assert_eq!(
            session.preferences.conversation_style,
            ConversationStyle::Default
        );
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn test_create_anonymous_assigns_unique_ids() {
        let mgr = manager();
        let a = mgr.create_anonymous().await.unwrap();
        let b = mgr.create_anonymous().await.unwrap();

        assert!(a.id.starts_with("session_"));
        assert_ne!(a.id, b.id);
        assert!(mgr.get_session(&a.id).await.unwrap().is_some());
        assert_eq!(mgr.active_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_preferences_is_shallow_merge() {
        let mgr = manager();
        mgr.create_session("v").await.unwrap();
        mgr.update_preferences(
            "v",
            PreferencesUpdate {
                preferred_topics: Some(["rust".to_string()].into()),
                language: Some("de".to_string()),
                conversation_style: Some(ConversationStyle::Technical),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // 只更新 interests，其余字段必须保留
        mgr.update_preferences(
            "v",
            PreferencesUpdate {
                interests: Some(["ai".to_string()].into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let session = mgr.get_session("v").await.unwrap().unwrap();
        assert!(session.preferences.interests.contains("ai"));
        assert!(session.preferences.preferred_topics.contains("rust"));
        assert_eq!(session.preferences.language, "de");
        assert_eq!(
            session.preferences.conversation_style,
            ConversationStyle::Technical
        );
    }

    #[tokio::test]
    async fn test_update_preferences_missing_session() {
        let mgr = manager();
        let err = mgr
            .update_preferences("ghost", PreferencesUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Session(_)));
    }

    #[tokio::test]
    async fn test_add_message_records_last_question() {
        let mgr = manager();
        mgr.create_session("v").await.unwrap();
        mgr.add_message("v", Role::User, "What projects have you built?")
            .await
            .unwrap();
        mgr.add_message("v", Role::Assistant, "A few Rust services.")
            .await
            .unwrap();

        let session = mgr.get_session("v").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(
            session.last_question.as_deref(),
            Some("What projects have you built?")
        );
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_stale_sessions() {
        let store = Arc::new(InMemorySessionStore::new());
        let mgr = SessionManager::new(store.clone());

        let mut stale = Session::new("stale");
        stale.updated_at = Utc::now() - Duration::hours(25);
        store.put(stale).await.unwrap();

        let mut fresh = Session::new("fresh");
        fresh.updated_at = Utc::now() - Duration::hours(1);
        store.put(fresh).await.unwrap();

        let removed = mgr.cleanup_old_sessions(Duration::hours(24)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(mgr.get_session("stale").await.unwrap().is_none());
        assert!(mgr.get_session("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_merge_extracted_is_union() {
        let mgr = manager();
        mgr.create_session("v").await.unwrap();
        mgr.merge_extracted("v", ["ai".to_string()].into(), ["rust".to_string()].into())
            .await
            .unwrap();
        mgr.merge_extracted(
            "v",
            ["ai".to_string(), "webassembly".to_string()].into(),
            BTreeSet::new(),
        )
        .await
        .unwrap();

        let session = mgr.get_session("v").await.unwrap().unwrap();
        assert_eq!(session.preferences.interests.len(), 2);
        assert!(session.preferences.preferred_topics.contains("rust"));
    }
}
