//! Knowledge Base
//!
//! Self-service articles. Published articles are visible to everyone;
//! drafts only to technicians and admins, who also author and publish.
//! `view_count` only ever goes up.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{from_value, to_value, Value};
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::error::{Error, Result};
use crate::gateway::{Collection, Filter, Gateway, Update};
use crate::identity::Principal;
use crate::model::{AuditAction, KnowledgeArticle};
use crate::policy;

/// Fields for a new article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_published: bool,
}

/// Partial article update.
#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
}

#[derive(Clone)]
pub struct KnowledgeService {
    gateway: Arc<dyn Gateway>,
    audit: AuditTrail,
}

impl KnowledgeService {
    pub fn new(gateway: Arc<dyn Gateway>, audit: AuditTrail) -> Self {
        Self { gateway, audit }
    }

    /// Articles visible to the principal: published for everyone, drafts
    /// for authors only.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<KnowledgeArticle>> {
        let docs = self
            .gateway
            .find(Collection::KnowledgeArticles, Filter::new())
            .await?;
        let see_drafts = policy::can_author_articles(principal);
        let mut articles = Vec::with_capacity(docs.len());
        for doc in docs {
            let article = decode(doc)?;
            if article.is_published || see_drafts {
                articles.push(article);
            }
        }
        articles.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(articles)
    }

    pub async fn create(&self, principal: &Principal, fields: NewArticle) -> Result<KnowledgeArticle> {
        if !policy::can_author_articles(principal) {
            return Err(Error::Forbidden("article authoring is staff-only".into()));
        }
        let title = required(&fields.title, "title")?;
        let content = required(&fields.content, "content")?;
        let author = principal
            .user
            .as_ref()
            .ok_or_else(|| Error::Validation("author has no directory profile".into()))?;

        let now = Utc::now();
        let article = KnowledgeArticle {
            id: Uuid::new_v4(),
            title,
            content,
            category: fields.category,
            tags: fields.tags,
            author_id: author.id,
            author_name: author.name.clone(),
            is_published: fields.is_published,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.gateway
            .insert_one(Collection::KnowledgeArticles, to_value(&article).map_err(internal)?)
            .await?;
        info!(article = %article.id, published = article.is_published, "article created");
        self.audit
            .record(
                principal,
                AuditAction::Create,
                "knowledge_article",
                &article.id.to_string(),
                format!("created \"{}\"", article.title),
            )
            .await;
        Ok(article)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        fields: ArticleUpdate,
    ) -> Result<KnowledgeArticle> {
        if !policy::can_author_articles(principal) {
            return Err(Error::Forbidden("article authoring is staff-only".into()));
        }
        let mut article = self.fetch(id).await?;

        let mut update = Update::new();
        if let Some(title) = fields.title {
            article.title = required(&title, "title")?;
            update = update.set("title", article.title.clone());
        }
        if let Some(content) = fields.content {
            article.content = required(&content, "content")?;
            update = update.set("content", article.content.clone());
        }
        if let Some(category) = fields.category {
            article.category = category.clone();
            update = update.set("category", category);
        }
        if let Some(tags) = fields.tags {
            article.tags = tags;
            update = update.set("tags", to_value(&article.tags).map_err(internal)?);
        }
        if let Some(is_published) = fields.is_published {
            article.is_published = is_published;
            update = update.set("isPublished", is_published);
        }
        if update.is_empty() {
            return Ok(article);
        }
        article.updated_at = Utc::now();
        update = update.set("updatedAt", to_value(article.updated_at).map_err(internal)?);

        let counts = self
            .gateway
            .update_one(
                Collection::KnowledgeArticles,
                Filter::new().eq("id", id.to_string()),
                update,
            )
            .await?;
        if counts.matched == 0 {
            return Err(Error::NotFound(format!("article {id}")));
        }
        self.audit
            .record(
                principal,
                AuditAction::Update,
                "knowledge_article",
                &id.to_string(),
                format!("updated \"{}\"", article.title),
            )
            .await;
        Ok(article)
    }

    /// Bump the view counter. Increment-only, so the count never
    /// decreases.
    pub async fn record_view(&self, id: Uuid) -> Result<u64> {
        let article = self.fetch(id).await?;
        let next = article.view_count + 1;
        self.gateway
            .update_one(
                Collection::KnowledgeArticles,
                Filter::new().eq("id", id.to_string()),
                Update::new().set("viewCount", next),
            )
            .await?;
        Ok(next)
    }

    async fn fetch(&self, id: Uuid) -> Result<KnowledgeArticle> {
        let doc = self
            .gateway
            .find_one(Collection::KnowledgeArticles, Filter::new().eq("id", id.to_string()))
            .await?
            .ok_or_else(|| Error::NotFound(format!("article {id}")))?;
        decode(doc)
    }
}

fn decode(doc: Value) -> Result<KnowledgeArticle> {
    from_value(doc).map_err(|e| Error::Gateway(format!("malformed article document: {e}")))
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn internal(e: serde_json::Error) -> Error {
    Error::Gateway(format!("document serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGateway;
    use crate::model::{Role, User};

    fn principal(email: &str, role: Role) -> Principal {
        Principal {
            email: email.to_string(),
            user: Some(User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                name: "Author".into(),
                role,
                department: "ICT".into(),
                skills: vec![],
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }),
            is_super_user: false,
        }
    }

    fn service() -> KnowledgeService {
        let gw: Arc<dyn Gateway> = Arc::new(MemoryGateway::new());
        KnowledgeService::new(gw.clone(), AuditTrail::new(gw))
    }

    fn wifi_article(is_published: bool) -> NewArticle {
        NewArticle {
            title: "Connecting to staff wifi".into(),
            content: "Select the STAFF network and sign in with your directory account.".into(),
            category: "network".into(),
            tags: vec!["wifi".into()],
            is_published,
        }
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_requesters() {
        let svc = service();
        let tech = principal("t@dept.gov", Role::Technician);
        let requester = principal("r@dept.gov", Role::Requester);

        svc.create(&tech, wifi_article(true)).await.unwrap();
        svc.create(&tech, wifi_article(false)).await.unwrap();

        assert_eq!(svc.list(&tech).await.unwrap().len(), 2);
        let visible = svc.list(&requester).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert!(visible[0].is_published);
    }

    #[tokio::test]
    async fn test_requester_cannot_author() {
        let svc = service();
        let requester = principal("r@dept.gov", Role::Requester);
        let err = svc.create(&requester, wifi_article(true)).await.unwrap_err();
        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn test_view_count_only_increases() {
        let svc = service();
        let tech = principal("t@dept.gov", Role::Technician);
        let article = svc.create(&tech, wifi_article(true)).await.unwrap();

        assert_eq!(svc.record_view(article.id).await.unwrap(), 1);
        assert_eq!(svc.record_view(article.id).await.unwrap(), 2);
        assert_eq!(svc.record_view(article.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_publish_flips_visibility() {
        let svc = service();
        let tech = principal("t@dept.gov", Role::Technician);
        let requester = principal("r@dept.gov", Role::Requester);

        let draft = svc.create(&tech, wifi_article(false)).await.unwrap();
        assert!(svc.list(&requester).await.unwrap().is_empty());

        svc.update(
            &tech,
            draft.id,
            ArticleUpdate { is_published: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(svc.list(&requester).await.unwrap().len(), 1);
    }
}
