//! In-memory repositories - used when no database is configured, and in tests.
//!
//! All repositories share one [`InMemoryDatabase`] so that relations
//! (post tags, post -> comment cascade) behave as they do in PostgreSQL.
//! Data is lost on process restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use blog_core::admin::{AdminPostQuery, changelist_order};
use blog_core::domain::{Comment, Post, Tag, User};
use blog_core::error::RepoError;
use blog_core::pagination::{Page, PageRequest};
use blog_core::ports::{
    BaseRepository, CommentRepository, PostRepository, TagRepository, UserRepository,
};
use blog_core::query::{PostFilter, SimilarPost, rank_similar};
use blog_core::slug::slugify;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    tags: HashMap<Uuid, Tag>,
}

impl Tables {
    fn slug_taken(&self, slug: &str, date: NaiveDate, exclude: Option<Uuid>) -> bool {
        self.posts.values().any(|p| {
            p.slug == slug && p.publish_date() == date && Some(p.id) != exclude
        })
    }

    fn check_post(&self, post: &Post) -> Result<(), RepoError> {
        if !self.users.is_empty() && !self.users.contains_key(&post.author_id) {
            return Err(RepoError::Constraint(format!(
                "Author {} does not exist",
                post.author_id
            )));
        }
        if post.tags.iter().any(|t| !self.tags.contains_key(&t.id)) {
            return Err(RepoError::Constraint("Unknown tag".to_string()));
        }
        if self.slug_taken(&post.slug, post.publish_date(), Some(post.id)) {
            return Err(RepoError::Constraint(format!(
                "Slug '{}' is already used on {}",
                post.slug,
                post.publish_date()
            )));
        }
        Ok(())
    }

    /// Published posts, newest first.
    fn published(&self) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .values()
            .filter(|p| p.is_published())
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.publish.cmp(&a.publish));
        posts
    }
}

/// Shared in-memory storage.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// In-memory user repository.
pub struct InMemoryUserRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryUserRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.db.tables.read().await.users.get(&id).cloned())
    }

    async fn insert(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.db.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(RepoError::Constraint("Username already taken".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, mut user: User) -> Result<User, RepoError> {
        let mut tables = self.db.tables.write().await;
        let existing = tables.users.get(&user.id).ok_or(RepoError::NotFound)?;
        user.created_at = existing.created_at;
        user.updated_at = Utc::now();
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.db.tables.write().await;
        tables.users.remove(&id).ok_or(RepoError::NotFound)?;

        let orphaned: Vec<Uuid> = tables
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in orphaned {
            tables.posts.remove(&post_id);
            tables.comments.retain(|_, c| c.post_id != post_id);
        }
        Ok(())
    }
}

impl UserRepository for InMemoryUserRepository {}

/// In-memory post repository.
pub struct InMemoryPostRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryPostRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.db.tables.read().await.posts.get(&id).cloned())
    }

    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.db.tables.write().await;
        if tables.posts.contains_key(&post.id) {
            return Err(RepoError::Constraint("Post already exists".to_string()));
        }
        tables.check_post(&post)?;
        tables.posts.insert(post.id, post.clone());
        tracing::info!(post_id = %post.id, slug = %post.slug, "Post created");
        Ok(post)
    }

    async fn update(&self, mut post: Post) -> Result<Post, RepoError> {
        let mut tables = self.db.tables.write().await;
        let created_at = tables
            .posts
            .get(&post.id)
            .map(|p| p.created_at)
            .ok_or(RepoError::NotFound)?;
        tables.check_post(&post)?;
        post.created_at = created_at;
        post.updated_at = Utc::now();
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.db.tables.write().await;
        tables.posts.remove(&id).ok_or(RepoError::NotFound)?;
        tables.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn fetch_published(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let tables = self.db.tables.read().await;
        let posts: Vec<Post> = tables
            .published()
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        Ok(Page::from_items(posts, page))
    }

    async fn find_published(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let tables = self.db.tables.read().await;
        Ok(tables.posts.get(&id).filter(|p| p.is_published()).cloned())
    }

    async fn find_published_by_slug(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError> {
        let tables = self.db.tables.read().await;
        Ok(tables
            .posts
            .values()
            .find(|p| p.is_published() && p.slug == slug && p.publish_date() == date)
            .cloned())
    }

    async fn similar_posts(&self, post: &Post) -> Result<Vec<SimilarPost>, RepoError> {
        let tables = self.db.tables.read().await;
        Ok(rank_similar(post, tables.published()))
    }

    async fn slug_taken(
        &self,
        slug: &str,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        Ok(self.db.tables.read().await.slug_taken(slug, date, exclude))
    }

    async fn changelist(
        &self,
        query: &AdminPostQuery,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let now = Utc::now();
        let tables = self.db.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| query.matches(p, now))
            .cloned()
            .collect();
        posts.sort_by(changelist_order);
        Ok(Page::from_items(posts, page))
    }
}

/// In-memory comment repository.
pub struct InMemoryCommentRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryCommentRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BaseRepository<Comment, Uuid> for InMemoryCommentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(self.db.tables.read().await.comments.get(&id).cloned())
    }

    async fn insert(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.db.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(RepoError::Constraint(format!(
                "Post {} does not exist",
                comment.post_id
            )));
        }
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update(&self, mut comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.db.tables.write().await;
        let existing = tables
            .comments
            .get(&comment.id)
            .ok_or(RepoError::NotFound)?;
        comment.created_at = existing.created_at;
        comment.updated_at = Utc::now();
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.db.tables.write().await;
        tables.comments.remove(&id).ok_or(RepoError::NotFound)?;
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn active_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.db.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.active)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Comment, RepoError> {
        let mut tables = self.db.tables.write().await;
        let comment = tables.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
        comment.active = active;
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }
}

/// In-memory tag repository.
pub struct InMemoryTagRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryTagRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TagRepository for InMemoryTagRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError> {
        let tables = self.db.tables.read().await;
        Ok(tables.tags.values().find(|t| t.slug == slug).cloned())
    }

    async fn get_or_create(&self, name: &str) -> Result<Tag, RepoError> {
        let slug = slugify(name);
        let mut tables = self.db.tables.write().await;
        if let Some(existing) = tables.tags.values().find(|t| t.slug == slug) {
            return Ok(existing.clone());
        }

        let tag = Tag::new(name);
        tables.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_core::domain::PostStatus;
    use blog_core::pagination::PageToken;
    use chrono::{Duration, TimeZone};

    struct Repos {
        posts: InMemoryPostRepository,
        comments: InMemoryCommentRepository,
        tags: InMemoryTagRepository,
        users: InMemoryUserRepository,
    }

    fn repos() -> Repos {
        let db = InMemoryDatabase::new();
        Repos {
            posts: InMemoryPostRepository::new(db.clone()),
            comments: InMemoryCommentRepository::new(db.clone()),
            tags: InMemoryTagRepository::new(db.clone()),
            users: InMemoryUserRepository::new(db),
        }
    }

    fn post(slug: &str, status: PostStatus, days_ago: i64) -> Post {
        Post::new(Uuid::new_v4(), slug.to_uppercase(), slug.into(), "Body".into())
            .with_status(status)
            .published_at(Utc::now() - Duration::days(days_ago))
    }

    #[tokio::test]
    async fn test_published_query_excludes_drafts() {
        let r = repos();
        r.posts.insert(post("a", PostStatus::Published, 1)).await.unwrap();
        r.posts.insert(post("b", PostStatus::Draft, 0)).await.unwrap();
        r.posts.insert(post("c", PostStatus::Published, 2)).await.unwrap();

        let page = r
            .posts
            .fetch_published(&PostFilter::default(), PageRequest::new(PageToken::First))
            .await
            .unwrap();

        let slugs: Vec<&str> = page.items.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "c"]);
        assert!(page.items.iter().all(Post::is_published));
    }

    #[tokio::test]
    async fn test_published_query_by_tag() {
        let r = repos();
        let rust = r.tags.get_or_create("Rust").await.unwrap();
        r.posts
            .insert(post("tagged", PostStatus::Published, 1).with_tags(vec![rust.clone()]))
            .await
            .unwrap();
        r.posts.insert(post("plain", PostStatus::Published, 1)).await.unwrap();
        r.posts
            .insert(post("draft", PostStatus::Draft, 1).with_tags(vec![rust]))
            .await
            .unwrap();

        let page = r
            .posts
            .fetch_published(&PostFilter::tagged("rust"), PageRequest::new(PageToken::First))
            .await
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.items[0].slug, "tagged");
    }

    #[tokio::test]
    async fn test_slug_unique_per_publish_date() {
        let r = repos();
        let day = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        r.posts
            .insert(post("same", PostStatus::Published, 0).published_at(day))
            .await
            .unwrap();

        let clash = post("same", PostStatus::Draft, 0).published_at(day + Duration::hours(5));
        assert!(matches!(
            r.posts.insert(clash).await,
            Err(RepoError::Constraint(_))
        ));

        let next_day = post("same", PostStatus::Published, 0).published_at(day + Duration::days(1));
        assert!(r.posts.insert(next_day).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_refreshes_updated_at_only() {
        let r = repos();
        let created = r.posts.insert(post("a", PostStatus::Draft, 0)).await.unwrap();

        let mut edited = created.clone();
        edited.title = "Edited".into();
        edited.created_at = Utc::now() + Duration::days(3);
        let saved = r.posts.update(edited).await.unwrap();

        assert_eq!(saved.created_at, created.created_at);
        assert!(saved.updated_at >= created.updated_at);
        assert_eq!(saved.title, "Edited");
    }

    #[tokio::test]
    async fn test_comments_active_ordering_and_cascade() {
        let r = repos();
        let p = r.posts.insert(post("a", PostStatus::Published, 0)).await.unwrap();

        let mut first = Comment::new(p.id, "A".into(), "a@example.com".into(), "1".into());
        first.created_at = Utc::now() - Duration::minutes(5);
        let second = Comment::new(p.id, "B".into(), "b@example.com".into(), "2".into());
        let hidden = Comment::new(p.id, "C".into(), "c@example.com".into(), "3".into());

        r.comments.insert(second.clone()).await.unwrap();
        r.comments.insert(first.clone()).await.unwrap();
        r.comments.insert(hidden.clone()).await.unwrap();
        r.comments.set_active(hidden.id, false).await.unwrap();

        let active = r.comments.active_for_post(p.id).await.unwrap();
        let names: Vec<&str> = active.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);

        r.posts.delete(p.id).await.unwrap();
        assert!(r.comments.find_by_id(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_comment_requires_existing_post() {
        let r = repos();
        let orphan = Comment::new(Uuid::new_v4(), "A".into(), "a@example.com".into(), "x".into());
        assert!(matches!(
            r.comments.insert(orphan).await,
            Err(RepoError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_get_or_create_tag_is_idempotent() {
        let r = repos();
        let first = r.tags.get_or_create("Web Dev").await.unwrap();
        let second = r.tags.get_or_create("web dev").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(r.tags.find_by_slug("web-dev").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_similar_posts_contract() {
        let r = repos();
        let mut tags = Vec::new();
        for name in ["a", "b", "c"] {
            tags.push(r.tags.get_or_create(name).await.unwrap());
        }

        let target = r
            .posts
            .insert(post("target", PostStatus::Published, 0).with_tags(tags.clone()))
            .await
            .unwrap();
        for (i, n) in [1usize, 2, 1, 3, 1, 2].into_iter().enumerate() {
            let p = post(&format!("p{i}"), PostStatus::Published, i as i64 + 1)
                .with_tags(tags[..n].to_vec());
            r.posts.insert(p).await.unwrap();
        }
        r.posts
            .insert(post("draft", PostStatus::Draft, 0).with_tags(tags.clone()))
            .await
            .unwrap();

        let similar = r.posts.similar_posts(&target).await.unwrap();

        assert_eq!(similar.len(), 4);
        assert!(similar.iter().all(|s| s.post.id != target.id && s.post.is_published()));
        for pair in similar.windows(2) {
            assert!(pair[0].same_tags >= pair[1].same_tags);
            if pair[0].same_tags == pair[1].same_tags {
                assert!(pair[0].post.publish >= pair[1].post.publish);
            }
        }
        assert_eq!(similar[0].same_tags, 3);
    }

    #[tokio::test]
    async fn test_user_lookup_and_post_author_check() {
        let r = repos();
        let user = r
            .users
            .insert(User::new("admin".into(), "admin@example.com".into()))
            .await
            .unwrap();
        assert_eq!(
            r.users.find_by_id(user.id).await.unwrap().map(|u| u.username),
            Some("admin".to_string())
        );

        // Once users exist, posts must reference one of them.
        let stray = post("stray", PostStatus::Draft, 0);
        assert!(r.posts.insert(stray).await.is_err());

        let mut owned = post("owned", PostStatus::Draft, 0);
        owned.author_id = user.id;
        assert!(r.posts.insert(owned).await.is_ok());
    }
}
