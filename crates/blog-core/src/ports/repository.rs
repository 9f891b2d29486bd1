use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::admin::AdminPostQuery;
use crate::domain::{Comment, Post, Tag, User};
use crate::error::RepoError;
use crate::pagination::{Page, PageRequest};
use crate::query::{PostFilter, SimilarPost};

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Persist a new entity.
    async fn insert(&self, entity: T) -> Result<T, RepoError>;

    /// Persist changes to an existing entity; refreshes its `updated_at`.
    async fn update(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository; authors are only looked up by id.
pub trait UserRepository: BaseRepository<User, Uuid> {}

/// Post repository.
///
/// Every post returned carries its tags. `insert` and `update` reject a
/// slug already used by another post published on the same date with
/// [`RepoError::Constraint`], and replace the post's tag associations
/// with `post.tags` (which must already exist).
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    /// Published posts, newest first, narrowed by `filter`.
    async fn fetch_published(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError>;

    /// A published post by id.
    async fn find_published(&self, id: Uuid) -> Result<Option<Post>, RepoError>;

    /// A published post by publish date and slug.
    async fn find_published_by_slug(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError>;

    /// Published posts sharing tags with `post`, best match first.
    async fn similar_posts(&self, post: &Post) -> Result<Vec<SimilarPost>, RepoError>;

    /// Whether another post published on `date` already uses `slug`.
    async fn slug_taken(
        &self,
        slug: &str,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError>;

    /// Admin changelist: posts of any status, in admin ordering.
    async fn changelist(
        &self,
        query: &AdminPostQuery,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError>;
}

/// Comment repository.
#[async_trait]
pub trait CommentRepository: BaseRepository<Comment, Uuid> {
    /// Active comments of a post, oldest first.
    async fn active_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError>;

    /// Flip the moderation flag; returns the updated comment.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Comment, RepoError>;
}

/// Tag repository.
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError>;

    /// Return the tag whose slug matches `name`'s slug, creating it if needed.
    async fn get_or_create(&self, name: &str) -> Result<Tag, RepoError>;
}
