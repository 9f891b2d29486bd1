//! PostgreSQL repository implementations for users, comments and tags.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use blog_core::domain::{Comment, Tag};
use blog_core::error::RepoError;
use blog_core::ports::{CommentRepository, TagRepository, UserRepository};
use blog_core::slug::slugify;

use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::tag::{self, Entity as TagEntity};
use super::entity::user::Entity as UserEntity;
use super::postgres_base::{PostgresBaseRepository, map_db_err};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL comment repository.
pub type PostgresCommentRepository = PostgresBaseRepository<CommentEntity>;

impl UserRepository for PostgresUserRepository {}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn active_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let result = CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::Active.eq(true))
            .order_by_asc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Comment, RepoError> {
        let model = CommentEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?
            .ok_or(RepoError::NotFound)?;

        let mut active_model = model.into_active_model();
        active_model.active = Set(active);
        let model = active_model.update(self.db.as_ref()).await.map_err(map_db_err)?;

        tracing::info!(comment_id = %id, active, "Comment moderation changed");
        Ok(model.into())
    }
}

/// PostgreSQL tag repository.
pub struct PostgresTagRepository {
    db: Arc<DbConn>,
}

impl PostgresTagRepository {
    pub fn new(db: Arc<DbConn>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TagRepository for PostgresTagRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError> {
        let result = TagEntity::find()
            .filter(tag::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn get_or_create(&self, name: &str) -> Result<Tag, RepoError> {
        let slug = slugify(name);
        if let Some(existing) = self.find_by_slug(&slug).await? {
            return Ok(existing);
        }

        let active_model: tag::ActiveModel = Tag::new(name).into();
        match active_model.insert(self.db.as_ref()).await.map_err(map_db_err) {
            Ok(model) => {
                tracing::debug!(tag = %model.slug, "Tag created");
                Ok(model.into())
            }
            // Lost a race with a concurrent insert of the same slug.
            Err(RepoError::Constraint(_)) => self
                .find_by_slug(&slug)
                .await?
                .ok_or(RepoError::NotFound),
            Err(e) => Err(e),
        }
    }
}
