//! PostgreSQL post repository: published-post queries, similarity ranking
//! and the admin changelist.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbConn, EntityTrait,
    FromQueryResult, JoinType, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, TransactionTrait,
};
use uuid::Uuid;

use blog_core::admin::{AdminPostQuery, POST_ADMIN, day_bounds};
use blog_core::domain::{Post, Tag};
use blog_core::error::RepoError;
use blog_core::pagination::{Page, PageRequest};
use blog_core::ports::{BaseRepository, PostRepository};
use blog_core::query::{PostFilter, SIMILAR_POSTS_LIMIT, SimilarPost};

use super::entity::post::{self, Entity as PostEntity, Status};
use super::entity::post_tag::{self, Entity as PostTagEntity};
use super::entity::tag::{self, Entity as TagEntity};
use super::postgres_base::map_db_err;

/// Row of the similarity aggregate.
#[derive(Debug, FromQueryResult)]
struct SimilarRow {
    id: Uuid,
    same_tags: i64,
}

/// `LIKE` pattern matching `term` literally anywhere in the value.
fn contains_pattern(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape('\\')
}

/// PostgreSQL post repository.
pub struct PostgresPostRepository {
    db: Arc<DbConn>,
}

impl PostgresPostRepository {
    pub fn new(db: Arc<DbConn>) -> Self {
        Self { db }
    }

    fn published() -> Select<PostEntity> {
        PostEntity::find().filter(post::Column::Status.eq(Status::Published))
    }

    /// Attach tags to each model, preserving order.
    async fn with_tags(&self, models: Vec<post::Model>) -> Result<Vec<Post>, RepoError> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let links = PostTagEntity::find()
            .filter(post_tag::Column::PostId.is_in(ids))
            .find_also_related(TagEntity)
            .order_by_asc(tag::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        let mut tags_by_post: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for (link, tag) in links {
            if let Some(tag) = tag {
                tags_by_post.entry(link.post_id).or_default().push(tag.into());
            }
        }

        Ok(models
            .into_iter()
            .map(|model| {
                let tags = tags_by_post.remove(&model.id).unwrap_or_default();
                Post::from(model).with_tags(tags)
            })
            .collect())
    }

    async fn one_with_tags(&self, model: Option<post::Model>) -> Result<Option<Post>, RepoError> {
        match model {
            Some(model) => Ok(self.with_tags(vec![model]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn paginate(
        &self,
        select: Select<PostEntity>,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let paginator = select.paginate(self.db.as_ref(), page.size);
        let totals = paginator.num_items_and_pages().await.map_err(map_db_err)?;

        let number = page.token.resolve(totals.number_of_pages);
        let models = paginator.fetch_page(number - 1).await.map_err(map_db_err)?;
        let items = self.with_tags(models).await?;

        Ok(Page {
            items,
            number,
            num_pages: totals.number_of_pages.max(1),
            count: totals.number_of_items,
            page_size: page.size,
        })
    }

    async fn ensure_slug_free(&self, post: &Post) -> Result<(), RepoError> {
        if self
            .slug_taken(&post.slug, post.publish_date(), Some(post.id))
            .await?
        {
            return Err(RepoError::Constraint(format!(
                "Slug '{}' is already used on {}",
                post.slug,
                post.publish_date()
            )));
        }
        Ok(())
    }

    async fn replace_tags<C>(db: &C, post_id: Uuid, tags: &[Tag]) -> Result<(), RepoError>
    where
        C: ConnectionTrait,
    {
        PostTagEntity::delete_many()
            .filter(post_tag::Column::PostId.eq(post_id))
            .exec(db)
            .await
            .map_err(map_db_err)?;

        if tags.is_empty() {
            return Ok(());
        }

        let links = tags.iter().map(|t| post_tag::ActiveModel {
            post_id: sea_orm::Set(post_id),
            tag_id: sea_orm::Set(t.id),
        });
        PostTagEntity::insert_many(links)
            .exec(db)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for PostgresPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let model = PostEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        self.one_with_tags(model).await
    }

    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        self.ensure_slug_free(&post).await?;

        let tags = post.tags.clone();
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let active_model: post::ActiveModel = post.into();
        let model = active_model.insert(&txn).await.map_err(map_db_err)?;
        Self::replace_tags(&txn, model.id, &tags).await?;

        txn.commit().await.map_err(map_db_err)?;

        tracing::info!(post_id = %model.id, slug = %model.slug, "Post created");
        Ok(Post::from(model).with_tags(tags))
    }

    async fn update(&self, post: Post) -> Result<Post, RepoError> {
        self.ensure_slug_free(&post).await?;

        let tags = post.tags.clone();
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let active_model: post::ActiveModel = post.into();
        let model = active_model.update(&txn).await.map_err(map_db_err)?;
        Self::replace_tags(&txn, model.id, &tags).await?;

        txn.commit().await.map_err(map_db_err)?;

        Ok(Post::from(model).with_tags(tags))
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = PostEntity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn fetch_published(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let mut select = Self::published();

        if let Some(slug) = &filter.tag {
            select = select
                .join(JoinType::InnerJoin, post::Relation::PostTag.def())
                .join(JoinType::InnerJoin, post_tag::Relation::Tag.def())
                .filter(tag::Column::Slug.eq(slug.as_str()));
        }

        self.paginate(select.order_by_desc(post::Column::Publish), page)
            .await
    }

    async fn find_published(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let model = Self::published()
            .filter(post::Column::Id.eq(id))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        self.one_with_tags(model).await
    }

    async fn find_published_by_slug(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError> {
        let (start, end) = day_bounds(date);
        let model = Self::published()
            .filter(post::Column::Slug.eq(slug))
            .filter(post::Column::Publish.gte(start))
            .filter(post::Column::Publish.lt(end))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        self.one_with_tags(model).await
    }

    async fn similar_posts(&self, target: &Post) -> Result<Vec<SimilarPost>, RepoError> {
        let tag_ids = target.tag_ids();
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = Self::published()
            .select_only()
            .column(post::Column::Id)
            .column_as(
                Expr::col((post_tag::Entity, post_tag::Column::TagId)).count(),
                "same_tags",
            )
            .join(JoinType::InnerJoin, post::Relation::PostTag.def())
            .filter(post_tag::Column::TagId.is_in(tag_ids))
            .filter(post::Column::Id.ne(target.id))
            .group_by(post::Column::Id)
            .order_by_desc(Expr::cust("same_tags"))
            .order_by_desc(post::Column::Publish)
            .limit(SIMILAR_POSTS_LIMIT as u64)
            .into_model::<SimilarRow>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let models = PostEntity::find()
            .filter(post::Column::Id.is_in(ids))
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        let mut posts: HashMap<Uuid, Post> = self
            .with_tags(models)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                posts.remove(&row.id).map(|post| SimilarPost {
                    post,
                    same_tags: row.same_tags.max(0) as u64,
                })
            })
            .collect())
    }

    async fn slug_taken(
        &self,
        slug: &str,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        let (start, end) = day_bounds(date);
        let mut select = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .filter(post::Column::Publish.gte(start))
            .filter(post::Column::Publish.lt(end));
        if let Some(id) = exclude {
            select = select.filter(post::Column::Id.ne(id));
        }

        let count = select.count(self.db.as_ref()).await.map_err(map_db_err)?;
        Ok(count > 0)
    }

    async fn changelist(
        &self,
        query: &AdminPostQuery,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let now = Utc::now();
        let mut select = PostEntity::find();

        if let Some(status) = query.status {
            select = select.filter(post::Column::Status.eq(Status::from(status)));
        }
        if let Some(author_id) = query.author_id {
            select = select.filter(post::Column::AuthorId.eq(author_id));
        }
        if let Some(range) = query.created {
            let (start, end) = range.bounds(now);
            select = select
                .filter(post::Column::CreatedAt.gte(start))
                .filter(post::Column::CreatedAt.lt(end));
        }
        if let Some(range) = query.publish {
            let (start, end) = range.bounds(now);
            select = select
                .filter(post::Column::Publish.gte(start))
                .filter(post::Column::Publish.lt(end));
        }
        if let Some((start, end)) = query.publish_drilldown() {
            select = select
                .filter(post::Column::Publish.gte(start))
                .filter(post::Column::Publish.lt(end));
        }

        for term in query.search_terms() {
            let pattern = contains_pattern(&term);
            let title = Expr::expr(Func::lower(Expr::col(post::Column::Title)));
            let body = Expr::expr(Func::lower(Expr::col(post::Column::Body)));
            select = select.filter(
                Condition::any()
                    .add(title.like(pattern.clone()))
                    .add(body.like(pattern)),
            );
        }

        for key in POST_ADMIN.order_keys() {
            let column = match key.field {
                "status" => post::Column::Status,
                "publish" => post::Column::Publish,
                "created" => post::Column::CreatedAt,
                "title" => post::Column::Title,
                "slug" => post::Column::Slug,
                _ => continue,
            };
            let order = if key.descending { Order::Desc } else { Order::Asc };
            select = select.order_by(column, order);
        }

        self.paginate(select, page).await
    }
}
