//! Admin endpoints: post changelist, post creation and comment moderation.
//!
//! Mounted only when `BLOG_ADMIN_ENABLED` is set; there is no
//! authentication in front of them.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use blog_core::admin::{AdminPostQuery, CHANGELIST_PAGE_SIZE, POST_ADMIN, PostForm};
use blog_core::forms::{FormData, FormErrors};
use blog_core::pagination::{PageRequest, PageToken};
use blog_shared::ApiResponse;
use blog_shared::dto::{AdminChangelistContext, AdminPostFormContext, CommentActiveForm};

use super::views;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Changelist page parameter (`?p=`), kept apart from the filters.
#[derive(Debug, Deserialize)]
pub struct ChangelistPage {
    pub p: Option<String>,
}

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(ToString::to_string).collect()
}

/// The post form redisplayed with its errors.
fn invalid_form(errors: FormErrors) -> HttpResponse {
    HttpResponse::Ok().json(AdminPostFormContext {
        prepopulated_fields: POST_ADMIN
            .prepopulated_fields
            .iter()
            .map(|(target, sources)| (target.to_string(), names(sources)))
            .collect(),
        raw_id_fields: names(POST_ADMIN.raw_id_fields),
        errors: errors.0,
    })
}

/// GET /admin/posts/
pub async fn changelist(
    state: web::Data<AppState>,
    query: web::Query<AdminPostQuery>,
    page: web::Query<ChangelistPage>,
) -> AppResult<HttpResponse> {
    let request =
        PageRequest::new(PageToken::parse(page.p.as_deref())).with_size(CHANGELIST_PAGE_SIZE);
    let posts = state.posts.changelist(&query, request).await?;

    Ok(HttpResponse::Ok().json(AdminChangelistContext {
        list_display: names(POST_ADMIN.list_display),
        list_filter: names(POST_ADMIN.list_filter),
        search_fields: names(POST_ADMIN.search_fields),
        date_hierarchy: POST_ADMIN.date_hierarchy.map(str::to_string),
        results: views::page_view(posts, |p| views::admin_row(&p)),
    }))
}

/// POST /admin/posts/
pub async fn create_post(
    state: web::Data<AppState>,
    form: web::Form<PostForm>,
) -> AppResult<HttpResponse> {
    let cleaned = match form.into_inner().validated() {
        Ok(cleaned) => cleaned,
        Err(errors) => return Ok(invalid_form(errors)),
    };

    if state.users.find_by_id(cleaned.author_id).await?.is_none() {
        let mut errors = FormErrors::default();
        errors.add("author_id", "Select a valid author.");
        return Ok(invalid_form(errors));
    }

    let tag_names = cleaned.tag_names();
    let post = cleaned.into_post();

    if state
        .posts
        .slug_taken(&post.slug, post.publish_date(), None)
        .await?
    {
        return Err(AppError::Conflict(format!(
            "A post with slug '{}' is already published on {}",
            post.slug,
            post.publish_date()
        )));
    }

    let mut tags = Vec::with_capacity(tag_names.len());
    for name in &tag_names {
        tags.push(state.tags.get_or_create(name).await?);
    }

    let post = state.posts.insert(post.with_tags(tags)).await?;
    tracing::info!(post_id = %post.id, slug = %post.slug, "Post created via admin");

    Ok(HttpResponse::Created().json(ApiResponse::ok(views::admin_row(&post))))
}

/// POST /admin/comments/{id}/active/
pub async fn set_comment_active(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    form: web::Form<CommentActiveForm>,
) -> AppResult<HttpResponse> {
    let comment = state
        .comments
        .set_active(path.into_inner(), form.active)
        .await?;

    let message = if comment.active {
        "Comment is now visible"
    } else {
        "Comment is now hidden"
    };
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        views::comment_view(&comment),
        message,
    )))
}
