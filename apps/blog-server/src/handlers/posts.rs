//! Post list and detail handlers.

use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;

use blog_core::DomainError;
use blog_core::domain::{Post, Tag};
use blog_core::forms::{CommentForm, FormData, FormErrors};
use blog_core::pagination::{PageRequest, PageToken};
use blog_core::query::PostFilter;
use blog_shared::dto::{
    CommentFormData, CommentView, FormView, PostDetailContext, PostListContext,
};

use super::views;
use crate::middleware::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
}

/// `/{year}/{month}/{day}/{slug}/`
#[derive(Debug, Deserialize)]
pub struct PostPath {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub slug: String,
}

async fn render_list(
    state: &AppState,
    tag: Option<Tag>,
    page: Option<String>,
) -> AppResult<HttpResponse> {
    let filter = match &tag {
        Some(tag) => PostFilter::tagged(tag.slug.clone()),
        None => PostFilter::default(),
    };
    let request = PageRequest::new(PageToken::parse(page.as_deref()));

    let posts = state.posts.fetch_published(&filter, request).await?;

    Ok(HttpResponse::Ok().json(PostListContext {
        page,
        posts: views::page_view(posts, |p| views::post_view(&p)),
        tag: tag.as_ref().map(views::tag_view),
    }))
}

/// GET /
pub async fn post_list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    render_list(&state, None, query.into_inner().page).await
}

/// GET /tag/{tag_slug}/
pub async fn post_list_by_tag(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let slug = path.into_inner();
    let tag = state
        .tags
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| DomainError::not_found("Tag", &slug))?;

    render_list(&state, Some(tag), query.into_inner().page).await
}

async fn load_post(state: &AppState, path: &PostPath) -> AppResult<Post> {
    let not_found = || DomainError::not_found("Post", &path.slug);

    let date = NaiveDate::from_ymd_opt(path.year, path.month, path.day).ok_or_else(not_found)?;
    let post = state
        .posts
        .find_published_by_slug(date, &path.slug)
        .await?
        .ok_or_else(not_found)?;

    Ok(post)
}

async fn render_detail(
    state: &AppState,
    post: &Post,
    new_comment: Option<CommentView>,
    comment_form: FormView<CommentFormData>,
) -> AppResult<HttpResponse> {
    let comments = state.comments.active_for_post(post.id).await?;
    let similar = state.posts.similar_posts(post).await?;

    Ok(HttpResponse::Ok().json(PostDetailContext {
        post: views::post_view(post),
        comments: comments.iter().map(views::comment_view).collect(),
        new_comment,
        comment_form,
        similar_posts: similar.iter().map(views::similar_view).collect(),
    }))
}

/// GET /{year}/{month}/{day}/{slug}/
pub async fn post_detail(
    state: web::Data<AppState>,
    path: web::Path<PostPath>,
) -> AppResult<HttpResponse> {
    let post = load_post(&state, &path).await?;
    let blank = views::comment_form(&CommentForm::default(), FormErrors::default());

    render_detail(&state, &post, None, blank).await
}

/// POST /{year}/{month}/{day}/{slug}/
///
/// Invalid submissions re-render the page with field errors and 200.
pub async fn post_comment(
    state: web::Data<AppState>,
    path: web::Path<PostPath>,
    form: web::Form<CommentForm>,
) -> AppResult<HttpResponse> {
    let post = load_post(&state, &path).await?;
    let submitted = form.into_inner();

    match submitted.clone().validated() {
        Ok(cleaned) => {
            let comment = state.comments.insert(cleaned.into_comment(post.id)).await?;
            tracing::info!(post_id = %post.id, comment_id = %comment.id, "Comment added");

            let blank = views::comment_form(&CommentForm::default(), FormErrors::default());
            render_detail(&state, &post, Some(views::comment_view(&comment)), blank).await
        }
        Err(errors) => {
            let fields: Vec<&String> = errors.0.keys().collect();
            tracing::debug!(post_id = %post.id, ?fields, "Comment rejected");
            let form = views::comment_form(&submitted, errors);
            render_detail(&state, &post, None, form).await
        }
    }
}
