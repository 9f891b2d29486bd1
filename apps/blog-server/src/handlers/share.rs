//! Share-by-email handlers.

use actix_web::{HttpRequest, HttpResponse, web};
use uuid::Uuid;

use blog_core::DomainError;
use blog_core::domain::Post;
use blog_core::forms::{EmailPostForm, FormData, FormErrors};
use blog_core::share::recommendation;
use blog_infra::mail::mask_email;
use blog_shared::dto::PostShareContext;

use super::views;
use crate::middleware::error::AppResult;
use crate::state::AppState;

async fn load_post(state: &AppState, post_id: Uuid) -> AppResult<Post> {
    let post = state
        .posts
        .find_published(post_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Post", post_id))?;
    Ok(post)
}

/// Absolute URL of the post, from the request's scheme and host.
fn absolute_post_url(req: &HttpRequest, post: &Post) -> String {
    let info = req.connection_info();
    format!("{}://{}{}", info.scheme(), info.host(), post.absolute_url())
}

/// GET /{post_id}/share/
pub async fn share_form(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post = load_post(&state, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(PostShareContext {
        post: views::post_view(&post),
        form: views::email_form(&EmailPostForm::default(), FormErrors::default()),
        sent: false,
    }))
}

/// POST /{post_id}/share/
///
/// A valid form dispatches one email and reports `sent = true`; an invalid
/// one dispatches nothing and re-renders with field errors.
pub async fn share_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    form: web::Form<EmailPostForm>,
) -> AppResult<HttpResponse> {
    let post = load_post(&state, path.into_inner()).await?;
    let submitted = form.into_inner();

    let (form, sent) = match submitted.clone().validated() {
        Ok(cleaned) => {
            let url = absolute_post_url(&req, &post);
            let message = recommendation(&post, &url, &cleaned, &state.mail_from);
            state.mailer.send(message).await?;

            tracing::info!(post_id = %post.id, to = %mask_email(&cleaned.to), "Post shared");
            (views::email_form(&cleaned, FormErrors::default()), true)
        }
        Err(errors) => (views::email_form(&submitted, errors), false),
    };

    Ok(HttpResponse::Ok().json(PostShareContext {
        post: views::post_view(&post),
        form,
        sent,
    }))
}
