//! Data Transfer Objects - the contexts handed to the renderer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagView {
    pub name: String,
    pub slug: String,
    pub url: String,
}

/// A post as shown in lists and on its own page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub author_id: Uuid,
    pub body: String,
    pub publish: DateTime<Utc>,
    pub status: String,
    pub tags: Vec<TagView>,
    /// Canonical path of the post.
    pub url: String,
    pub share_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarPostView {
    #[serde(flatten)]
    pub post: PostView,
    pub same_tags: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub name: String,
    pub body: String,
    pub created: DateTime<Utc>,
    pub active: bool,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView<T> {
    pub object_list: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page_number: Option<u64>,
}

/// Submitted (or blank) form data plus field-level errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormView<T> {
    pub data: T,
    pub errors: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentFormData {
    pub name: String,
    pub email: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailFormData {
    pub name: String,
    pub to: String,
    pub comments: String,
}

/// GET / and GET /tag/{slug}/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListContext {
    /// The raw `?page=` token as received.
    pub page: Option<String>,
    pub posts: PageView<PostView>,
    pub tag: Option<TagView>,
}

/// GET/POST /{year}/{month}/{day}/{slug}/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetailContext {
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub new_comment: Option<CommentView>,
    pub comment_form: FormView<CommentFormData>,
    pub similar_posts: Vec<SimilarPostView>,
}

/// GET/POST /{post_id}/share/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostShareContext {
    pub post: PostView,
    pub form: FormView<EmailFormData>,
    pub sent: bool,
}

/// Admin changelist row, restricted to the configured list columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminPostRow {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub author: Uuid,
    pub publish: DateTime<Utc>,
    pub status: String,
}

/// GET /admin/posts/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminChangelistContext {
    pub list_display: Vec<String>,
    pub list_filter: Vec<String>,
    pub search_fields: Vec<String>,
    pub date_hierarchy: Option<String>,
    pub results: PageView<AdminPostRow>,
}

/// POST /admin/posts/ with invalid input: the form layout and its errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminPostFormContext {
    /// Target field -> fields it is filled in from when left blank.
    pub prepopulated_fields: BTreeMap<String, Vec<String>>,
    /// Foreign keys entered as raw ids.
    pub raw_id_fields: Vec<String>,
    pub errors: BTreeMap<String, Vec<String>>,
}

/// POST /admin/comments/{id}/active/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentActiveForm {
    pub active: bool,
}
