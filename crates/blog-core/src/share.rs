//! Composition of the "recommend this post" email.

use crate::domain::Post;
use crate::forms::EmailPostForm;
use crate::ports::EmailMessage;

/// Build the recommendation message for `post`.
///
/// `post_url` is the absolute URL of the post; `from` is the configured
/// sender address.
pub fn recommendation(post: &Post, post_url: &str, form: &EmailPostForm, from: &str) -> EmailMessage {
    let subject = format!("{} recommends you read {}", form.name, post.title);
    let body = format!(
        "Read {} at {}\n\n{}'s comments: {}",
        post.title, post_url, form.name, form.comments
    );

    EmailMessage {
        from: from.to_string(),
        to: vec![form.to.clone()],
        subject,
        body,
    }
}
