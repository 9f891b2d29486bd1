//! Mapping of domain values onto the response contexts.

use blog_core::domain::{Comment, Post, Tag};
use blog_core::forms::{CommentForm, EmailPostForm, FormErrors};
use blog_core::pagination::Page;
use blog_core::query::SimilarPost;
use blog_shared::dto::{
    AdminPostRow, CommentFormData, CommentView, EmailFormData, FormView, PageView, PostView,
    SimilarPostView, TagView,
};

pub fn tag_url(slug: &str) -> String {
    format!("/tag/{slug}/")
}

pub fn share_url(post: &Post) -> String {
    format!("/{}/share/", post.id)
}

pub fn tag_view(tag: &Tag) -> TagView {
    TagView {
        name: tag.name.clone(),
        slug: tag.slug.clone(),
        url: tag_url(&tag.slug),
    }
}

pub fn post_view(post: &Post) -> PostView {
    PostView {
        id: post.id,
        title: post.title.clone(),
        slug: post.slug.clone(),
        author_id: post.author_id,
        body: post.body.clone(),
        publish: post.publish,
        status: post.status.to_string(),
        tags: post.tags.iter().map(tag_view).collect(),
        url: post.absolute_url(),
        share_url: share_url(post),
    }
}

pub fn similar_view(similar: &SimilarPost) -> SimilarPostView {
    SimilarPostView {
        post: post_view(&similar.post),
        same_tags: similar.same_tags,
    }
}

pub fn comment_view(comment: &Comment) -> CommentView {
    CommentView {
        id: comment.id,
        name: comment.name.clone(),
        body: comment.body.clone(),
        created: comment.created_at,
        active: comment.active,
    }
}

pub fn admin_row(post: &Post) -> AdminPostRow {
    AdminPostRow {
        id: post.id,
        title: post.title.clone(),
        slug: post.slug.clone(),
        author: post.author_id,
        publish: post.publish,
        status: post.status.to_string(),
    }
}

pub fn page_view<T, V>(page: Page<T>, f: impl FnMut(T) -> V) -> PageView<V> {
    let has_next = page.has_next();
    let has_previous = page.has_previous();
    let number = page.number;
    let page = page.map(f);

    PageView {
        object_list: page.items,
        number,
        num_pages: page.num_pages,
        count: page.count,
        has_next,
        has_previous,
        next_page_number: has_next.then(|| number + 1),
        previous_page_number: has_previous.then(|| number - 1),
    }
}

pub fn comment_form(form: &CommentForm, errors: FormErrors) -> FormView<CommentFormData> {
    FormView {
        data: CommentFormData {
            name: form.name.clone(),
            email: form.email.clone(),
            body: form.body.clone(),
        },
        errors: errors.0,
    }
}

pub fn email_form(form: &EmailPostForm, errors: FormErrors) -> FormView<EmailFormData> {
    FormView {
        data: EmailFormData {
            name: form.name.clone(),
            to: form.to.clone(),
            comments: form.comments.clone(),
        },
        errors: errors.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_core::pagination::{PageRequest, PageToken};

    #[test]
    fn test_page_view_neighbours() {
        let request = PageRequest::new(PageToken::Number(2));
        let view = page_view(Page::from_items((1..=7).collect(), request), |n: i32| n * 10);

        assert_eq!(view.object_list, vec![40, 50, 60]);
        assert_eq!(view.num_pages, 3);
        assert_eq!(view.next_page_number, Some(3));
        assert_eq!(view.previous_page_number, Some(1));
    }

    #[test]
    fn test_single_page_has_no_neighbours() {
        let view = page_view(
            Page::from_items(Vec::<i32>::new(), PageRequest::new(PageToken::First)),
            |n| n,
        );
        assert_eq!(view.num_pages, 1);
        assert!(!view.has_next && !view.has_previous);
        assert!(view.next_page_number.is_none());
    }
}
