//! Query contracts for reading posts.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::Post;

/// Maximum number of similar posts returned for a post.
pub const SIMILAR_POSTS_LIMIT: usize = 4;

/// Restrictions applied on top of the published-post query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Only posts carrying the tag with this slug.
    pub tag: Option<String>,
}

impl PostFilter {
    pub fn tagged(slug: impl Into<String>) -> Self {
        Self {
            tag: Some(slug.into()),
        }
    }

    /// Whether `post` satisfies the filter (status is checked separately).
    pub fn matches(&self, post: &Post) -> bool {
        match &self.tag {
            Some(slug) => post.tags.iter().any(|t| &t.slug == slug),
            None => true,
        }
    }
}

/// A post ranked by how many tags it shares with another post.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarPost {
    #[serde(flatten)]
    pub post: Post,
    pub same_tags: u64,
}

/// Rank `candidates` by tags shared with `target`.
///
/// Drops the target itself, unpublished posts and posts sharing no tag;
/// orders by shared-tag count then publish time, both descending, and
/// keeps at most [`SIMILAR_POSTS_LIMIT`].
pub fn rank_similar<I>(target: &Post, candidates: I) -> Vec<SimilarPost>
where
    I: IntoIterator<Item = Post>,
{
    let target_tags: HashSet<Uuid> = target.tags.iter().map(|t| t.id).collect();
    if target_tags.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<SimilarPost> = candidates
        .into_iter()
        .filter(|p| p.id != target.id && p.is_published())
        .filter_map(|post| {
            let same_tags = post
                .tags
                .iter()
                .filter(|t| target_tags.contains(&t.id))
                .count() as u64;
            (same_tags > 0).then_some(SimilarPost { post, same_tags })
        })
        .collect();

    ranked.sort_by_key(|s| (Reverse(s.same_tags), Reverse(s.post.publish)));
    ranked.truncate(SIMILAR_POSTS_LIMIT);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PostStatus, Tag};
    use chrono::{Duration, Utc};

    fn post(tags: &[&Tag], days_ago: i64, status: PostStatus) -> Post {
        Post::new(Uuid::new_v4(), "T".into(), "t".into(), String::new())
            .with_status(status)
            .published_at(Utc::now() - Duration::days(days_ago))
            .with_tags(tags.iter().map(|t| (*t).clone()).collect())
    }

    #[test]
    fn test_ranking_orders_by_shared_tags_then_recency() {
        let (a, b, c) = (Tag::new("a"), Tag::new("b"), Tag::new("c"));
        let target = post(&[&a, &b, &c], 0, PostStatus::Published);

        let one_old = post(&[&a], 10, PostStatus::Published);
        let one_new = post(&[&b], 1, PostStatus::Published);
        let three = post(&[&a, &b, &c], 20, PostStatus::Published);
        let two = post(&[&a, &c], 5, PostStatus::Published);
        let one_mid = post(&[&c], 3, PostStatus::Published);

        let ranked = rank_similar(
            &target,
            vec![
                one_old.clone(),
                one_new.clone(),
                three.clone(),
                two.clone(),
                one_mid.clone(),
                target.clone(),
            ],
        );

        let ids: Vec<Uuid> = ranked.iter().map(|s| s.post.id).collect();
        assert_eq!(ids, vec![three.id, two.id, one_new.id, one_mid.id]);
        assert_eq!(
            ranked.iter().map(|s| s.same_tags).collect::<Vec<_>>(),
            vec![3, 2, 1, 1]
        );
    }

    #[test]
    fn test_ranking_skips_unrelated_and_drafts() {
        let (a, b) = (Tag::new("a"), Tag::new("b"));
        let target = post(&[&a], 0, PostStatus::Published);
        let draft = post(&[&a], 1, PostStatus::Draft);
        let unrelated = post(&[&b], 1, PostStatus::Published);

        assert!(rank_similar(&target, vec![draft, unrelated]).is_empty());
    }

    #[test]
    fn test_untagged_target_has_no_similar_posts() {
        let a = Tag::new("a");
        let target = post(&[], 0, PostStatus::Published);
        let other = post(&[&a], 1, PostStatus::Published);
        assert!(rank_similar(&target, vec![other]).is_empty());
    }

    #[test]
    fn test_filter_by_tag_slug() {
        let a = Tag::new("Rust Lang");
        let tagged = post(&[&a], 0, PostStatus::Published);
        let untagged = post(&[], 0, PostStatus::Published);
        let filter = PostFilter::tagged("rust-lang");
        assert!(filter.matches(&tagged));
        assert!(!filter.matches(&untagged));
        assert!(PostFilter::default().matches(&untagged));
    }
}
