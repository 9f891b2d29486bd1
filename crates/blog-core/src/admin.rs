//! Declarative admin configuration for posts and the queries it drives.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::{Post, PostStatus};
use crate::forms::{FormData, required};
use crate::slug::{is_slug, slugify};

/// Changelist page size.
pub const CHANGELIST_PAGE_SIZE: u64 = 100;

/// Longest accepted tag name.
pub const MAX_TAG_NAME_LEN: usize = 100;

/// How a model is presented and queried by the admin.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelAdmin {
    pub list_display: &'static [&'static str],
    pub list_filter: &'static [&'static str],
    pub search_fields: &'static [&'static str],
    /// `(target field, source fields)` filled in from the source when blank.
    pub prepopulated_fields: &'static [(&'static str, &'static [&'static str])],
    pub raw_id_fields: &'static [&'static str],
    pub date_hierarchy: Option<&'static str>,
    /// Changelist sort keys; a leading `-` sorts that key descending.
    pub ordering: &'static [&'static str],
}

/// One parsed `ordering` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderKey {
    pub field: &'static str,
    pub descending: bool,
}

impl ModelAdmin {
    pub fn order_keys(&self) -> impl Iterator<Item = OrderKey> {
        self.ordering.iter().map(|&entry| match entry.strip_prefix('-') {
            Some(field) => OrderKey {
                field,
                descending: true,
            },
            None => OrderKey {
                field: entry,
                descending: false,
            },
        })
    }
}

pub const POST_ADMIN: ModelAdmin = ModelAdmin {
    list_display: &["title", "slug", "author", "publish", "status"],
    list_filter: &["status", "created", "publish", "author"],
    search_fields: &["title", "body"],
    prepopulated_fields: &[("slug", &["title"])],
    raw_id_fields: &["author"],
    date_hierarchy: Some("publish"),
    ordering: &["status", "publish"],
};

/// Date range choices offered for `created` and `publish` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    Today,
    PastSevenDays,
    ThisMonth,
    ThisYear,
}

impl DateRange {
    /// Half-open `[start, end)` interval relative to `now`.
    pub fn bounds(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let today = now.date_naive();
        let tomorrow = today + Duration::days(1);
        let (start, end) = match self {
            DateRange::Today => (today, tomorrow),
            DateRange::PastSevenDays => (today - Duration::days(7), tomorrow),
            DateRange::ThisMonth => {
                let first = today.with_day(1).unwrap_or(today);
                (first, next_month(first))
            }
            DateRange::ThisYear => {
                let first = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                let next = NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap_or(tomorrow);
                (first, next)
            }
        };
        (midnight(start), midnight(end))
    }
}

fn next_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(first)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Half-open UTC interval covering one calendar date.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (midnight(date), midnight(date + Duration::days(1)))
}

/// Changelist query: filters, search and date drill-down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdminPostQuery {
    #[serde(default, rename = "q")]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default, rename = "author")]
    pub author_id: Option<Uuid>,
    #[serde(default)]
    pub created: Option<DateRange>,
    #[serde(default)]
    pub publish: Option<DateRange>,
    #[serde(default)]
    pub publish_year: Option<i32>,
    #[serde(default)]
    pub publish_month: Option<u32>,
    #[serde(default)]
    pub publish_day: Option<u32>,
}

impl AdminPostQuery {
    /// Lowercased whitespace-separated search terms.
    pub fn search_terms(&self) -> Vec<String> {
        self.search
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }

    /// `[start, end)` selected by the publish date hierarchy, if any.
    ///
    /// Month is ignored without a year and day without a month. An
    /// impossible date yields an empty interval.
    pub fn publish_drilldown(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let year = self.publish_year?;
        let empty = Some((DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::UNIX_EPOCH));

        let Some(month) = self.publish_month else {
            let (Some(start), Some(end)) = (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year + 1, 1, 1),
            ) else {
                return empty;
            };
            return Some((midnight(start), midnight(end)));
        };

        let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return empty;
        };
        match self.publish_day {
            None => Some((midnight(first), midnight(next_month(first)))),
            Some(day) => match NaiveDate::from_ymd_opt(year, month, day) {
                Some(date) => Some(day_bounds(date)),
                None => empty,
            },
        }
    }

    /// In-process evaluation of the query against one post.
    pub fn matches(&self, post: &Post, now: DateTime<Utc>) -> bool {
        if self.status.is_some_and(|s| s != post.status) {
            return false;
        }
        if self.author_id.is_some_and(|a| a != post.author_id) {
            return false;
        }
        if let Some(range) = self.created {
            let (start, end) = range.bounds(now);
            if post.created_at < start || post.created_at >= end {
                return false;
            }
        }
        if let Some(range) = self.publish {
            let (start, end) = range.bounds(now);
            if post.publish < start || post.publish >= end {
                return false;
            }
        }
        if let Some((start, end)) = self.publish_drilldown() {
            if post.publish < start || post.publish >= end {
                return false;
            }
        }

        let title = post.title.to_lowercase();
        let body = post.body.to_lowercase();
        self.search_terms()
            .iter()
            .all(|term| title.contains(term.as_str()) || body.contains(term.as_str()))
    }
}

/// Changelist ordering, following `POST_ADMIN.ordering`. Unknown keys
/// compare equal.
pub fn changelist_order(a: &Post, b: &Post) -> Ordering {
    POST_ADMIN
        .order_keys()
        .map(|key| {
            let order = match key.field {
                "status" => a.status.as_str().cmp(b.status.as_str()),
                "publish" => a.publish.cmp(&b.publish),
                "created" => a.created_at.cmp(&b.created_at),
                "title" => a.title.cmp(&b.title),
                "slug" => a.slug.cmp(&b.slug),
                _ => Ordering::Equal,
            };
            if key.descending { order.reverse() } else { order }
        })
        .fold(Ordering::Equal, Ordering::then)
}

// Runs after `clean`, so an empty slug means the title had nothing to slugify.
fn slug_format(value: &str) -> Result<(), ValidationError> {
    required(value)?;
    if is_slug(value) {
        return Ok(());
    }
    Err(ValidationError::new("slug").with_message(
        "Enter a valid slug consisting of letters, numbers, underscores or hyphens.".into(),
    ))
}

fn tag_name_lengths(value: &str) -> Result<(), ValidationError> {
    match split_tag_names(value)
        .iter()
        .find(|name| name.chars().count() > MAX_TAG_NAME_LEN)
    {
        Some(name) => Err(ValidationError::new("tags").with_message(
            format!(
                "Ensure each tag has at most {MAX_TAG_NAME_LEN} characters (\"{}…\" has {}).",
                name.chars().take(20).collect::<String>(),
                name.chars().count()
            )
            .into(),
        )),
        None => Ok(()),
    }
}

/// Comma- or space-separated tag names in submission order, without
/// duplicates or names that have no usable slug.
fn split_tag_names(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = if raw.contains(',') {
        raw.split(',').collect()
    } else {
        raw.split_whitespace().collect()
    };

    let mut names: Vec<String> = Vec::new();
    for name in parts.into_iter().map(|p| p.trim().trim_matches('"').trim()) {
        if !slugify(name).is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Post creation form used by the admin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct PostForm {
    #[serde(default)]
    #[validate(custom(function = "required"), length(max = 250))]
    pub title: String,
    /// Prepopulated from the title when left blank.
    #[serde(default)]
    #[validate(custom(function = "slug_format"), length(max = 250))]
    pub slug: String,
    pub author_id: Uuid,
    #[serde(default)]
    #[validate(custom(function = "required"))]
    pub body: String,
    #[serde(default)]
    pub publish: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: PostStatus,
    /// Comma- or space-separated tag names.
    #[serde(default)]
    #[validate(custom(function = "tag_name_lengths"))]
    pub tags: String,
}

impl FormData for PostForm {
    fn clean(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.slug = self.slug.trim().to_string();
        self.body = self.body.trim().to_string();
        if self.slug.is_empty() {
            self.slug = slugify(&self.title);
        }
        self
    }
}

impl PostForm {
    /// Tag names in submission order, without duplicates or names that
    /// have no usable slug.
    pub fn tag_names(&self) -> Vec<String> {
        split_tag_names(&self.tags)
    }

    /// The post this (validated) form describes, without tags.
    pub fn into_post(self) -> Post {
        let mut post = Post::new(self.author_id, self.title, self.slug, self.body)
            .with_status(self.status);
        if let Some(publish) = self.publish {
            post = post.published_at(publish);
        }
        post
    }
}
