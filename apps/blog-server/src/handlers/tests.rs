use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use blog_core::domain::{Comment, Post, PostStatus, User};
use blog_infra::InMemoryMailer;

use super::{RouteOptions, configure_routes};
use crate::state::AppState;

macro_rules! app {
    ($state:expr) => {
        app!($state, RouteOptions::default())
    };
    ($state:expr, $options:expr) => {{
        let options: RouteOptions = $options;
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(move |cfg| configure_routes(cfg, &options)),
        )
        .await
    }};
}

fn setup() -> (AppState, InMemoryMailer) {
    let mailer = InMemoryMailer::new();
    let state = AppState::in_memory(Arc::new(mailer.clone()));
    (state, mailer)
}

async fn create_post(
    state: &AppState,
    slug: &str,
    status: PostStatus,
    days_ago: i64,
    tags: &[&str],
) -> Post {
    let mut tag_list = Vec::new();
    for name in tags {
        tag_list.push(state.tags.get_or_create(name).await.unwrap());
    }

    let post = Post::new(
        Uuid::new_v4(),
        slug.replace('-', " "),
        slug.to_string(),
        "Some body text".into(),
    )
    .with_status(status)
    .published_at(Utc::now() - Duration::days(days_ago))
    .with_tags(tag_list);

    state.posts.insert(post).await.unwrap()
}

async fn publish(state: &AppState, slug: &str, days_ago: i64, tags: &[&str]) -> Post {
    create_post(state, slug, PostStatus::Published, days_ago, tags).await
}

async fn active_comments(state: &AppState, post: &Post) -> usize {
    state.comments.active_for_post(post.id).await.unwrap().len()
}

#[actix_web::test]
async fn test_health_check() {
    let (state, _) = setup();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}

#[actix_web::test]
async fn test_list_shows_only_published_posts() {
    let (state, _) = setup();
    publish(&state, "first", 3, &[]).await;
    publish(&state, "second", 2, &[]).await;
    create_post(&state, "hidden", PostStatus::Draft, 1, &[]).await;
    let app = app!(state);

    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request()).await;

    let slugs: Vec<&str> = body["posts"]["object_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, vec!["second", "first"]);
    assert_eq!(body["posts"]["count"], 2);
    assert!(body["tag"].is_null());
}

#[actix_web::test]
async fn test_list_page_clamping() {
    let (state, _) = setup();
    for (i, slug) in ["a", "b", "c", "d"].into_iter().enumerate() {
        publish(&state, slug, i as i64, &[]).await;
    }
    let app = app!(state);

    let cases = [
        ("/", 1),
        ("/?page=abc", 1),
        ("/?page=2", 2),
        ("/?page=9999", 2),
        ("/?page=0", 2),
        ("/?page=-3", 2),
    ];
    for (uri, expected) in cases {
        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri(uri).to_request())
                .await;
        assert_eq!(body["posts"]["number"], expected, "{uri}");
        assert_eq!(body["posts"]["num_pages"], 2, "{uri}");
    }

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/?page=9999").to_request(),
    )
    .await;
    assert_eq!(body["page"], "9999");
    assert_eq!(body["posts"]["object_list"].as_array().unwrap().len(), 1);
    assert_eq!(body["posts"]["has_next"], false);
    assert_eq!(body["posts"]["previous_page_number"], 1);
}

#[actix_web::test]
async fn test_empty_list_has_one_page() {
    let (state, _) = setup();
    let app = app!(state);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/?page=5").to_request(),
    )
    .await;
    assert_eq!(body["posts"]["number"], 1);
    assert_eq!(body["posts"]["num_pages"], 1);
    assert_eq!(body["posts"]["count"], 0);
}

#[actix_web::test]
async fn test_list_by_tag() {
    let (state, _) = setup();
    publish(&state, "tagged", 1, &["Rust"]).await;
    publish(&state, "untagged", 1, &["Go"]).await;
    create_post(&state, "draft", PostStatus::Draft, 1, &["Rust"]).await;
    let app = app!(state);

    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/tag/rust/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["tag"]["slug"], "rust");
    assert_eq!(body["posts"]["count"], 1);
    assert_eq!(body["posts"]["object_list"][0]["slug"], "tagged");
}

#[actix_web::test]
async fn test_unknown_tag_is_not_found() {
    let (state, _) = setup();
    let app = app!(state);

    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/tag/nope/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 404);
}

#[actix_web::test]
async fn test_tag_named_share_resolves_to_tag_listing() {
    let (state, _) = setup();
    publish(&state, "shared", 1, &["share"]).await;
    let app = app!(state);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/tag/share/").to_request(),
    )
    .await;
    assert_eq!(body["posts"]["count"], 1);
}

#[actix_web::test]
async fn test_post_detail_with_similar_posts() {
    let (state, _) = setup();
    let target = publish(&state, "target", 0, &["a", "b"]).await;
    publish(&state, "both", 3, &["a", "b"]).await;
    publish(&state, "one", 1, &["b"]).await;
    publish(&state, "none", 1, &["c"]).await;
    create_post(&state, "draft", PostStatus::Draft, 1, &["a", "b"]).await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri(&target.absolute_url()).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["post"]["slug"], "target");
    assert!(body["new_comment"].is_null());
    assert!(body["comment_form"]["errors"].as_object().unwrap().is_empty());

    let similar: Vec<(&str, u64)> = body["similar_posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| (s["slug"].as_str().unwrap(), s["same_tags"].as_u64().unwrap()))
        .collect();
    assert_eq!(similar, vec![("both", 2), ("one", 1)]);
}

#[actix_web::test]
async fn test_post_detail_not_found_cases() {
    let (state, _) = setup();
    let draft = create_post(&state, "draft", PostStatus::Draft, 0, &[]).await;
    let published = publish(&state, "live", 0, &[]).await;
    let app = app!(state);

    let wrong_day = published
        .publish
        .checked_sub_signed(Duration::days(1))
        .unwrap();
    let uris = [
        draft.absolute_url(),
        "/2024/2/30/live/".to_string(),
        "/abcd/1/1/live/".to_string(),
        format!(
            "/{}/live/",
            wrong_day.format("%Y/%-m/%-d")
        ),
    ];
    for uri in uris {
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[actix_web::test]
async fn test_valid_comment_is_saved_active() {
    let (state, _) = setup();
    let post = publish(&state, "hello", 0, &[]).await;
    let app = app!(state);
    let before = active_comments(&state, &post).await;

    let req = test::TestRequest::post()
        .uri(&post.absolute_url())
        .set_form([
            ("name", " Ann "),
            ("email", "ann@example.com"),
            ("body", "Great read"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["new_comment"]["name"], "Ann");
    assert_eq!(body["new_comment"]["active"], true);
    assert_eq!(body["comments"].as_array().unwrap().len(), before + 1);
    assert_eq!(active_comments(&state, &post).await, before + 1);
}

#[actix_web::test]
async fn test_comment_with_long_name_is_rejected() {
    let (state, _) = setup();
    let post = publish(&state, "hello", 0, &[]).await;
    let app = app!(state);
    let long_name = "x".repeat(90);

    let req = test::TestRequest::post()
        .uri(&post.absolute_url())
        .set_form([
            ("name", long_name.as_str()),
            ("email", "ann@example.com"),
            ("body", "Great read"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["new_comment"].is_null());
    assert_eq!(
        body["comment_form"]["errors"]["name"][0],
        "Ensure this value has at most 80 characters (it has 90)."
    );
    assert_eq!(body["comment_form"]["data"]["name"], long_name.as_str());
    assert_eq!(active_comments(&state, &post).await, 0);
}

#[actix_web::test]
async fn test_comment_on_draft_is_not_found() {
    let (state, _) = setup();
    let draft = create_post(&state, "draft", PostStatus::Draft, 0, &[]).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&draft.absolute_url())
        .set_form([("name", "Ann"), ("email", "ann@example.com"), ("body", "Hi")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(active_comments(&state, &draft).await, 0);
}

#[actix_web::test]
async fn test_share_form_get() {
    let (state, mailer) = setup();
    let post = publish(&state, "hello", 0, &[]).await;
    let app = app!(state);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/{}/share/", post.id))
            .to_request(),
    )
    .await;
    assert_eq!(body["sent"], false);
    assert_eq!(body["post"]["id"], post.id.to_string());
    assert!(mailer.sent().await.is_empty());
}

#[actix_web::test]
async fn test_share_sends_recommendation() {
    let (state, mailer) = setup();
    let post = publish(&state, "hello-world", 0, &[]).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/{}/share/", post.id))
        .set_form([
            ("name", "Ann"),
            ("to", "bob@example.com"),
            ("comments", "You will like it"),
        ])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["sent"], true);

    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["bob@example.com"]);
    assert_eq!(sent[0].from, state.mail_from);
    assert_eq!(sent[0].subject, "Ann recommends you read hello world");
    assert!(sent[0].body.starts_with("Read hello world at http"));
    assert!(sent[0].body.contains(&post.absolute_url()));
    assert!(sent[0].body.ends_with("\n\nAnn's comments: You will like it"));
}

#[actix_web::test]
async fn test_share_with_malformed_recipient_sends_nothing() {
    let (state, mailer) = setup();
    let post = publish(&state, "hello", 0, &[]).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/{}/share/", post.id))
        .set_form([("name", "Ann"), ("to", "bob at example"), ("comments", "")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sent"], false);
    assert_eq!(body["form"]["errors"]["to"][0], "Enter a valid email address.");
    assert!(mailer.sent().await.is_empty());
}

#[actix_web::test]
async fn test_share_unpublished_or_unknown_post_is_not_found() {
    let (state, _) = setup();
    let draft = create_post(&state, "draft", PostStatus::Draft, 0, &[]).await;
    let app = app!(state);

    for uri in [
        format!("/{}/share/", draft.id),
        format!("/{}/share/", Uuid::new_v4()),
        "/not-a-uuid/share/".to_string(),
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[cfg(feature = "rate-limit")]
#[actix_web::test]
async fn test_share_submissions_are_rate_limited() {
    use blog_infra::{InMemoryRateLimiter, RateLimitConfig};

    let (state, mailer) = setup();
    let post = publish(&state, "hello", 0, &[]).await;
    let limiter = InMemoryRateLimiter::new(RateLimitConfig {
        max_requests: 1,
        window: std::time::Duration::from_secs(60),
    })
    .unwrap();
    let app = app!(
        state,
        RouteOptions {
            share_limiter: Some(Arc::new(limiter)),
            ..Default::default()
        }
    );

    let uri = format!("/{}/share/", post.id);
    let submit = || {
        test::TestRequest::post()
            .uri(&uri)
            .set_form([("name", "Ann"), ("to", "bob@example.com"), ("comments", "")])
            .to_request()
    };

    let first = test::call_service(&app, submit()).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = test::call_service(&app, submit()).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));

    // Reads are not counted.
    let read = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(read.status(), StatusCode::OK);

    assert_eq!(mailer.sent().await.len(), 1);
}

#[actix_web::test]
async fn test_admin_is_not_mounted_by_default() {
    let (state, _) = setup();
    let app = app!(state);

    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/admin/posts/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

fn admin_options() -> RouteOptions {
    RouteOptions {
        admin_enabled: true,
        ..Default::default()
    }
}

#[actix_web::test]
async fn test_admin_create_post() {
    let (state, _) = setup();
    let author = state
        .users
        .insert(User::new("admin".into(), "admin@example.com".into()))
        .await
        .unwrap();
    let app = app!(state, admin_options());
    let author_id = author.id.to_string();

    let form = [
        ("title", "Hello Admin World"),
        ("slug", ""),
        ("author_id", author_id.as_str()),
        ("body", "Body"),
        ("status", "published"),
        ("tags", "rust, web"),
    ];

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/posts/")
            .set_form(form)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["slug"], "hello-admin-world");
    assert_eq!(body["data"]["status"], "published");

    let listing: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/tag/web/").to_request(),
    )
    .await;
    assert_eq!(listing["posts"]["count"], 1);

    // Same slug on the same day is a conflict.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/posts/")
            .set_form(form)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_admin_create_post_form_errors() {
    let (state, _) = setup();
    let app = app!(state, admin_options());
    let unknown_author = Uuid::new_v4().to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/posts/")
            .set_form([
                ("title", ""),
                ("author_id", unknown_author.as_str()),
                ("body", "Body"),
            ])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["title"][0], "This field is required.");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/posts/")
            .set_form([
                ("title", "Orphan"),
                ("author_id", unknown_author.as_str()),
                ("body", "Body"),
            ])
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["author_id"][0], "Select a valid author.");
    assert_eq!(body["prepopulated_fields"]["slug"][0], "title");
    assert_eq!(body["raw_id_fields"][0], "author");
}

#[actix_web::test]
async fn test_admin_rejects_unusable_slug_and_long_tags() {
    let (state, _) = setup();
    let author = state
        .users
        .insert(User::new("admin".into(), "admin@example.com".into()))
        .await
        .unwrap();
    let app = app!(state, admin_options());
    let author_id = author.id.to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/posts/")
            .set_form([
                ("title", "日本語"),
                ("slug", ""),
                ("author_id", author_id.as_str()),
                ("body", "Body"),
            ])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["slug"][0], "This field is required.");

    let tags = format!("rust, {}", "t".repeat(150));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/posts/")
            .set_form([
                ("title", "Long tags"),
                ("author_id", author_id.as_str()),
                ("body", "Body"),
                ("tags", tags.as_str()),
            ])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["tags"].is_array());

    // Nothing was persisted for either submission.
    assert!(state.tags.find_by_slug("rust").await.unwrap().is_none());
    let changelist: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/admin/posts/").to_request(),
    )
    .await;
    assert_eq!(changelist["results"]["count"], 0);
}

#[actix_web::test]
async fn test_admin_changelist_filters_and_search() {
    let (state, _) = setup();
    publish(&state, "rust-ownership", 2, &[]).await;
    publish(&state, "go-channels", 1, &[]).await;
    create_post(&state, "rust-draft", PostStatus::Draft, 0, &[]).await;
    let app = app!(state, admin_options());

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/admin/posts/").to_request(),
    )
    .await;
    assert_eq!(body["results"]["count"], 3);
    assert_eq!(body["date_hierarchy"], "publish");
    // Ordered by status then publish: draft < published.
    assert_eq!(body["results"]["object_list"][0]["slug"], "rust-draft");
    assert_eq!(body["results"]["object_list"][1]["slug"], "rust-ownership");

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/admin/posts/?q=RUST&status=published")
            .to_request(),
    )
    .await;
    assert_eq!(body["results"]["count"], 1);
    assert_eq!(body["results"]["object_list"][0]["slug"], "rust-ownership");
}

#[actix_web::test]
async fn test_admin_comment_moderation() {
    let (state, _) = setup();
    let post = publish(&state, "hello", 0, &[]).await;
    let comment = state
        .comments
        .insert(Comment::new(
            post.id,
            "Ann".into(),
            "ann@example.com".into(),
            "Spam".into(),
        ))
        .await
        .unwrap();
    let app = app!(state, admin_options());

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/admin/comments/{}/active/", comment.id))
            .set_form([("active", "false")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["active"], false);
    assert_eq!(active_comments(&state, &post).await, 0);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/admin/comments/{}/active/", Uuid::new_v4()))
            .set_form([("active", "true")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
