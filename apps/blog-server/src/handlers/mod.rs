//! HTTP handlers and route configuration.

mod admin;
mod health;
mod posts;
mod share;
mod views;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use actix_web::web;
use blog_core::ports::RateLimiter;

use crate::middleware::rate_limit::RateLimitMiddleware;

/// Route-level options decided at startup.
#[derive(Clone, Default)]
pub struct RouteOptions {
    /// Limiter applied to share submissions.
    pub share_limiter: Option<Arc<dyn RateLimiter>>,
    /// Mount the `/admin/` endpoints.
    pub admin_enabled: bool,
    /// Key the share limiter on forwarded client addresses.
    pub trust_proxy_headers: bool,
}

/// Configure all application routes.
///
/// `/tag/{tag_slug}/` is registered before `/{post_id}/share/` so that a
/// tag named "share" still resolves to its listing.
pub fn configure_routes(cfg: &mut web::ServiceConfig, options: &RouteOptions) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/", web::get().to(posts::post_list))
        .route("/tag/{tag_slug}/", web::get().to(posts::post_list_by_tag));

    if options.admin_enabled {
        cfg.service(
            web::scope("/admin")
                .service(
                    web::resource("/posts/")
                        .route(web::get().to(admin::changelist))
                        .route(web::post().to(admin::create_post)),
                )
                .route(
                    "/comments/{id}/active/",
                    web::post().to(admin::set_comment_active),
                ),
        );
    }

    cfg.service(
        web::resource("/{post_id}/share/")
            .wrap(
                RateLimitMiddleware::new(options.share_limiter.clone())
                    .trust_proxy_headers(options.trust_proxy_headers),
            )
            .route(web::get().to(share::share_form))
            .route(web::post().to(share::share_post)),
    )
    .service(
        web::resource("/{year}/{month}/{day}/{slug}/")
            .route(web::get().to(posts::post_detail))
            .route(web::post().to(posts::post_comment)),
    );
}
