//! Rate limiting middleware.
//!
//! Only unsafe methods (POST) are counted; reads pass straight through.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::Method,
};
use blog_shared::ErrorResponse;
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use blog_core::ports::RateLimiter;

/// Rate limiting middleware factory. A `None` limiter disables limiting.
pub struct RateLimitMiddleware {
    limiter: Option<Arc<dyn RateLimiter>>,
    trust_proxy_headers: bool,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Option<Arc<dyn RateLimiter>>) -> Self {
        Self {
            limiter,
            trust_proxy_headers: false,
        }
    }

    /// Key clients on `Forwarded` / `X-Forwarded-For` instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trust_proxy_headers: self.trust_proxy_headers,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Option<Arc<dyn RateLimiter>>,
    trust_proxy_headers: bool,
}

/// Client identifier for limiting.
fn client_key(req: &ServiceRequest, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr.to_string();
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Whole seconds, rounded up, never below one.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let limiter = match &self.limiter {
            Some(limiter) if req.method() == Method::POST => limiter.clone(),
            _ => {
                let fut = self.service.call(req);
                return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
            }
        };

        let service = self.service.clone();

        let key = client_key(&req, self.trust_proxy_headers);

        Box::pin(async move {
            match limiter.check(&key).await {
                Ok(result) if !result.allowed => {
                    let retry_after = retry_after_secs(result.reset_after);
                    tracing::warn!(key = %key, retry_after, "Rate limit exceeded");

                    let response = HttpResponse::TooManyRequests()
                        .insert_header(("Retry-After", retry_after.to_string()))
                        .json(ErrorResponse::too_many_requests(retry_after));

                    let (http_req, _payload) = req.into_parts();
                    return Ok(ServiceResponse::new(http_req, response).map_into_right_body());
                }
                Ok(_) => {}
                // Fail open.
                Err(e) => tracing::error!(error = %e, "Rate limiter error, failing open"),
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test, web};
    use async_trait::async_trait;
    use blog_core::ports::{RateLimitError, RateLimitResult};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Allows one request per key.
    #[derive(Default)]
    struct OncePerKey {
        seen: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl RateLimiter for OncePerKey {
        async fn check(&self, key: &str) -> Result<RateLimitResult, RateLimitError> {
            let fresh = self
                .seen
                .lock()
                .map_err(|e| RateLimitError::Backend(e.to_string()))?
                .insert(key.to_string());
            Ok(RateLimitResult {
                allowed: fresh,
                reset_after: Duration::from_secs(30),
            })
        }
    }

    async fn statuses_for_rotating_forwarded_for(trust: bool) -> Vec<StatusCode> {
        let limiter: Arc<dyn RateLimiter> = Arc::new(OncePerKey::default());
        let app = test::init_service(
            App::new().service(
                web::resource("/submit")
                    .wrap(RateLimitMiddleware::new(Some(limiter)).trust_proxy_headers(trust))
                    .route(web::post().to(|| async { HttpResponse::Ok().finish() })),
            ),
        )
        .await;

        let mut statuses = Vec::new();
        for forwarded in ["203.0.113.1", "203.0.113.2"] {
            let req = test::TestRequest::post()
                .uri("/submit")
                .peer_addr("198.51.100.7:40000".parse().unwrap())
                .insert_header(("X-Forwarded-For", forwarded))
                .to_request();
            statuses.push(test::call_service(&app, req).await.status());
        }
        statuses
    }

    #[actix_web::test]
    async fn test_forwarded_header_ignored_by_default() {
        assert_eq!(
            statuses_for_rotating_forwarded_for(false).await,
            [StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }

    #[actix_web::test]
    async fn test_forwarded_header_used_when_trusted() {
        assert_eq!(
            statuses_for_rotating_forwarded_for(true).await,
            [StatusCode::OK, StatusCode::OK]
        );
    }

    #[::core::prelude::v1::test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(12_500)), 13);
        assert_eq!(retry_after_secs(Duration::from_secs(4)), 4);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
