//! Rate limiting middleware.
//!
//! Wrap a scope or resource with [`RateLimit`] to apply one policy to it:
//!
//! ```ignore
//! web::scope("/auth").wrap(RateLimit::new(limiter, presets.auth.clone(), FailureMode::Open))
//! ```

use actix_web::{
    Error, HttpMessage, HttpRequest, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use tradelog_core::ports::RateLimiter;
use tradelog_core::rate_limit::{Admission, FailureMode, RateLimitPolicy, RequestIdentity};

use super::auth::authenticate;
use super::error::AppError;
use crate::observability::RequestId;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate limiting middleware factory, one policy per wrapped service.
pub struct RateLimit {
    limiter: Arc<dyn RateLimiter>,
    policy: Arc<RateLimitPolicy>,
    failure_mode: FailureMode,
    trusted_proxies: Arc<[IpAddr]>,
}

impl RateLimit {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        policy: RateLimitPolicy,
        failure_mode: FailureMode,
    ) -> Self {
        Self {
            limiter,
            policy: Arc::new(policy),
            failure_mode,
            trusted_proxies: Arc::from([]),
        }
    }

    /// Peers whose `X-Forwarded-For` / `Forwarded` headers name the client.
    /// Everyone else is identified by the socket address alone.
    pub fn with_trusted_proxies(mut self, proxies: Arc<[IpAddr]>) -> Self {
        self.trusted_proxies = proxies;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            limiter: Arc::clone(&self.limiter),
            policy: Arc::clone(&self.policy),
            failure_mode: self.failure_mode,
            trusted_proxies: Arc::clone(&self.trusted_proxies),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    policy: Arc<RateLimitPolicy>,
    failure_mode: FailureMode,
    trusted_proxies: Arc<[IpAddr]>,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = Arc::clone(&self.limiter);
        let policy = Arc::clone(&self.policy);
        let failure_mode = self.failure_mode;
        let identity = request_identity(req.request(), &self.trusted_proxies);

        Box::pin(async move {
            let admission = match limiter.check(&identity, &policy).await {
                Ok(admission) => admission,
                Err(e) => match failure_mode {
                    FailureMode::Open => {
                        tracing::error!(
                            policy = policy.name(),
                            error = %e,
                            "Rate limiter error, failing open"
                        );
                        let res = service.call(req).await?;
                        return Ok(res.map_into_left_body());
                    }
                    FailureMode::Closed => {
                        let error = AppError::unavailable(&e, request_id(&req));
                        return Ok(reject(req, &error));
                    }
                },
            };

            match admission {
                Admission::Denied {
                    limit,
                    retry_after_secs,
                    message,
                } => {
                    tracing::warn!(
                        policy = policy.name(),
                        method = %identity.method,
                        path = %identity.path,
                        user = identity.user_id.as_deref().unwrap_or("anonymous"),
                        ip = identity.ip.as_deref().unwrap_or("unknown"),
                        retry_after_secs,
                        "Rate limit exceeded"
                    );

                    let error = AppError::RateLimited {
                        limit,
                        retry_after_secs,
                        message,
                        request_id: request_id(&req),
                    };
                    Ok(reject(req, &error))
                }
                Admission::Allowed {
                    limit,
                    remaining,
                    reset_after,
                } => {
                    let mut res = service.call(req).await?;
                    let headers = res.headers_mut();
                    headers.insert(
                        HeaderName::from_static(LIMIT_HEADER),
                        HeaderValue::from(limit),
                    );
                    headers.insert(
                        HeaderName::from_static(REMAINING_HEADER),
                        HeaderValue::from(remaining),
                    );
                    headers.insert(
                        HeaderName::from_static(RESET_HEADER),
                        HeaderValue::from(reset_after.as_secs()),
                    );
                    Ok(res.map_into_left_body())
                }
                Admission::Exempt => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
            }
        })
    }
}

fn reject<B>(req: ServiceRequest, error: &AppError) -> ServiceResponse<EitherBody<B>> {
    req.into_response(error.error_response())
        .map_into_right_body()
}

fn request_id(req: &ServiceRequest) -> Option<String> {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string())
}

/// Identity attributes the admission check keys on.
///
/// An invalid or absent bearer token just leaves the request anonymous;
/// rejecting it is the handler's job.
pub fn request_identity(req: &HttpRequest, trusted_proxies: &[IpAddr]) -> RequestIdentity {
    let mut identity = RequestIdentity::new(req.method().as_str(), req.path());
    identity.ip = client_ip(req, trusted_proxies);
    identity.user_id = authenticate(req).ok().map(|id| id.user_id.to_string());
    identity
}

/// The socket peer, unless the peer is a trusted proxy that forwarded the
/// request, in which case the forwarded client address.
fn client_ip(req: &HttpRequest, trusted_proxies: &[IpAddr]) -> Option<String> {
    let peer = req.peer_addr()?.ip();

    if trusted_proxies.contains(&peer) {
        if let Some(forwarded) = req.connection_info().realip_remote_addr() {
            return Some(strip_port(forwarded));
        }
    }

    Some(peer.to_string())
}

/// Forwarded addresses may carry a port; every connection from one host
/// belongs in the same window.
fn strip_port(addr: &str) -> String {
    match addr.parse::<SocketAddr>() {
        Ok(socket) => socket.ip().to_string(),
        Err(_) => addr.to_string(),
    }
}

/// True for requests from this host, such as container health checks.
pub fn is_loopback(identity: &RequestIdentity) -> bool {
    identity
        .ip
        .as_deref()
        .and_then(|ip| ip.parse::<IpAddr>().ok())
        .is_some_and(|ip| ip.is_loopback())
}
