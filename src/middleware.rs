//! Tower integration for whole routers.
//!
//! Handlers may call [`ApiGuard::check`] directly at the top of the
//! handler (the original calling pattern), or a router can be wrapped in
//! [`ApiGuardLayer`] to guard every route it serves with one policy.

use crate::config::LimitOptions;
use crate::guard::ApiGuard;
use crate::store::CounterStore;
use crate::usage::UsageRecorder;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::Response;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Layer applying one [`ApiGuard`] policy to every wrapped route.
#[derive(Debug)]
pub struct ApiGuardLayer<C, U> {
    guard: Arc<ApiGuard<C, U>>,
    opts: LimitOptions,
}

impl<C, U> ApiGuardLayer<C, U> {
    /// Guard the wrapped service with `opts` applied to every request.
    pub fn new(guard: Arc<ApiGuard<C, U>>, opts: LimitOptions) -> Self {
        Self { guard, opts }
    }
}

impl<C, U> Clone for ApiGuardLayer<C, U> {
    fn clone(&self) -> Self {
        Self { guard: self.guard.clone(), opts: self.opts.clone() }
    }
}

impl<S, C, U> Layer<S> for ApiGuardLayer<C, U> {
    type Service = ApiGuardService<S, C, U>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiGuardService { inner, guard: self.guard.clone(), opts: self.opts.clone() }
    }
}

/// Middleware service that short-circuits rate-limited requests.
#[derive(Debug)]
pub struct ApiGuardService<S, C, U> {
    inner: S,
    guard: Arc<ApiGuard<C, U>>,
    opts: LimitOptions,
}

impl<S: Clone, C, U> Clone for ApiGuardService<S, C, U> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), guard: self.guard.clone(), opts: self.opts.clone() }
    }
}

impl<S, C, U> Service<Request<Body>> for ApiGuardService<S, C, U>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    C: CounterStore + 'static,
    U: UsageRecorder + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let guard = self.guard.clone();
        let opts = self.opts.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = req.uri().path().to_string();
            let headers = req.headers().clone();
            let peer_ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|connect| connect.0.ip());

            match guard.check(&path, &headers, peer_ip, &opts).await {
                Some(blocked) => Ok(blocked),
                None => inner.call(req).await,
            }
        })
    }
}
