#![allow(dead_code)]

use http::{Request, Response};
use ratewarden::headers::{format_date, DATE, RATELIMIT_LIMIT, RATELIMIT_REMAINING, RATELIMIT_RESET};
use ratewarden::{CancelSignal, CancelSource};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::SystemTime;
use tower_service::Service;

pub const TOO_MANY: &str =
    r#"{"error":{"code":429,"method":"GET","request":"/en/products.json","message":"Too many requests"}}"#;

/// Builds a response carrying the three quota headers and a `Date`.
pub fn quota_response(
    status: u16,
    remaining: &str,
    reset: &str,
    date: SystemTime,
    body: &str,
) -> Response<Vec<u8>> {
    Response::builder()
        .status(status)
        .header(RATELIMIT_LIMIT, "300/3000/30000")
        .header(RATELIMIT_REMAINING, remaining)
        .header(RATELIMIT_RESET, reset)
        .header(DATE, format_date(date))
        .body(body.as_bytes().to_vec())
        .expect("valid response")
}

type Responder = dyn Fn(usize) -> Response<Vec<u8>> + Send + Sync;

/// Fake API: answers the n-th call (0-based) with `respond(n)` and counts sends.
#[derive(Clone)]
pub struct ScriptedApi {
    sent: Arc<AtomicUsize>,
    respond: Arc<Responder>,
}

impl ScriptedApi {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(usize) -> Response<Vec<u8>> + Send + Sync + 'static,
    {
        Self { sent: Arc::new(AtomicUsize::new(0)), respond: Arc::new(respond) }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

impl<Req> Service<Req> for ScriptedApi {
    type Response = Response<Vec<u8>>;
    type Error = Infallible;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Req) -> Self::Future {
        let n = self.sent.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok((self.respond)(n)))
    }
}

/// Cloneable request for stacks that resend.
#[derive(Debug, Clone)]
pub struct Call(pub &'static str);

impl CancelSource for Call {
    fn cancel_signal(&self) -> CancelSignal {
        CancelSignal::none()
    }
}

pub fn get(path: &'static str) -> Request<()> {
    Request::get(path).body(()).expect("valid request")
}
