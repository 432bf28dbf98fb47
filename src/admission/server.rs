// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP server for the admission and authorization webhooks.
//!
//! TLS is expected to be terminated in front of this server.

use super::authorizer::SeedAuthorizer;
use super::seedrestriction::{ObjectReader, SeedRestriction};
use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use k8s_openapi::api::authorization::v1::SubjectAccessReview;
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    DynamicObject,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub const SEED_RESTRICTION_PATH: &str = "/webhooks/admission/seedrestriction";
pub const SEED_AUTHORIZER_PATH: &str = "/webhooks/auth/seed";
pub const HEALTHZ_PATH: &str = "/healthz";

/// Largest review body accepted, in bytes
pub const MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

struct Handlers<R> {
    authorizer: SeedAuthorizer,
    /// `None` when the seed restriction is disabled
    restriction: Option<SeedRestriction<R>>,
}

pub struct WebhookServer<R> {
    bind_address: SocketAddr,
    handlers: Arc<Handlers<R>>,
}

impl<R: ObjectReader + 'static> WebhookServer<R> {
    pub fn new(bind_address: SocketAddr, authorizer: SeedAuthorizer, restriction: Option<SeedRestriction<R>>) -> Self {
        Self {
            bind_address,
            handlers: Arc::new(Handlers { authorizer, restriction }),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_address).await?;
        info!("Webhook server listening on {}", self.bind_address);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            let handlers = self.handlers.clone();
            let io = TokioIo::new(stream);

            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let handlers = handlers.clone();
                    async move { Ok::<_, hyper::Error>(route(req, &handlers).await) }
                });
                if let Err(e) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    debug!("Connection from {} closed with error: {}", peer, e);
                }
            });
        }
    }
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = content_type.parse() {
        response.headers_mut().insert(http::header::CONTENT_TYPE, value);
    }
    response
}

fn respond_json<T: serde::Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(StatusCode::OK, "application/json", body),
        Err(e) => respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", e.to_string()),
    }
}

async fn read_json<B, T>(req: Request<B>) -> Result<T, (StatusCode, String)>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    T: serde::de::DeserializeOwned,
{
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Err((StatusCode::PAYLOAD_TOO_LARGE, e.to_string()))
        }
        Err(e) => return Err((StatusCode::BAD_REQUEST, e.to_string())),
    };
    serde_json::from_slice(&body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

async fn route<B, R>(req: Request<B>, handlers: &Handlers<R>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    R: ObjectReader,
{
    match (req.method(), req.uri().path()) {
        (&Method::GET, HEALTHZ_PATH) => respond(StatusCode::OK, "text/plain", "ok"),
        (&Method::POST, SEED_RESTRICTION_PATH) => {
            let review: AdmissionReview<DynamicObject> = match read_json(req).await {
                Ok(review) => review,
                Err((status, e)) => {
                    warn!("Invalid AdmissionReview: {}", e);
                    return respond(status, "text/plain", e);
                }
            };
            let request: AdmissionRequest<DynamicObject> = match review.try_into() {
                Ok(request) => request,
                Err(e) => return respond_json(&AdmissionResponse::invalid(e.to_string()).into_review()),
            };
            let response = match &handlers.restriction {
                Some(restriction) => restriction.handle(&request).await,
                None => AdmissionResponse::from(&request),
            };
            respond_json(&response.into_review())
        }
        (&Method::POST, SEED_AUTHORIZER_PATH) => match read_json::<_, SubjectAccessReview>(req).await {
            Ok(review) => respond_json(&handlers.authorizer.review(review)),
            Err((status, e)) => {
                warn!("Invalid SubjectAccessReview: {}", e);
                respond(status, "text/plain", e)
            }
        },
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::graph::Graph;
    use crate::test_utils::MockService;
    use kube::Client;
    use serde_json::{json, Value};

    fn handlers(restriction_enabled: bool) -> Handlers<Client> {
        Handlers {
            authorizer: SeedAuthorizer::new(Arc::new(Graph::new())),
            restriction: restriction_enabled.then(|| SeedRestriction::new(MockService::new().into_client(), "garden")),
        }
    }

    fn post(path: &str, body: Value) -> Request<Full<Bytes>> {
        let mut req = Request::new(Full::new(Bytes::from(body.to_string())));
        *req.method_mut() = Method::POST;
        *req.uri_mut() = path.parse().unwrap();
        req
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn lease_review() -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "abc",
                "kind": {"group": "coordination.k8s.io", "version": "v1", "kind": "Lease"},
                "resource": {"group": "coordination.k8s.io", "version": "v1", "resource": "leases"},
                "name": "other-seed",
                "namespace": "gardener-system-seed-lease",
                "operation": "CREATE",
                "userInfo": {"username": "gardener.cloud:system:seed:seed", "groups": ["gardener.cloud:system:seeds"]},
                "dryRun": false
            }
        })
    }

    #[tokio::test]
    async fn test_healthz() {
        let mut req = Request::new(Full::new(Bytes::new()));
        *req.uri_mut() = "/healthz".parse().unwrap();
        let response = route(req, &handlers(true)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_seed_restriction_route() {
        let response = route(post(SEED_RESTRICTION_PATH, lease_review()), &handlers(true)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["response"]["uid"], "abc");
        assert_eq!(body["response"]["allowed"], false);
        assert_eq!(body["response"]["status"]["code"], 403);
    }

    #[tokio::test]
    async fn test_disabled_seed_restriction_allows() {
        let response = route(post(SEED_RESTRICTION_PATH, lease_review()), &handlers(false)).await;
        let body = body_json(response).await;
        assert_eq!(body["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_authorizer_route() {
        let review = json!({
            "apiVersion": "authorization.k8s.io/v1",
            "kind": "SubjectAccessReview",
            "spec": {
                "user": "gardener.cloud:system:seed:<ambiguous>",
                "groups": ["gardener.cloud:system:seeds"],
                "resourceAttributes": {"resource": "secrets", "namespace": "garden", "name": "x"}
            }
        });
        let response = route(post(SEED_AUTHORIZER_PATH, review), &handlers(true)).await;
        let body = body_json(response).await;
        assert_eq!(body["status"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let req = post(SEED_AUTHORIZER_PATH, json!("not a review"));
        assert_eq!(route(req, &handlers(true)).await.status(), StatusCode::BAD_REQUEST);

        let req = post("/unknown", json!({}));
        assert_eq!(route(req, &handlers(true)).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_bodies_are_rejected() {
        let mut review = lease_review();
        review["request"]["object"] = json!({"data": "x".repeat(MAX_BODY_BYTES)});

        let response = route(post(SEED_RESTRICTION_PATH, review.clone()), &handlers(true)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = route(post(SEED_AUTHORIZER_PATH, review), &handlers(true)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
