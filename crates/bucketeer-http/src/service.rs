//! The broker HTTP service implementing hyper's `Service` trait.
//!
//! [`BrokerService`] ties together authentication, routing, body decoding,
//! dispatch to the [`ServiceBroker`], and protocol response formatting:
//!
//! 1. Health check interception (`GET /health`, no credentials required)
//! 2. Basic authentication for everything under `/v2`
//! 3. Route resolution via [`crate::router`]
//! 4. Request body collection and JSON decoding
//! 5. Operation dispatch and status mapping

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bucketeer_broker::{
    BindDetails, Binding, BrokerError, DeprovisionDetails, ProvisionDetails, ServiceBroker,
    UnbindDetails, UpdateDetails,
};
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::BasicCredentials;
use crate::response::{BrokerBody, empty_object_response, error_response, json_response};
use crate::router::{self, Route, RouteError};

/// Hyper service exposing a [`ServiceBroker`] over the broker API.
pub struct BrokerService<B: ServiceBroker> {
    broker: Arc<B>,
    credentials: Arc<BasicCredentials>,
}

impl<B: ServiceBroker> BrokerService<B> {
    /// Serve the given broker, requiring the given credentials on `/v2`.
    #[must_use]
    pub fn new(broker: B, credentials: BasicCredentials) -> Self {
        Self {
            broker: Arc::new(broker),
            credentials: Arc::new(credentials),
        }
    }

    /// Like [`BrokerService::new`] but sharing an existing broker.
    #[must_use]
    pub fn from_shared(broker: Arc<B>, credentials: BasicCredentials) -> Self {
        Self {
            broker,
            credentials: Arc::new(credentials),
        }
    }
}

impl<B: ServiceBroker> Clone for BrokerService<B> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            credentials: Arc::clone(&self.credentials),
        }
    }
}

impl<B: ServiceBroker> std::fmt::Debug for BrokerService<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerService")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl<B: ServiceBroker + 'static> Service<http::Request<Incoming>> for BrokerService<B> {
    type Response = http::Response<BrokerBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let broker = Arc::clone(&self.broker);
        let credentials = Arc::clone(&self.credentials);

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response =
                process_request(req, broker.as_ref(), &credentials, &request_id).await;
            Ok(response)
        })
    }
}

/// Process one request through the broker pipeline.
async fn process_request<B, R>(
    req: http::Request<R>,
    broker: &B,
    credentials: &BasicCredentials,
    request_id: &str,
) -> http::Response<BrokerBody>
where
    B: ServiceBroker,
    R: http_body::Body,
    R::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    debug!(%method, path, request_id, "processing request");

    if is_health_check(&method, &path) {
        return health_response();
    }

    // Only the broker API itself is authenticated; unrouted paths outside
    // it fall through to a plain 404.
    if path.starts_with("/v2") && !credentials.authorize(req.headers()) {
        warn!(%method, path, request_id, "rejecting request without valid credentials");
        return error_response(StatusCode::UNAUTHORIZED, "credentials are required");
    }

    let route = match router::resolve(&req) {
        Ok(route) => route,
        Err(err @ RouteError::NotFound { .. }) => {
            debug!(%method, path, request_id, "no such route");
            return error_response(StatusCode::NOT_FOUND, &err.to_string());
        }
        Err(err @ RouteError::MethodNotAllowed { .. }) => {
            return error_response(StatusCode::METHOD_NOT_ALLOWED, &err.to_string());
        }
    };

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, request_id, "failed to read request body");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read request body",
            );
        }
    };

    dispatch(broker, route, &body, request_id).await
}

/// Dispatch a routed request to the broker and map the outcome onto the
/// protocol's statuses.
async fn dispatch<B: ServiceBroker>(
    broker: &B,
    route: Route,
    body: &[u8],
    request_id: &str,
) -> http::Response<BrokerBody> {
    match route {
        Route::Catalog => {
            let services = broker.services();
            json_response(StatusCode::OK, &serde_json::json!({ "services": services }))
        }

        Route::Provision { instance_id } => {
            let details: ProvisionDetails = match serde_json::from_slice(body) {
                Ok(details) => details,
                Err(err) => return invalid_body_response(&err, request_id),
            };
            info!(
                %instance_id,
                service_id = %details.service_id,
                plan_id = %details.plan_id,
                request_id,
                "provisioning instance"
            );
            match broker.provision(&instance_id, details).await {
                Ok(_) => empty_object_response(StatusCode::CREATED),
                Err(err) => failure_response(&err, StatusCode::INTERNAL_SERVER_ERROR, request_id),
            }
        }

        Route::Update { instance_id } => {
            let details: UpdateDetails = match serde_json::from_slice(body) {
                Ok(details) => details,
                Err(err) => return invalid_body_response(&err, request_id),
            };
            info!(%instance_id, plan_id = %details.plan_id, request_id, "updating instance");
            match broker.update(&instance_id, details).await {
                Ok(()) => empty_object_response(StatusCode::OK),
                Err(err) => failure_response(&err, StatusCode::INTERNAL_SERVER_ERROR, request_id),
            }
        }

        Route::Deprovision {
            instance_id,
            service_id,
            plan_id,
        } => {
            info!(%instance_id, %service_id, %plan_id, request_id, "deprovisioning instance");
            let details = DeprovisionDetails {
                service_id,
                plan_id,
            };
            match broker.deprovision(&instance_id, details).await {
                Ok(()) => empty_object_response(StatusCode::OK),
                Err(err) => failure_response(&err, StatusCode::GONE, request_id),
            }
        }

        Route::Bind {
            instance_id,
            binding_id,
        } => {
            let details: BindDetails = match serde_json::from_slice(body) {
                Ok(details) => details,
                Err(err) => return invalid_body_response(&err, request_id),
            };
            info!(%instance_id, %binding_id, request_id, "binding instance");
            match broker.bind(&instance_id, &binding_id, details).await {
                Ok(credentials) => {
                    json_response(StatusCode::CREATED, &Binding { credentials })
                }
                Err(err) => failure_response(&err, StatusCode::NOT_FOUND, request_id),
            }
        }

        Route::Unbind {
            instance_id,
            binding_id,
            service_id,
            plan_id,
        } => {
            info!(%instance_id, %binding_id, request_id, "unbinding instance");
            let details = UnbindDetails {
                service_id,
                plan_id,
            };
            match broker.unbind(&instance_id, &binding_id, details).await {
                Ok(()) => empty_object_response(StatusCode::OK),
                Err(err) => failure_response(&err, StatusCode::GONE, request_id),
            }
        }
    }
}

fn invalid_body_response(err: &serde_json::Error, request_id: &str) -> http::Response<BrokerBody> {
    debug!(error = %err, request_id, "rejecting undecodable request body");
    error_response(
        StatusCode::BAD_REQUEST,
        &format!("invalid request body: {err}"),
    )
}

/// Map a broker failure onto the protocol's status conventions.
///
/// `instance_gone` is the status for a missing instance, which differs by
/// endpoint: the delete endpoints answer 410, bind answers 404. A 410
/// carries the empty JSON object instead of an error envelope.
fn failure_response(
    err: &BrokerError,
    instance_gone: StatusCode,
    request_id: &str,
) -> http::Response<BrokerBody> {
    let status = if err.is_input_error() {
        StatusCode::BAD_REQUEST
    } else if matches!(err, BrokerError::InstanceGone { .. }) {
        instance_gone
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    if status.is_server_error() {
        warn!(error = %err, request_id, "operation failed");
    } else {
        debug!(error = %err, status = status.as_u16(), request_id, "operation rejected");
    }

    if status == StatusCode::GONE {
        return empty_object_response(StatusCode::GONE);
    }
    error_response(status, &err.to_string())
}

fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && path == "/health"
}

fn health_response() -> http::Response<BrokerBody> {
    http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(br#"{"status":"running"}"#)))
        .expect("static health response should be valid")
}
