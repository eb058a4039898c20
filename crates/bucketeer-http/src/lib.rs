//! Open Service Broker HTTP surface for Bucketeer.
//!
//! Exposes a [`bucketeer_broker::ServiceBroker`] over the synchronous
//! subset of the service broker API: catalog listing, instance
//! provisioning, updating and deprovisioning, and binding management.
//! Every `/v2` endpoint requires basic authentication; `GET /health`
//! answers unauthenticated liveness probes.

mod auth;
mod response;
mod router;
mod service;

pub use auth::BasicCredentials;
pub use response::{BrokerBody, empty_object_response, error_response, json_response};
pub use router::{Route, RouteError, resolve};
pub use service::BrokerService;
