//! Lifecycle orchestration for the Bucketeer service broker.
//!
//! The [`S3Broker`] pairs an object store with an identity store: provision
//! creates a bucket from the plan's templates, bind issues a dedicated
//! principal whose access key and attached policy grant access to that
//! bucket (and optionally to further instances' buckets), and the delete
//! operations tear the same resources down again. Partially created
//! bindings are rolled back so a failed bind never leaks credentials.

mod broker;
mod credentials;
mod details;
mod directory;
mod error;

pub use broker::{S3Broker, ServiceBroker};
pub use credentials::{Credentials, bucket_uri};
pub use details::{
    BindDetails, BindParameters, Binding, DeprovisionDetails, ProvisionDetails,
    ProvisionParameters, UnbindDetails, UpdateDetails, UpdateParameters,
};
pub use directory::{DirectoryError, InstanceDirectory, MemoryInstanceDirectory};
pub use error::{BrokerError, BrokerResult};
