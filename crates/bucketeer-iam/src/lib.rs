//! Identity management for the bucketeer service broker.
//!
//! Every binding is backed by a dedicated principal carrying one access key
//! and one attached managed policy. [`IdentityStore`] is the contract the
//! broker orchestrates against; [`AwsIdentityStore`] implements it over the
//! AWS IAM API and [`MemoryIdentityStore`] over process memory for tests.

mod aws;
mod error;
mod memory;
mod policy;
mod store;
mod types;

pub use aws::AwsIdentityStore;
pub use error::{IdentityError, IdentityResult};
pub use memory::{MemoryIdentityStore, StoredPolicy, StoredPrincipal};
pub use policy::render_iam_policy;
pub use store::IdentityStore;
pub use types::AccessKey;
