//! Bucket provisioning and lifecycle management for Bucketeer.
//!
//! The [`ObjectStore`] trait is the seam between the broker and the
//! storage backend. [`S3BucketStore`] implements it over a narrow S3
//! client surface ([`S3Api`]), handling bucket creation with its
//! configuration pipeline, the access-denied retry loop for policy
//! application, public access guard removal, and idempotent deletion with
//! optional content purge. [`MemoryObjectStore`] is an in-memory
//! implementation for tests and local development.

mod api;
mod aws;
mod encryption;
mod error;
mod memory;
mod policy;
mod store;
mod types;

pub use api::S3Api;
pub use aws::AwsS3Api;
pub use encryption::{EncryptionConfiguration, EncryptionDefault, EncryptionRule};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryObjectStore, StoredBucket};
pub use policy::{BucketPolicy, BucketPolicyStatement, grants_public_read, render_bucket_policy};
pub use store::{ObjectStore, S3BucketStore};
pub use types::{BucketDetails, BucketInfo, DeleteFailure, ObjectOwnership};
