//! Remote object storage: S3-compatible buckets and local mirrors

pub mod s3;
pub mod store;
pub mod sync;

pub use s3::{S3Credentials, S3Store, SigV4Signer};
pub use store::{LocalMirror, ObjectStore};
pub use sync::{RemoteSync, SyncReport};
