pub mod s3;

pub use s3::{S3BlobStore, S3Config};
pub use walki_common::traits::storage_traits::BlobStore;
