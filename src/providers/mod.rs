//! Concrete resource providers, one module per supported service.

pub mod eks;
pub mod rds;
pub mod s3;

pub use eks::EksClusterProvider;
pub use rds::RdsInstanceProvider;
pub use s3::S3BucketProvider;
