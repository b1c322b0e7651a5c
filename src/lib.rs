//! aws-catalog-sync: scheduled ingestion of AWS resources into a software
//! catalog.
//!
//! Providers discover EKS clusters, RDS instances and S3 buckets, map them
//! to catalog resource entities and replace the provider's previous entity
//! set in one full mutation per run. Mocks for every external seam are
//! exported behind the `test-export-mocks` feature.

pub mod arn;
pub mod catalog;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod credentials;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod load_config;
pub mod provider;
pub mod providers;
pub mod runner;
pub mod sdk;
pub mod tags;
