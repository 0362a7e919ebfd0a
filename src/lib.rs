//! gcp-estate
//!
//! Navigate and administer a Google Cloud estate: organizations, folders,
//! projects, billing accounts and IAM.
//!
//! - [`gcp`] - Authentication, HTTP and the REST client
//! - [`resource`] - The resource tree and the per-resource calls
//! - [`services`] - API display-name resolution
//! - [`admin`] - Managed project setup with an admin service account
//! - [`config`] - Persistent user settings

pub mod admin;
pub mod config;
pub mod error;
pub mod gcp;
pub mod resource;
pub mod services;

/// Version injected at compile time via GCP_ESTATE_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("GCP_ESTATE_VERSION") {
    Some(v) => v,
    None => "dev",
};

pub use error::{Error, Result};
pub use gcp::auth::GcpCredentials;
pub use gcp::client::{Endpoints, GcpClient};
pub use resource::{
    list_organizations, BillingAccount, Container, Folder, Organization, Project,
    ResourceDirectory,
};
pub use services::{ApiMatch, ApiResolver, MatchKind};
