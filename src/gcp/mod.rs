//! GCP API interaction module
//!
//! Authentication, the HTTP layer and the REST client shared by every
//! resource wrapper.
//!
//! # Module Structure
//!
//! - [`auth`] - Application Default Credentials, key files and static tokens
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//! - [`operations`] - Long-running operation polling
//!
//! # Example
//!
//! ```ignore
//! use gcp_estate::gcp::client::GcpClient;
//!
//! async fn example() -> gcp_estate::Result<()> {
//!     let client = GcpClient::new().await?;
//!     let orgs = client.get(&client.resourcemanager_url("organizations:search")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod operations;
