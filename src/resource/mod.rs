//! Resource hierarchy layer
//!
//! Typed snapshots of the Google Cloud resource hierarchy and the calls
//! that operate on them.
//!
//! # Architecture
//!
//! - [`directory`] - Listing primitives (`ResourceDirectory`) and the REST implementation
//! - [`container`] - Organizations, folders, `NoOrganization`; tree walk and path lookup
//! - [`project`] - Projects: lookup, billing link, Service Usage
//! - [`billing`] - Billing accounts
//! - [`iam`] - IAM policies, roles, service accounts
//! - [`region`] - Static region and multi-region tables
//!
//! # Example
//!
//! ```ignore
//! use futures::TryStreamExt;
//! use gcp_estate::resource::{Container, Organization};
//!
//! async fn active_projects(client: &gcp_estate::GcpClient) -> gcp_estate::Result<()> {
//!     let org = Container::from(Organization::lookup(client, "123456789").await?);
//!     let mut projects = std::pin::pin!(org.walk_projects(client, true));
//!     while let Some(project) = projects.try_next().await? {
//!         println!("{}", project.id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod billing;
pub mod container;
pub mod directory;
pub mod iam;
pub mod project;
pub mod region;

pub use billing::{default_billing_account, BillingAccount, BillingStatus};
pub use container::{list_organizations, Container, Folder, Organization, ORGANIZATION_OWNER_ROLES};
pub use directory::ResourceDirectory;
pub use iam::{IamPolicy, PolicyBinding, Role};
pub use project::{Project, REQUIRED_APIS};
pub use region::{MultiRegion, Region};
