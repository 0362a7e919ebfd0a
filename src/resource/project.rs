//! GCP Projects
//!
//! Project snapshots plus the per-project calls: lookup by id, billing,
//! Service Usage and IAM.

use super::billing::{self, BillingAccount};
use super::container::Container;
use super::directory::ResourceDirectory;
use super::iam::{self, IamPolicy, Role};
use crate::error::{Error, Result};
use crate::gcp::client::GcpClient;
use crate::gcp::operations::{wait_for_operation, OperationApi};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;

/// Lifecycle state of a live project
pub const ACTIVE: &str = "ACTIVE";

/// APIs a project needs before it can serve as a quota project
pub const REQUIRED_APIS: &[&str] = &[
    "cloudresourcemanager.googleapis.com",
    "iam.googleapis.com",
    "serviceusage.googleapis.com",
    "cloudbilling.googleapis.com",
    "firestore.googleapis.com",
];

/// `services:batchEnable` accepts at most this many ids per call
const BATCH_ENABLE_LIMIT: usize = 20;

const MIN_PROJECT_ID_LEN: usize = 6;
const MAX_PROJECT_ID_LEN: usize = 30;
const MAX_RANDOM_DIGITS: usize = 10;

const SLUG_ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "clever", "crisp", "daring", "eager", "fancy", "gentle", "golden",
    "happy", "jolly", "keen", "lively", "lucky", "mellow", "nimble", "proud", "quiet", "rapid",
    "shiny", "silent", "smart", "sunny", "swift", "tidy", "vivid", "witty",
];

const SLUG_NOUNS: &[&str] = &[
    "badger", "beacon", "canyon", "comet", "cedar", "dolphin", "ember", "falcon", "fjord",
    "glacier", "harbor", "heron", "island", "lantern", "meadow", "otter", "panda", "quartz",
    "raven", "river", "summit", "tiger", "tundra", "walrus", "willow", "zephyr",
];

/// Project information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub project_number: String,
    pub lifecycle_state: String,
    /// Parent as seen when the project was fetched
    pub parent: Container,
}

impl Project {
    /// Build from either a CRM v3 or a CRM v1 project payload
    pub(crate) fn from_api(value: &Value, parent: Container) -> Self {
        let field = |name: &str| value.get(name).and_then(|v| v.as_str());
        let resource_name = field("name").unwrap_or_default();

        // v3: name = "projects/123" + displayName; v1: name is the display name
        let (name, number_from_name) = match resource_name.strip_prefix("projects/") {
            Some(number) => (field("displayName").unwrap_or_default(), number),
            None => (field("displayName").unwrap_or(resource_name), ""),
        };

        Self {
            id: field("projectId").unwrap_or_default().to_string(),
            name: name.to_string(),
            project_number: field("projectNumber")
                .unwrap_or(number_from_name)
                .to_string(),
            lifecycle_state: field("state")
                .or_else(|| field("lifecycleState"))
                .unwrap_or_default()
                .to_string(),
            parent,
        }
    }

    /// "projects/<id>"
    pub fn resource_name(&self) -> String {
        format!("projects/{}", self.id)
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle_state == ACTIVE
    }

    /// Find a project by id and resolve its parent
    pub async fn lookup(client: &GcpClient, project_id: &str) -> Result<Self> {
        let url = client.resourcemanager_url("projects:search");
        let query = format!("id:{}", project_id);
        let mut found = client
            .list_all(&url, &[("query", query.as_str())], "projects")
            .await?;

        if found.len() > 1 {
            return Err(Error::Ambiguous {
                query: project_id.to_string(),
                candidates: found
                    .iter()
                    .filter_map(|p| p.get("name").and_then(|v| v.as_str()))
                    .map(|s| s.to_string())
                    .collect(),
            });
        }
        let Some(resource) = found.pop() else {
            return Err(Error::not_found(format!("project '{}'", project_id)));
        };

        let parent_name = resource
            .get("parent")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let parent = if parent_name.starts_with("organizations/") {
            Container::Organization(client.get_organization(parent_name).await?)
        } else if parent_name.starts_with("folders/") {
            Container::Folder(client.get_folder(parent_name).await?)
        } else {
            Container::NoOrganization
        };

        Ok(Self::from_api(&resource, parent))
    }

    /// Billing account linked to the project, `None` when billing is off
    pub async fn billing_account(&self, client: &GcpClient) -> Result<Option<BillingAccount>> {
        billing::project_billing_account(client, &self.id).await
    }

    /// Link (or with `None`, unlink) a billing account by id
    pub async fn update_billing_account(
        &self,
        client: &GcpClient,
        billing_account_id: Option<&str>,
    ) -> Result<Value> {
        billing::update_project_billing(client, &self.id, billing_account_id).await
    }

    /// Service names of the enabled APIs ("compute.googleapis.com", ...)
    pub async fn enabled_apis(&self, client: &GcpClient) -> Result<Vec<String>> {
        let url = client.serviceusage_url(&format!("{}/services", self.resource_name()));
        let services = client
            .list_all(&url, &[("filter", "state:ENABLED")], "services")
            .await?;

        Ok(services
            .iter()
            .filter_map(|s| s.get("config")?.get("name")?.as_str())
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect())
    }

    /// Enable services and wait for each batch operation to finish
    pub async fn enable_apis(
        &self,
        client: &GcpClient,
        apis: &[String],
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Vec<Value>> {
        let url = client.serviceusage_url(&format!("{}/services:batchEnable", self.resource_name()));
        let mut operations = Vec::new();

        for batch in apis.chunks(BATCH_ENABLE_LIMIT) {
            tracing::info!("Enabling {} APIs for project {}", batch.len(), self.id);
            let operation = client
                .post(&url, Some(&json!({ "serviceIds": batch })))
                .await?;
            let done = wait_for_operation(
                client,
                OperationApi::ServiceUsage,
                operation,
                timeout,
                poll_interval,
            )
            .await?;
            operations.push(done);
        }

        Ok(operations)
    }

    /// Enable whichever of `required` is not yet enabled.
    ///
    /// Returns the APIs that were enabled, sorted; empty when nothing was
    /// missing.
    pub async fn bootstrap_quota_project(
        &self,
        client: &GcpClient,
        required: &[&str],
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Vec<String>> {
        let current: BTreeSet<String> = self.enabled_apis(client).await?.into_iter().collect();
        let missing: Vec<String> = required
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>()
            .difference(&current)
            .cloned()
            .collect();

        if missing.is_empty() {
            tracing::debug!("Project {} already has every required API", self.id);
            return Ok(missing);
        }

        self.enable_apis(client, &missing, timeout, poll_interval)
            .await?;
        Ok(missing)
    }

    /// Add `roles/owner` for a user
    pub async fn add_user_as_owner(&self, client: &GcpClient, user_email: &str) -> Result<IamPolicy> {
        let member = iam::user_member(user_email)?;
        iam::add_member_roles(client, &self.resource_name(), &member, &["roles/owner"]).await
    }

    /// Roles bound directly to a user on this project
    pub async fn list_roles(&self, client: &GcpClient, user_email: Option<&str>) -> Result<Vec<Role>> {
        iam::list_roles(client, &self.resource_name(), user_email).await
    }

    /// Suggest a project id: `prefix` (or a random two-word slug) followed by
    /// `-` and `random_digits` digits
    pub fn suggest_name(prefix: Option<&str>, random_digits: usize) -> Result<String> {
        if random_digits > MAX_RANDOM_DIGITS {
            return Err(Error::InvalidArgument(format!(
                "random_digits must be between 0 and {}",
                MAX_RANDOM_DIGITS
            )));
        }

        let mut rng = rand::thread_rng();
        let prefix = match prefix {
            Some(p) => {
                if !p.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
                    return Err(Error::InvalidArgument(
                        "prefix must start with a lowercase letter".to_string(),
                    ));
                }
                p.to_string()
            },
            None => format!(
                "{}-{}",
                SLUG_ADJECTIVES.choose(&mut rng).unwrap_or(&"quiet"),
                SLUG_NOUNS.choose(&mut rng).unwrap_or(&"otter")
            ),
        };

        let name = if random_digits > 0 {
            let digits: String = (0..random_digits)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect();
            format!("{}-{}", prefix, digits)
        } else {
            prefix
        };

        if !(MIN_PROJECT_ID_LEN..=MAX_PROJECT_ID_LEN).contains(&name.len()) {
            return Err(Error::InvalidArgument(format!(
                "generated name '{}' is {} characters, but project ids must be {}-{} characters long",
                name,
                name.len(),
                MIN_PROJECT_ID_LEN,
                MAX_PROJECT_ID_LEN
            )));
        }

        Ok(name)
    }
}
