//! IAM policies, roles and service accounts
//!
//! Policies are read and written through Cloud Resource Manager v3 for
//! projects, folders and organizations. Grants are read-modify-write: the
//! policy is fetched, missing bindings or members are added and the policy
//! is only written back when something changed.

use crate::error::{Error, Result};
use crate::gcp::client::GcpClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Policy version that supports conditional bindings
const POLICY_VERSION: i64 = 3;

/// Resource name prefixes that carry an IAM policy in Resource Manager
const POLICY_RESOURCE_PREFIXES: &[&str] = &["projects/", "folders/", "organizations/"];

/// IAM role with human-readable metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Role {
    fn name_only(name: &str) -> Self {
        Self {
            name: name.to_string(),
            title: String::new(),
            description: String::new(),
        }
    }
}

/// IAM policy binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyBinding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

/// IAM policy
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub bindings: Vec<PolicyBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Fields this crate does not model (auditConfigs, ...), written back as-is
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl IamPolicy {
    /// Add `member` to each of `roles`; returns whether anything changed.
    ///
    /// Conditional bindings are left alone: a role only counts as granted
    /// through an unconditional binding.
    pub fn add_member_roles(&mut self, member: &str, roles: &[&str]) -> bool {
        let mut changed = false;

        for role in roles {
            match self
                .bindings
                .iter_mut()
                .find(|b| b.role == *role && b.condition.is_none())
            {
                Some(binding) => {
                    if !binding.members.iter().any(|m| m == member) {
                        binding.members.push(member.to_string());
                        changed = true;
                    }
                },
                None => {
                    self.bindings.push(PolicyBinding {
                        role: role.to_string(),
                        members: vec![member.to_string()],
                        condition: None,
                    });
                    changed = true;
                },
            }
        }

        changed
    }

    /// Roles bound to `member`, in binding order
    pub fn roles_of(&self, member: &str) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|b| b.members.iter().any(|m| m == member))
            .map(|b| b.role.as_str())
            .collect()
    }
}

/// "user:<email>" after checking the address looks like one
pub fn user_member(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidArgument(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(format!("user:{}", email))
}

fn policy_url(client: &GcpClient, resource_name: &str, method: &str) -> Result<String> {
    if !POLICY_RESOURCE_PREFIXES
        .iter()
        .any(|p| resource_name.starts_with(p))
    {
        return Err(Error::InvalidArgument(format!(
            "unsupported resource name for IAM: {}",
            resource_name
        )));
    }
    Ok(client.resourcemanager_url(&format!("{}:{}", resource_name, method)))
}

/// Fetch the IAM policy of a project, folder or organization
pub async fn get_iam_policy(client: &GcpClient, resource_name: &str) -> Result<IamPolicy> {
    let url = policy_url(client, resource_name, "getIamPolicy")?;
    let body = json!({ "options": { "requestedPolicyVersion": POLICY_VERSION } });
    let value = client.post(&url, Some(&body)).await?;
    Ok(serde_json::from_value(value)?)
}

/// Replace the IAM policy; the etag inside `policy` guards against races
pub async fn set_iam_policy(
    client: &GcpClient,
    resource_name: &str,
    policy: &IamPolicy,
) -> Result<IamPolicy> {
    let url = policy_url(client, resource_name, "setIamPolicy")?;
    let value = client.post(&url, Some(&json!({ "policy": policy }))).await?;
    Ok(serde_json::from_value(value)?)
}

/// Grant `roles` to `member` ("user:...", "serviceAccount:...") on a resource
pub async fn add_member_roles(
    client: &GcpClient,
    resource_name: &str,
    member: &str,
    roles: &[&str],
) -> Result<IamPolicy> {
    if roles.is_empty() {
        return Err(Error::InvalidArgument(
            "at least one role is required".to_string(),
        ));
    }

    let mut policy = get_iam_policy(client, resource_name).await?;
    if policy.version < POLICY_VERSION {
        policy.version = POLICY_VERSION;
    }

    if !policy.add_member_roles(member, roles) {
        tracing::debug!("{} already holds every requested role on {}", member, resource_name);
        return Ok(policy);
    }

    tracing::info!("Granting {} role(s) to {} on {}", roles.len(), member, resource_name);
    set_iam_policy(client, resource_name, &policy).await
}

/// Fetch role metadata; roles the caller cannot read fall back to the bare name
pub async fn describe_role(client: &GcpClient, role_name: &str) -> Role {
    match client.get(&client.iam_url(role_name)).await {
        Ok(value) => serde_json::from_value::<Role>(value).unwrap_or_else(|_| Role::name_only(role_name)),
        Err(e) => {
            tracing::warn!("Could not describe role {}: {}", role_name, e);
            Role::name_only(role_name)
        },
    }
}

/// Roles bound directly to a user on a resource.
///
/// Without `user_email` the identity behind the current token is used.
pub async fn list_roles(
    client: &GcpClient,
    resource_name: &str,
    user_email: Option<&str>,
) -> Result<Vec<Role>> {
    let email = match user_email {
        Some(email) => email.to_string(),
        None => client.get_email().await?,
    };
    let member = user_member(&email)?;
    let policy = get_iam_policy(client, resource_name).await?;

    let mut roles = Vec::new();
    for role_name in policy.roles_of(&member) {
        roles.push(describe_role(client, role_name).await);
    }
    Ok(roles)
}

/// Email of a project's service account with the given account id
pub fn service_account_email(account_id: &str, project_id: &str) -> String {
    format!("{}@{}.iam.gserviceaccount.com", account_id, project_id)
}

/// Create a service account unless it already exists; returns its email
pub async fn ensure_service_account(
    client: &GcpClient,
    project_id: &str,
    account_id: &str,
    display_name: &str,
) -> Result<String> {
    let email = service_account_email(account_id, project_id);
    let url = client.iam_url(&format!(
        "projects/{}/serviceAccounts/{}",
        project_id,
        urlencoding::encode(&email)
    ));

    match client.get(&url).await {
        Ok(_) => {
            tracing::debug!("Service account {} already exists", email);
            return Ok(email);
        },
        Err(e) if e.status() == Some(404) => {},
        Err(e) => return Err(e),
    }

    let body = json!({
        "accountId": account_id,
        "serviceAccount": { "displayName": display_name },
    });
    client
        .post(
            &client.iam_url(&format!("projects/{}/serviceAccounts", project_id)),
            Some(&body),
        )
        .await?;

    tracing::info!("Created service account {}", email);
    Ok(email)
}
