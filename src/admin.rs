//! Admin robot
//!
//! An admin configuration lives in `<config_dir>/gcp-estate/<name>/`:
//!
//! - `config.yaml`: `mode`, `admin_bot` (service account email) and
//!   `trusted_humans`
//! - `admin.json`: the admin bot's service account key
//!
//! [`AdminSession`] acts with the admin bot's key to set up fully managed
//! projects: billing linked, an `admin-robot` service account, owners
//! granted and APIs enabled. Every step skips work that is already done.

use crate::config::app_config_dir;
use crate::error::{Error, Result};
use crate::gcp::auth::{validate_project_id, GcpCredentials};
use crate::gcp::client::{Endpoints, GcpClient};
use crate::gcp::operations::{
    wait_for_operation, OperationApi, DEFAULT_ENABLE_TIMEOUT, DEFAULT_OPERATION_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
use crate::resource::billing::{self, BillingAccount};
use crate::resource::iam;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.yaml";
pub const KEY_FILE: &str = "admin.json";

/// Label stamped on every project the admin robot manages
pub const MANAGED_BY_LABEL: (&str, &str) = ("managed-by", "gcp-estate");

/// Account id of the per-project service account
pub const ROBOT_ACCOUNT_ID: &str = "admin-robot";

const OWNER_ROLE: &str = "roles/owner";

/// APIs enabled on new projects unless the caller says otherwise
pub const DEFAULT_PROJECT_APIS: &[&str] = &[
    "firestore.googleapis.com",
    "aiplatform.googleapis.com",
    "container.googleapis.com",
    "storage-api.googleapis.com",
    "storage-component.googleapis.com",
    "bigtable.googleapis.com",
    "bigtableadmin.googleapis.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminMode {
    Personal,
    Organization,
}

/// Contents of `config.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSettings {
    #[serde(default)]
    pub mode: Option<AdminMode>,
    #[serde(default)]
    pub admin_bot: Option<String>,
    #[serde(default)]
    pub trusted_humans: Vec<String>,
}

/// A validated admin configuration
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub name: String,
    pub dir: PathBuf,
    pub mode: Option<AdminMode>,
    pub admin_bot: String,
    pub trusted_humans: Vec<String>,
    /// Project the key was issued in
    pub key_project_id: Option<String>,
}

impl AdminConfig {
    pub fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE)
    }
}

/// `<config_dir>/gcp-estate`
fn base_dir() -> Result<PathBuf> {
    app_config_dir().ok_or_else(|| Error::Config("cannot determine the config directory".to_string()))
}

fn validate_config_name(name: &str) -> Result<()> {
    // Security: config names become path components
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidArgument(format!(
            "invalid config name '{}' (letters, digits, '-' and '_' only)",
            name
        )));
    }
    Ok(())
}

/// Load and validate the admin configuration `name`
pub fn load_admin_config(name: &str) -> Result<AdminConfig> {
    load_admin_config_from(&base_dir()?, name)
}

/// Same as [`load_admin_config`] with an explicit base directory
pub fn load_admin_config_from(base: &Path, name: &str) -> Result<AdminConfig> {
    validate_config_name(name)?;

    let dir = base.join(name);
    let config_file = dir.join(CONFIG_FILE);
    let key_file = dir.join(KEY_FILE);

    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "configuration directory not found: {} (bootstrap the '{}' config first)",
            dir.display(),
            name
        )));
    }
    if !config_file.is_file() {
        return Err(Error::Config(format!(
            "configuration file not found: {} (incomplete setup)",
            config_file.display()
        )));
    }
    if !key_file.is_file() {
        return Err(Error::Config(format!(
            "service account key not found: {}",
            key_file.display()
        )));
    }

    let content = std::fs::read_to_string(&config_file)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", config_file.display(), e)))?;
    let settings: AdminSettings = serde_yaml::from_str(&content).map_err(|e| {
        Error::Config(format!("cannot parse {}: {}", config_file.display(), e))
    })?;
    let admin_bot = settings.admin_bot.clone().ok_or_else(|| {
        Error::Config(format!("missing 'admin_bot' in {}", config_file.display()))
    })?;

    let key_content = std::fs::read_to_string(&key_file)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", key_file.display(), e)))?;
    let key: Value = serde_json::from_str(&key_content).map_err(|e| {
        Error::Config(format!("invalid service account key {}: {}", key_file.display(), e))
    })?;
    let key_email = key
        .get("client_email")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    if key_email != admin_bot {
        return Err(Error::Config(format!(
            "credential mismatch: config.yaml admin_bot is '{}' but admin.json belongs to '{}'",
            admin_bot, key_email
        )));
    }

    tracing::debug!("Loaded admin config '{}' for {}", name, admin_bot);
    Ok(AdminConfig {
        name: name.to_string(),
        mode: settings.mode,
        admin_bot,
        trusted_humans: settings.trusted_humans,
        key_project_id: key
            .get("project_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        dir,
    })
}

/// Names of the complete admin configurations, sorted
pub fn list_available_configs() -> Vec<String> {
    match base_dir() {
        Ok(base) => list_available_configs_in(&base),
        Err(_) => Vec::new(),
    }
}

pub fn list_available_configs_in(base: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };

    let mut configs: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join(CONFIG_FILE).is_file() && path.join(KEY_FILE).is_file())
        .filter_map(|path| path.file_name()?.to_str().map(|s| s.to_string()))
        .collect();
    configs.sort();
    configs
}

/// What to create with [`AdminSession::create_project`]
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub project_id: String,
    /// Defaults to the project id
    pub display_name: Option<String>,
    /// Defaults to the single open billing account
    pub billing_account_id: Option<String>,
    /// Defaults to [`DEFAULT_PROJECT_APIS`]
    pub apis: Option<Vec<String>>,
}

/// Outcome of [`AdminSession::create_project`]
#[derive(Debug, Clone, Serialize)]
pub struct ManagedProject {
    pub project_id: String,
    pub display_name: String,
    pub state: String,
    pub labels: BTreeMap<String, String>,
    pub billing_account_id: String,
    pub service_account: String,
    /// APIs that could not be enabled; the rest of the setup still succeeded
    pub failed_apis: Vec<String>,
}

/// Client acting as the admin bot
pub struct AdminSession {
    pub config: AdminConfig,
    pub client: GcpClient,
    poll_interval: Duration,
}

impl AdminSession {
    /// Authenticate with the configuration's service account key
    pub fn open(config: AdminConfig) -> Result<Self> {
        let credentials = GcpCredentials::from_service_account_file(&config.key_path())?;
        let client = GcpClient::with_credentials(credentials, Endpoints::google())?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: AdminConfig, client: GcpClient) -> Self {
        Self {
            config,
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Every billing account the admin bot can see, open or closed
    pub async fn list_billing_accounts(&self) -> Result<Vec<BillingAccount>> {
        billing::list_billing_accounts(&self.client, None, false).await
    }

    /// The admin bot's only open billing account
    pub async fn default_billing_account(&self) -> Result<BillingAccount> {
        let accounts = self.list_billing_accounts().await?;
        billing::default_billing_account(&accounts)
    }

    /// Create (or adopt) a managed project
    pub async fn create_project(&self, request: NewProject) -> Result<ManagedProject> {
        if !validate_project_id(&request.project_id) {
            return Err(Error::InvalidArgument(format!(
                "'{}' is not a valid project id",
                request.project_id
            )));
        }

        let project_id = request.project_id.as_str();
        let display_name = request.display_name.as_deref().unwrap_or(project_id);
        let billing_account_id = match request.billing_account_id {
            Some(id) => id,
            None => self.default_billing_account().await?.id,
        };
        let apis: Vec<String> = request.apis.unwrap_or_else(|| {
            DEFAULT_PROJECT_APIS.iter().map(|s| s.to_string()).collect()
        });

        let project = self.create_or_get_project(project_id, display_name).await?;
        self.link_billing(project_id, &billing_account_id).await?;
        let service_account =
            iam::ensure_service_account(&self.client, project_id, ROBOT_ACCOUNT_ID, "Admin Robot")
                .await?;
        self.grant_owners(project_id, &service_account).await?;
        let failed_apis = self.enable_apis(project_id, &apis).await;

        Ok(ManagedProject {
            project_id: project_id.to_string(),
            display_name: project
                .get("displayName")
                .and_then(|v| v.as_str())
                .unwrap_or(display_name)
                .to_string(),
            state: project
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            labels: labels_of(&project),
            billing_account_id,
            service_account,
            failed_apis,
        })
    }

    async fn create_or_get_project(&self, project_id: &str, display_name: &str) -> Result<Value> {
        let name = format!("projects/{}", project_id);
        let (label_key, label_value) = MANAGED_BY_LABEL;

        match self.client.get(&self.client.resourcemanager_url(&name)).await {
            Ok(existing) => {
                let state = existing
                    .get("state")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if state != "ACTIVE" {
                    return Err(Error::UnsupportedOperation(format!(
                        "project {} exists but is not ACTIVE (state: {})",
                        project_id, state
                    )));
                }

                let mut labels = labels_of(&existing);
                if labels.contains_key(label_key) {
                    return Ok(existing);
                }

                labels.insert(label_key.to_string(), label_value.to_string());
                let url = format!("{}?updateMask=labels", self.client.resourcemanager_url(&name));
                let operation = self.client.patch(&url, &json!({ "labels": labels })).await?;
                let done = self.wait(OperationApi::ResourceManager, operation, DEFAULT_OPERATION_TIMEOUT).await?;
                tracing::info!("Labelled existing project {}", project_id);
                Ok(done.get("response").cloned().unwrap_or(existing))
            },
            // 403 is what Resource Manager answers for projects that do not exist
            Err(e) if e.is_missing() => {
                let body = json!({
                    "projectId": project_id,
                    "displayName": display_name,
                    "labels": { label_key: label_value },
                });
                let operation = self
                    .client
                    .post(&self.client.resourcemanager_url("projects"), Some(&body))
                    .await?;
                let done = self.wait(OperationApi::ResourceManager, operation, DEFAULT_OPERATION_TIMEOUT).await?;
                tracing::info!("Created project {}", project_id);
                Ok(done.get("response").cloned().unwrap_or(body))
            },
            Err(e) => Err(e),
        }
    }

    async fn link_billing(&self, project_id: &str, billing_account_id: &str) -> Result<()> {
        let wanted = format!("billingAccounts/{}", billing_account_id);
        let url = self
            .client
            .billing_url(&format!("projects/{}/billingInfo", project_id));

        match self.client.get(&url).await {
            Ok(info) => {
                let linked = info.get("billingAccountName").and_then(|v| v.as_str()) == Some(&wanted);
                let enabled = info
                    .get("billingEnabled")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if linked && enabled {
                    tracing::debug!("{} already billed to {}", project_id, wanted);
                    return Ok(());
                }
            },
            Err(e) => tracing::debug!("Could not read billing info of {}: {}", project_id, e),
        }

        billing::update_project_billing(&self.client, project_id, Some(billing_account_id)).await?;
        Ok(())
    }

    async fn grant_owners(&self, project_id: &str, service_account: &str) -> Result<()> {
        let resource = format!("projects/{}", project_id);
        let mut members = vec![format!("serviceAccount:{}", service_account)];
        for human in &self.config.trusted_humans {
            members.push(iam::user_member(human)?);
        }

        let mut policy = iam::get_iam_policy(&self.client, &resource).await?;
        let mut changed = false;
        for member in &members {
            changed |= policy.add_member_roles(member, &[OWNER_ROLE]);
        }

        if changed {
            policy.version = policy.version.max(3);
            iam::set_iam_policy(&self.client, &resource, &policy).await?;
            tracing::info!("Granted {} to {} member(s) on {}", OWNER_ROLE, members.len(), resource);
        }
        Ok(())
    }

    /// Enable each API, returning the ones that failed
    async fn enable_apis(&self, project_id: &str, apis: &[String]) -> Vec<String> {
        let mut failed = Vec::new();

        for api in apis {
            let name = format!("projects/{}/services/{}", project_id, api);
            if let Ok(service) = self.client.get(&self.client.serviceusage_url(&name)).await {
                if service.get("state").and_then(|v| v.as_str()) == Some("ENABLED") {
                    continue;
                }
            }

            let result = async {
                let url = self.client.serviceusage_url(&format!("{}:enable", name));
                let operation = self.client.post(&url, None).await?;
                self.wait(OperationApi::ServiceUsage, operation, DEFAULT_ENABLE_TIMEOUT).await
            }
            .await;

            if let Err(e) = result {
                tracing::warn!("Could not enable {} on {}: {}", api, project_id, e);
                failed.push(api.clone());
            }
        }

        failed
    }

    async fn wait(&self, api: OperationApi, operation: Value, timeout: Duration) -> Result<Value> {
        wait_for_operation(&self.client, api, operation, timeout, self.poll_interval).await
    }
}

fn labels_of(project: &Value) -> BTreeMap<String, String> {
    project
        .get("labels")
        .and_then(|v| v.as_object())
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
