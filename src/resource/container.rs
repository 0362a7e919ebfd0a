//! Containers: organizations, folders and the "no organization" bucket
//!
//! Listing and navigation go through a [`ResourceDirectory`] so they can run
//! against the REST client or an in-memory fake. Mutations (folder and
//! project creation, IAM grants) need the concrete [`GcpClient`].

use super::billing::{self, BillingAccount};
use super::directory::ResourceDirectory;
use super::iam::{self, IamPolicy, Role};
use super::project::Project;
use crate::error::{Error, Result};
use crate::gcp::auth::validate_project_id;
use crate::gcp::client::{short_name, GcpClient};
use crate::gcp::operations::{
    wait_for_operation, OperationApi, DEFAULT_OPERATION_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
use futures::future::BoxFuture;
use futures::stream::{self, Stream};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Resource name reported for the "no organization" container
pub const NO_ORG_RESOURCE_NAME: &str = "NO_ORG";

const NO_ORG_DISPLAY_NAME: &str = "No Organization";

/// Roles granted by [`Organization::add_user_as_owner`]
pub const ORGANIZATION_OWNER_ROLES: &[&str] = &[
    "roles/billing.admin",
    "roles/billing.costsManager",
    "roles/billing.projectManager",
    "roles/iam.securityAdmin",
    "roles/orgpolicy.policyAdmin",
    "roles/resourcemanager.folderAdmin",
    "roles/resourcemanager.organizationAdmin",
    "roles/resourcemanager.projectCreator",
    "roles/resourcemanager.projectDeleter",
    "roles/resourcemanager.projectIamAdmin",
];

fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(|v| v.as_str()).unwrap_or_default()
}

/// A Google Cloud organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub id: String,
    pub resource_name: String,
    pub display_name: String,
}

impl Organization {
    pub(crate) fn from_api(value: &Value) -> Self {
        let resource_name = str_field(value, "name").to_string();
        Self {
            id: short_name(&resource_name).to_string(),
            display_name: str_field(value, "displayName").to_string(),
            resource_name,
        }
    }

    /// Fetch an organization by numeric id
    pub async fn lookup<D>(dir: &D, org_id: &str) -> Result<Self>
    where
        D: ResourceDirectory + ?Sized,
    {
        let org_id = org_id.trim_start_matches("organizations/");
        dir.get_organization(&format!("organizations/{}", org_id))
            .await
    }

    /// Grant `roles` on this organization to a user
    pub async fn add_user_roles(
        &self,
        client: &GcpClient,
        user_email: &str,
        roles: &[&str],
    ) -> Result<IamPolicy> {
        let member = iam::user_member(user_email)?;
        iam::add_member_roles(client, &self.resource_name, &member, roles).await
    }

    /// Grant the standard set of organization administration roles
    pub async fn add_user_as_owner(&self, client: &GcpClient, user_email: &str) -> Result<IamPolicy> {
        self.add_user_roles(client, user_email, ORGANIZATION_OWNER_ROLES)
            .await
    }
}

/// A folder inside an organization or another folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub id: String,
    pub resource_name: String,
    pub display_name: String,
    pub parent_resource_name: String,
}

impl Folder {
    /// Build from a CRM v3 folder; `parent` is used when the payload omits it
    pub(crate) fn from_api(value: &Value, parent: &str) -> Self {
        let resource_name = str_field(value, "name").to_string();
        let parent_resource_name = match str_field(value, "parent") {
            "" => parent,
            p => p,
        };
        Self {
            id: short_name(&resource_name).to_string(),
            display_name: str_field(value, "displayName").to_string(),
            parent_resource_name: parent_resource_name.to_string(),
            resource_name,
        }
    }

    /// Resolve the parent organization or folder
    pub async fn parent<D>(&self, dir: &D) -> Result<Option<Container>>
    where
        D: ResourceDirectory + ?Sized,
    {
        let parent = self.parent_resource_name.as_str();
        if parent.starts_with("organizations/") {
            Ok(Some(Container::Organization(
                dir.get_organization(parent).await?,
            )))
        } else if parent.starts_with("folders/") {
            Ok(Some(Container::Folder(dir.get_folder(parent).await?)))
        } else {
            Ok(None)
        }
    }
}

/// A node of the resource hierarchy that can hold projects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Container {
    Organization(Organization),
    Folder(Folder),
    /// Projects whose parent is neither an organization nor a folder
    NoOrganization,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.resource_name())
    }
}

impl From<Organization> for Container {
    fn from(org: Organization) -> Self {
        Self::Organization(org)
    }
}

impl From<Folder> for Container {
    fn from(folder: Folder) -> Self {
        Self::Folder(folder)
    }
}

enum Frame {
    /// List the container's own projects
    Visit(Container),
    /// Queue the container's child folders
    Descend(Container),
}

struct Walk<'a, D: ?Sized> {
    dir: &'a D,
    active_only: bool,
    stack: Vec<Frame>,
    ready: VecDeque<Project>,
}

impl<'a, D> Walk<'a, D>
where
    D: ResourceDirectory + ?Sized,
{
    async fn next(mut self) -> Result<Option<(Project, Self)>> {
        loop {
            if let Some(project) = self.ready.pop_front() {
                return Ok(Some((project, self)));
            }

            match self.stack.pop() {
                None => return Ok(None),
                Some(Frame::Visit(container)) => {
                    let active_only = self.active_only;
                    let projects = container.list_child_projects(self.dir).await?;
                    self.ready.extend(
                        projects
                            .into_iter()
                            .filter(|p| !active_only || p.is_active()),
                    );
                    self.stack.push(Frame::Descend(container));
                },
                Some(Frame::Descend(container)) => {
                    let folders = container.list_child_folders(self.dir).await?;
                    // reversed so the first listed folder is popped first
                    self.stack.extend(
                        folders
                            .into_iter()
                            .rev()
                            .map(|f| Frame::Visit(Container::Folder(f))),
                    );
                },
            }
        }
    }
}

impl Container {
    /// Numeric id; empty for `NoOrganization`
    pub fn id(&self) -> &str {
        match self {
            Self::Organization(org) => &org.id,
            Self::Folder(folder) => &folder.id,
            Self::NoOrganization => "",
        }
    }

    pub fn resource_name(&self) -> &str {
        match self {
            Self::Organization(org) => &org.resource_name,
            Self::Folder(folder) => &folder.resource_name,
            Self::NoOrganization => NO_ORG_RESOURCE_NAME,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Organization(org) => &org.display_name,
            Self::Folder(folder) => &folder.display_name,
            Self::NoOrganization => NO_ORG_DISPLAY_NAME,
        }
    }

    /// False only for `NoOrganization`
    pub fn is_real(&self) -> bool {
        !matches!(self, Self::NoOrganization)
    }

    /// Direct child folders
    pub async fn list_child_folders<D>(&self, dir: &D) -> Result<Vec<Folder>>
    where
        D: ResourceDirectory + ?Sized,
    {
        match self {
            Self::NoOrganization => Ok(Vec::new()),
            _ => dir.list_folders(self.resource_name()).await,
        }
    }

    /// Direct child projects, any lifecycle state
    pub async fn list_child_projects<D>(&self, dir: &D) -> Result<Vec<Project>>
    where
        D: ResourceDirectory + ?Sized,
    {
        match self {
            Self::NoOrganization => dir.list_projects_without_parent().await,
            _ => dir.list_projects(self).await,
        }
    }

    /// Parent container; `None` for roots
    pub async fn parent<D>(&self, dir: &D) -> Result<Option<Container>>
    where
        D: ResourceDirectory + ?Sized,
    {
        match self {
            Self::Folder(folder) => folder.parent(dir).await,
            Self::Organization(_) | Self::NoOrganization => Ok(None),
        }
    }

    /// Every project below this container, depth-first pre-order.
    ///
    /// A container's own projects come before those of its child folders,
    /// and folders are visited in listing order. With `active_only` only
    /// `ACTIVE` projects are yielded, but folders are always descended.
    /// The stream is lazy: nothing is fetched until it is polled, and each
    /// call starts a fresh walk. The first failure is yielded as an error
    /// and ends the stream.
    pub fn walk_projects<'a, D>(
        &self,
        dir: &'a D,
        active_only: bool,
    ) -> impl Stream<Item = Result<Project>> + 'a
    where
        D: ResourceDirectory + ?Sized + 'a,
    {
        let walk = Walk {
            dir,
            active_only,
            stack: vec![Frame::Visit(self.clone())],
            ready: VecDeque::new(),
        };
        stream::try_unfold(walk, Walk::next)
    }

    /// Drain [`Container::walk_projects`] into a vector
    pub async fn collect_projects<D>(&self, dir: &D, active_only: bool) -> Result<Vec<Project>>
    where
        D: ResourceDirectory + ?Sized,
    {
        use futures::TryStreamExt;
        self.walk_projects(dir, active_only).try_collect().await
    }

    /// Follow a slash-separated path of folder display names.
    ///
    /// Leading and trailing slashes are ignored. Each component matches the
    /// first child folder with exactly that display name.
    pub async fn resolve_path<D>(&self, dir: &D, path: &str) -> Result<Folder>
    where
        D: ResourceDirectory + ?Sized,
    {
        if !self.is_real() {
            return Err(Error::UnsupportedOperation(
                "projects without an organization cannot contain folders; \
                 resolve paths from an organization or folder"
                    .to_string(),
            ));
        }

        let clean = path.trim_matches('/');
        if clean.is_empty() {
            return Err(Error::InvalidArgument("path cannot be empty".to_string()));
        }

        let mut current = self.clone();
        let mut resolved = None;

        for component in clean.split('/') {
            let folders = current.list_child_folders(dir).await?;
            let Some(folder) = folders.iter().find(|f| f.display_name == component).cloned()
            else {
                return Err(Error::NotFound {
                    what: format!(
                        "folder '{}' in {}",
                        component,
                        current.display_name()
                    ),
                    available: folders.into_iter().map(|f| f.display_name).collect(),
                });
            };

            tracing::debug!("{} -> {}", component, folder.resource_name);
            current = Container::Folder(folder.clone());
            resolved = Some(folder);
        }

        resolved.ok_or_else(|| Error::InvalidArgument("path cannot be empty".to_string()))
    }

    /// Alias of [`Container::resolve_path`]
    pub async fn cd<D>(&self, dir: &D, path: &str) -> Result<Folder>
    where
        D: ResourceDirectory + ?Sized,
    {
        self.resolve_path(dir, path).await
    }

    /// Text rendering of the subtree: folders first, then projects
    pub async fn render_tree<D>(&self, dir: &D) -> Result<String>
    where
        D: ResourceDirectory + ?Sized,
    {
        let mut lines = vec![self.to_string()];
        render_children(self, dir, String::new(), &mut lines).await?;
        Ok(lines.join("\n"))
    }

    /// Create a folder directly below this container
    pub async fn create_folder(&self, client: &GcpClient, display_name: &str) -> Result<Folder> {
        if !self.is_real() {
            return Err(Error::UnsupportedOperation(
                "projects without an organization cannot contain folders; \
                 create the folder under an organization or folder"
                    .to_string(),
            ));
        }
        if display_name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "folder display name cannot be empty".to_string(),
            ));
        }

        let body = json!({
            "displayName": display_name,
            "parent": self.resource_name(),
        });
        let operation = client
            .post(&client.resourcemanager_url("folders"), Some(&body))
            .await?;
        let done = wait_for_operation(
            client,
            OperationApi::ResourceManager,
            operation,
            DEFAULT_OPERATION_TIMEOUT,
            Duration::from_secs(1),
        )
        .await?;

        let response = done.get("response").cloned().unwrap_or(Value::Null);
        if str_field(&response, "name").is_empty() {
            return Err(Error::DataUnavailable(
                "folder create operation returned no folder".to_string(),
            ));
        }

        let mut folder = Folder::from_api(&response, self.resource_name());
        if folder.display_name.is_empty() {
            folder.display_name = display_name.to_string();
        }
        tracing::info!("Created folder {} ({})", folder.display_name, folder.resource_name);
        Ok(folder)
    }

    /// Create a project below this container and optionally link billing.
    ///
    /// `NoOrganization` creates a project without a parent.
    pub async fn create_project(
        &self,
        client: &GcpClient,
        project_id: &str,
        display_name: &str,
        billing_account: Option<&BillingAccount>,
        timeout: Duration,
    ) -> Result<Project> {
        if !validate_project_id(project_id) {
            return Err(Error::InvalidArgument(format!(
                "'{}' is not a valid project id (6-30 lowercase letters, digits, hyphens)",
                project_id
            )));
        }

        let mut body = json!({
            "projectId": project_id,
            "displayName": display_name,
        });
        if self.is_real() {
            body["parent"] = json!(self.resource_name());
        }

        let operation = client
            .post(&client.resourcemanager_url("projects"), Some(&body))
            .await?;
        let done = wait_for_operation(
            client,
            OperationApi::ResourceManager,
            operation,
            timeout,
            DEFAULT_POLL_INTERVAL,
        )
        .await?;

        let project = match done.get("response") {
            Some(response) if response.get("projectId").is_some() => {
                Project::from_api(response, self.clone())
            },
            _ => Project {
                id: project_id.to_string(),
                name: display_name.to_string(),
                project_number: String::new(),
                lifecycle_state: String::new(),
                parent: self.clone(),
            },
        };

        if let Some(account) = billing_account {
            project.update_billing_account(client, Some(&account.id)).await?;
        }

        tracing::info!("Created project {} under {}", project.id, self.resource_name());
        Ok(project)
    }

    /// Billing accounts scoped to this organization, or every visible
    /// account for `NoOrganization`
    pub async fn billing_accounts(
        &self,
        client: &GcpClient,
        open_only: bool,
    ) -> Result<Vec<BillingAccount>> {
        match self {
            Self::Organization(org) => {
                billing::list_billing_accounts(client, Some(&org.resource_name), open_only).await
            },
            Self::NoOrganization => billing::list_billing_accounts(client, None, open_only).await,
            Self::Folder(_) => Err(Error::UnsupportedOperation(
                "billing accounts are scoped to organizations, not folders".to_string(),
            )),
        }
    }

    /// Roles bound directly to a user on this container
    pub async fn list_roles(&self, client: &GcpClient, user_email: Option<&str>) -> Result<Vec<Role>> {
        if !self.is_real() {
            return Err(Error::UnsupportedOperation(
                "projects without an organization have no container IAM policy".to_string(),
            ));
        }
        iam::list_roles(client, self.resource_name(), user_email).await
    }
}

fn branch(last: bool) -> &'static str {
    if last {
        "└── "
    } else {
        "├── "
    }
}

fn render_children<'a, D>(
    container: &'a Container,
    dir: &'a D,
    prefix: String,
    lines: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<()>>
where
    D: ResourceDirectory + ?Sized + 'a,
{
    async move {
        let folders = container.list_child_folders(dir).await?;
        let projects = container.list_child_projects(dir).await?;
        let total = folders.len() + projects.len();
        let folder_count = folders.len();

        for (idx, folder) in folders.into_iter().enumerate() {
            let last = idx + 1 == total;
            lines.push(format!(
                "{}{}{} ({})",
                prefix,
                branch(last),
                folder.display_name,
                folder.resource_name
            ));
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            let child = Container::Folder(folder);
            render_children(&child, dir, child_prefix, lines).await?;
        }

        for (idx, project) in projects.iter().enumerate() {
            let last = folder_count + idx + 1 == total;
            lines.push(format!(
                "{}{}{} ({})",
                prefix,
                branch(last),
                project.id,
                project.lifecycle_state
            ));
        }

        Ok(())
    }
    .boxed()
}

/// Organizations visible to the caller, plus `NoOrganization` when some
/// projects sit outside any organization
pub async fn list_organizations(client: &GcpClient) -> Result<Vec<Container>> {
    let url = client.resourcemanager_url("organizations:search");
    let items = client.list_all(&url, &[], "organizations").await?;

    let mut containers: Vec<Container> = items
        .iter()
        .map(|o| Container::Organization(Organization::from_api(o)))
        .collect();

    if !client.list_projects_without_parent().await?.is_empty() {
        containers.push(Container::NoOrganization);
    }

    Ok(containers)
}
