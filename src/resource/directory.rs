//! Resource directory
//!
//! The listing/get primitives the container tree is built on. `GcpClient`
//! implements them against Cloud Resource Manager; tests plug in an
//! in-memory directory.

use super::container::{Container, Folder, Organization};
use super::project::Project;
use crate::error::Result;
use crate::gcp::client::GcpClient;
use async_trait::async_trait;
use serde_json::Value;

/// Remote directory of organizations, folders and projects
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Direct child folders of `parent` ("organizations/1", "folders/2")
    async fn list_folders(&self, parent: &str) -> Result<Vec<Folder>>;

    /// Direct child projects of `parent`, each carrying `parent` as snapshot
    async fn list_projects(&self, parent: &Container) -> Result<Vec<Project>>;

    /// Projects with neither an organization nor a folder as parent
    async fn list_projects_without_parent(&self) -> Result<Vec<Project>>;

    async fn get_organization(&self, resource_name: &str) -> Result<Organization>;

    async fn get_folder(&self, resource_name: &str) -> Result<Folder>;
}

/// Parent types that place a project inside the hierarchy
const HIERARCHY_PARENT_TYPES: &[&str] = &["organization", "folder"];

fn has_hierarchy_parent(project: &Value) -> bool {
    project
        .get("parent")
        .and_then(|p| p.get("type"))
        .and_then(|t| t.as_str())
        .map(|t| HIERARCHY_PARENT_TYPES.contains(&t))
        .unwrap_or(false)
}

#[async_trait]
impl ResourceDirectory for GcpClient {
    async fn list_folders(&self, parent: &str) -> Result<Vec<Folder>> {
        let url = self.resourcemanager_url("folders");
        let items = self.list_all(&url, &[("parent", parent)], "folders").await?;

        Ok(items
            .iter()
            .map(|f| Folder::from_api(f, parent))
            .collect())
    }

    async fn list_projects(&self, parent: &Container) -> Result<Vec<Project>> {
        if !parent.is_real() {
            return self.list_projects_without_parent().await;
        }

        let url = self.resourcemanager_url("projects");
        let items = self
            .list_all(&url, &[("parent", parent.resource_name())], "projects")
            .await?;

        Ok(items
            .iter()
            .map(|p| Project::from_api(p, parent.clone()))
            .collect())
    }

    async fn list_projects_without_parent(&self) -> Result<Vec<Project>> {
        // v3 can only list by parent; v1 lists everything visible
        let url = self.resourcemanager_v1_url("projects");
        let items = self.list_all(&url, &[], "projects").await?;

        let projects: Vec<Project> = items
            .iter()
            .filter(|p| !has_hierarchy_parent(p))
            .map(|p| Project::from_api(p, Container::NoOrganization))
            .collect();

        tracing::debug!(
            "{} of {} visible projects have no organization",
            projects.len(),
            items.len()
        );
        Ok(projects)
    }

    async fn get_organization(&self, resource_name: &str) -> Result<Organization> {
        let value = self.get(&self.resourcemanager_url(resource_name)).await?;
        Ok(Organization::from_api(&value))
    }

    async fn get_folder(&self, resource_name: &str) -> Result<Folder> {
        let value = self.get(&self.resourcemanager_url(resource_name)).await?;
        let parent = value
            .get("parent")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(Folder::from_api(&value, &parent))
    }
}
