//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use crate::error::Result;
use reqwest::Method;
use serde_json::Value;

/// Base URLs of the Google APIs the client talks to
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub resourcemanager: String,
    pub billing: String,
    pub iam: String,
    pub serviceusage: String,
    pub oauth2: String,
}

impl Endpoints {
    /// Public Google endpoints
    pub fn google() -> Self {
        Self {
            resourcemanager: "https://cloudresourcemanager.googleapis.com".to_string(),
            billing: "https://cloudbilling.googleapis.com".to_string(),
            iam: "https://iam.googleapis.com".to_string(),
            serviceusage: "https://serviceusage.googleapis.com".to_string(),
            oauth2: "https://oauth2.googleapis.com".to_string(),
        }
    }

    /// Route every service to one base URL (mock servers, private gateways)
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            resourcemanager: base.clone(),
            billing: base.clone(),
            iam: base.clone(),
            serviceusage: base.clone(),
            oauth2: base,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::google()
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub endpoints: Endpoints,
}

impl GcpClient {
    /// Create a client using Application Default Credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new().await?;
        Self::with_credentials(credentials, Endpoints::google())
    }

    /// Create a client from explicit credentials and endpoints
    pub fn with_credentials(credentials: GcpCredentials, endpoints: Endpoints) -> Result<Self> {
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            endpoints,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        self.get_with_query(url, &[]).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token, query).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.send(Method::POST, url, &token, body).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.send(Method::PATCH, url, &token, Some(body)).await
    }

    /// Make a PUT request to a GCP API
    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.send(Method::PUT, url, &token, Some(body)).await
    }

    /// Fetch every page of a list call and return the items under `items_field`
    ///
    /// Follows `nextPageToken` until the API stops returning one, so callers
    /// never see a partial listing.
    pub async fn list_all(
        &self,
        url: &str,
        query: &[(&str, &str)],
        items_field: &str,
    ) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> = query.to_vec();
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self.get_with_query(url, &params).await?;
            if let Some(items) = response.get(items_field).and_then(|v| v.as_array()) {
                all_items.extend(items.iter().cloned());
            }

            match response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .filter(|t| !t.is_empty())
            {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }

        tracing::debug!("Listed {} {} from {}", all_items.len(), items_field, url);
        Ok(all_items)
    }

    // =========================================================================
    // Resource Manager API helpers
    // =========================================================================

    /// Build Resource Manager v3 API URL
    pub fn resourcemanager_url(&self, path: &str) -> String {
        format!("{}/v3/{}", self.endpoints.resourcemanager, path)
    }

    /// Build Resource Manager v1 API URL (legacy project listing)
    pub fn resourcemanager_v1_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoints.resourcemanager, path)
    }

    // =========================================================================
    // Billing, IAM and Service Usage API helpers
    // =========================================================================

    /// Build Cloud Billing API URL
    pub fn billing_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoints.billing, path)
    }

    /// Build IAM API URL
    pub fn iam_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoints.iam, path)
    }

    /// Build Service Usage API URL
    pub fn serviceusage_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoints.serviceusage, path)
    }

    /// Email of the identity behind the current token
    pub async fn get_email(&self) -> Result<String> {
        let token = self.get_token().await?;
        let url = format!("{}/tokeninfo", self.endpoints.oauth2);
        let info = self.http.get(&url, &token, &[("access_token", &token)]).await?;

        info.get("email")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                crate::error::Error::not_found("email claim in the access token")
            })
    }
}

/// Last path segment of a resource name ("folders/123" -> "123")
pub fn short_name(resource_name: &str) -> &str {
    resource_name.rsplit('/').next().unwrap_or(resource_name)
}
