//! Cloud Billing accounts

use crate::error::{Error, Result};
use crate::gcp::client::{short_name, GcpClient};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BillingStatus {
    Open,
    Closed,
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A billing account; a closed account is still an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingAccount {
    /// "012345-567890-ABCDEF"
    pub id: String,
    pub display_name: String,
    pub status: BillingStatus,
}

impl BillingAccount {
    pub(crate) fn from_api(value: &Value) -> Self {
        let name = value.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        let id = short_name(name).to_string();
        let open = value.get("open").and_then(|v| v.as_bool()).unwrap_or(false);

        Self {
            display_name: value
                .get("displayName")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| id.clone()),
            id,
            status: if open {
                BillingStatus::Open
            } else {
                BillingStatus::Closed
            },
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == BillingStatus::Open
    }

    /// "billingAccounts/<id>"
    pub fn resource_name(&self) -> String {
        format!("billingAccounts/{}", self.id)
    }
}

/// List billing accounts, optionally scoped to an organization
pub async fn list_billing_accounts(
    client: &GcpClient,
    parent: Option<&str>,
    open_only: bool,
) -> Result<Vec<BillingAccount>> {
    let url = client.billing_url("billingAccounts");
    let query: Vec<(&str, &str)> = parent.map(|p| ("parent", p)).into_iter().collect();
    let items = client.list_all(&url, &query, "billingAccounts").await?;

    Ok(items
        .iter()
        .map(BillingAccount::from_api)
        .filter(|account| !open_only || account.is_open())
        .collect())
}

pub async fn get_billing_account(client: &GcpClient, billing_account_id: &str) -> Result<BillingAccount> {
    let name = format!("billingAccounts/{}", short_name(billing_account_id));
    let value = client.get(&client.billing_url(&name)).await?;
    Ok(BillingAccount::from_api(&value))
}

/// Billing account linked to a project; `None` when billing is disabled
pub async fn project_billing_account(
    client: &GcpClient,
    project_id: &str,
) -> Result<Option<BillingAccount>> {
    let url = client.billing_url(&format!("projects/{}/billingInfo", project_id));
    let info = client.get(&url).await?;

    let enabled = info
        .get("billingEnabled")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let account_name = info
        .get("billingAccountName")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    if !enabled || account_name.is_empty() {
        return Ok(None);
    }

    get_billing_account(client, account_name).await.map(Some)
}

/// Point a project at a billing account; `None` detaches billing
pub async fn update_project_billing(
    client: &GcpClient,
    project_id: &str,
    billing_account_id: Option<&str>,
) -> Result<Value> {
    let account_name = billing_account_id
        .map(|id| format!("billingAccounts/{}", short_name(id)))
        .unwrap_or_default();
    let url = client.billing_url(&format!("projects/{}/billingInfo", project_id));

    tracing::info!(
        "Setting billing account of {} to '{}'",
        project_id,
        account_name
    );
    client
        .put(&url, &json!({ "billingAccountName": account_name }))
        .await
}

/// The single open account among `accounts`
pub fn default_billing_account(accounts: &[BillingAccount]) -> Result<BillingAccount> {
    let open: Vec<&BillingAccount> = accounts.iter().filter(|a| a.is_open()).collect();

    match open.as_slice() {
        [] => Err(Error::not_found("open billing account")),
        [only] => Ok((*only).clone()),
        several => Err(Error::Ambiguous {
            query: "default billing account".to_string(),
            candidates: several
                .iter()
                .map(|a| format!("{} ({})", a.display_name, a.id))
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, open: bool) -> BillingAccount {
        BillingAccount {
            id: id.to_string(),
            display_name: format!("Account {}", id),
            status: if open {
                BillingStatus::Open
            } else {
                BillingStatus::Closed
            },
        }
    }

    #[test]
    fn test_from_api() {
        let value = json!({
            "name": "billingAccounts/AAAAAA-BBBBBB-CCCCCC",
            "displayName": "Main",
            "open": true
        });
        let account = BillingAccount::from_api(&value);
        assert_eq!(account.id, "AAAAAA-BBBBBB-CCCCCC");
        assert_eq!(account.display_name, "Main");
        assert!(account.is_open());

        let closed = BillingAccount::from_api(&json!({"name": "billingAccounts/X"}));
        assert_eq!(closed.display_name, "X");
        assert_eq!(closed.status, BillingStatus::Closed);
        assert_eq!(closed.status.to_string(), "CLOSED");
    }

    #[test]
    fn test_default_billing_account_single_open() {
        let accounts = vec![account("a", false), account("b", true)];
        assert_eq!(default_billing_account(&accounts).unwrap().id, "b");
    }

    #[test]
    fn test_default_billing_account_none_open() {
        let accounts = vec![account("a", false)];
        assert!(matches!(
            default_billing_account(&accounts),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_default_billing_account_several_open() {
        let accounts = vec![account("a", true), account("b", true)];
        match default_billing_account(&accounts) {
            Err(Error::Ambiguous { candidates, .. }) => {
                assert_eq!(candidates, vec!["Account a (a)", "Account b (b)"]);
            },
            other => panic!("unexpected: {:?}", other),
        }
    }
}
