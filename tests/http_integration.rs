//! Integration tests for the REST client using wiremock
//!
//! Every Google endpoint is routed to one mock server, so these tests cover
//! URL layout, pagination, error mapping and the read-modify-write flows
//! end to end.

use gcp_estate::admin::{AdminConfig, AdminSession, NewProject};
use gcp_estate::gcp::http::format_gcp_error;
use gcp_estate::gcp::operations::{wait_for_operation, OperationApi};
use gcp_estate::resource::{billing, iam};
use gcp_estate::{
    Container, Endpoints, Error, GcpClient, GcpCredentials, Organization, Project,
    ResourceDirectory,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{
    bearer_token, body_partial_json, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GcpClient {
    GcpClient::with_credentials(
        GcpCredentials::from_static_token("test-token"),
        Endpoints::with_base(&server.uri()),
    )
    .expect("client should build")
}

fn org_one() -> Container {
    Container::Organization(Organization {
        id: "1".to_string(),
        resource_name: "organizations/1".to_string(),
        display_name: "example.com".to_string(),
    })
}

async fn mount_folders(server: &MockServer, parent: &str, folders: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v3/folders"))
        .and(query_param("parent", parent))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "folders": folders })))
        .mount(server)
        .await;
}

async fn mount_projects(server: &MockServer, parent: &str, projects: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v3/projects"))
        .and(query_param("parent", parent))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "projects": projects })))
        .mount(server)
        .await;
}

/// Listing and pagination
mod directory_tests {
    use super::*;

    /// Every page is fetched and items keep their order
    #[tokio::test]
    async fn test_list_folders_drains_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v3/folders"))
            .and(query_param("parent", "organizations/1"))
            .and(query_param_is_missing("pageToken"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "folders": [{"name": "folders/10", "displayName": "team", "parent": "organizations/1"}],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v3/folders"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "folders": [{"name": "folders/11", "displayName": "shared", "parent": "organizations/1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let folders = client.list_folders("organizations/1").await.unwrap();

        let names: Vec<&str> = folders.iter().map(|f| f.display_name.as_str()).collect();
        assert_eq!(names, vec!["team", "shared"]);
        assert_eq!(folders[1].id, "11");
    }

    /// Projects listed under a container carry it as their parent
    #[tokio::test]
    async fn test_list_projects_attaches_parent() {
        let server = MockServer::start().await;
        mount_projects(
            &server,
            "organizations/1",
            json!([{
                "name": "projects/111",
                "projectId": "alpha-prod",
                "displayName": "Alpha",
                "state": "ACTIVE",
                "parent": "organizations/1"
            }]),
        )
        .await;

        let client = client_for(&server);
        let projects = client.list_projects(&org_one()).await.unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, "alpha-prod");
        assert_eq!(projects[0].project_number, "111");
        assert_eq!(projects[0].parent, org_one());
        assert!(projects[0].is_active());
    }

    /// Only projects outside the hierarchy belong to NoOrganization
    #[tokio::test]
    async fn test_projects_without_parent_filters_hierarchy() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [
                    {"projectId": "in-org", "name": "In Org", "projectNumber": "1",
                     "lifecycleState": "ACTIVE", "parent": {"type": "organization", "id": "1"}},
                    {"projectId": "in-folder", "name": "In Folder", "projectNumber": "2",
                     "lifecycleState": "ACTIVE", "parent": {"type": "folder", "id": "10"}},
                    {"projectId": "lonely", "name": "Lonely", "projectNumber": "3",
                     "lifecycleState": "ACTIVE"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let projects = Container::NoOrganization
            .list_child_projects(&client)
            .await
            .unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, "lonely");
        assert_eq!(projects[0].name, "Lonely");
        assert_eq!(projects[0].parent, Container::NoOrganization);
    }

    /// A container's own projects come before those of its folders
    #[tokio::test]
    async fn test_walk_projects_over_rest() {
        let server = MockServer::start().await;
        mount_projects(
            &server,
            "organizations/1",
            json!([{"name": "projects/1", "projectId": "root-app", "state": "ACTIVE"}]),
        )
        .await;
        mount_folders(
            &server,
            "organizations/1",
            json!([{"name": "folders/10", "displayName": "team", "parent": "organizations/1"}]),
        )
        .await;
        mount_projects(
            &server,
            "folders/10",
            json!([
                {"name": "projects/2", "projectId": "team-app", "state": "ACTIVE"},
                {"name": "projects/3", "projectId": "team-old", "state": "DELETE_REQUESTED"}
            ]),
        )
        .await;
        mount_folders(&server, "folders/10", json!([])).await;

        let client = client_for(&server);

        let active = org_one().collect_projects(&client, true).await.unwrap();
        let ids: Vec<&str> = active.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["root-app", "team-app"]);

        let all = org_one().collect_projects(&client, false).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["root-app", "team-app", "team-old"]);
        assert_eq!(all[1].parent.resource_name(), "folders/10");
    }

    /// A failing listing ends the walk with that error
    #[tokio::test]
    async fn test_walk_projects_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/projects"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "The caller does not have permission"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        match org_one().collect_projects(&client, true).await {
            Err(Error::Api { status, .. }) => assert_eq!(status, 403),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

/// Path resolution against the REST client
mod path_tests {
    use super::*;

    async fn mount_tree(server: &MockServer) {
        mount_folders(
            server,
            "organizations/1",
            json!([
                {"name": "folders/10", "displayName": "team", "parent": "organizations/1"},
                {"name": "folders/11", "displayName": "shared", "parent": "organizations/1"}
            ]),
        )
        .await;
        mount_folders(
            server,
            "folders/10",
            json!([{"name": "folders/20", "displayName": "prod", "parent": "folders/10"}]),
        )
        .await;
    }

    #[tokio::test]
    async fn test_resolve_path_ignores_outer_slashes() {
        let server = MockServer::start().await;
        mount_tree(&server).await;

        let client = client_for(&server);
        let folder = org_one().resolve_path(&client, "/team/prod/").await.unwrap();

        assert_eq!(folder.resource_name, "folders/20");
        assert_eq!(folder.parent_resource_name, "folders/10");
    }

    #[tokio::test]
    async fn test_cd_reports_available_siblings() {
        let server = MockServer::start().await;
        mount_tree(&server).await;

        let client = client_for(&server);
        match org_one().cd(&client, "team/dev").await {
            Err(Error::NotFound { what, available }) => {
                assert!(what.contains("dev"));
                assert_eq!(available, vec!["prod"]);
            },
            other => panic!("unexpected: {:?}", other),
        }
    }
}

/// IAM read-modify-write
mod iam_tests {
    use super::*;

    async fn mount_policy(server: &MockServer, resource: &str, policy: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(format!("/v3/{}:getIamPolicy", resource)))
            .and(body_partial_json(json!({"options": {"requestedPolicyVersion": 3}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(policy))
            .mount(server)
            .await;
    }

    /// Nothing is written when the member already holds every role
    #[tokio::test]
    async fn test_add_member_roles_skips_unchanged_policy() {
        let server = MockServer::start().await;
        mount_policy(
            &server,
            "projects/p1",
            json!({
                "version": 1,
                "etag": "BwX1",
                "bindings": [{"role": "roles/viewer", "members": ["user:alice@example.com"]}]
            }),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/v3/projects/p1:setIamPolicy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let policy = iam::add_member_roles(
            &client,
            "projects/p1",
            "user:alice@example.com",
            &["roles/viewer"],
        )
        .await
        .unwrap();

        assert_eq!(policy.roles_of("user:alice@example.com"), vec!["roles/viewer"]);
    }

    /// A new grant is written back with the etag and version 3
    #[tokio::test]
    async fn test_add_member_roles_writes_changed_policy() {
        let server = MockServer::start().await;
        mount_policy(
            &server,
            "folders/10",
            json!({"version": 1, "etag": "BwX1", "bindings": []}),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/v3/folders/10:setIamPolicy"))
            .and(body_partial_json(json!({"policy": {"version": 3, "etag": "BwX1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": 3,
                "etag": "BwX2",
                "bindings": [{"role": "roles/owner", "members": ["user:bob@example.com"]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let policy = iam::add_member_roles(&client, "folders/10", "user:bob@example.com", &["roles/owner"])
            .await
            .unwrap();

        assert_eq!(policy.etag.as_deref(), Some("BwX2"));
        assert_eq!(policy.roles_of("user:bob@example.com"), vec!["roles/owner"]);
    }

    #[tokio::test]
    async fn test_add_member_roles_rejects_bad_input() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        assert!(matches!(
            iam::add_member_roles(&client, "buckets/b1", "user:a@example.com", &["roles/viewer"]).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            iam::add_member_roles(&client, "projects/p1", "user:a@example.com", &[]).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    /// Roles are described through the IAM API, falling back to the bare name
    #[tokio::test]
    async fn test_list_roles_for_explicit_user() {
        let server = MockServer::start().await;
        mount_policy(
            &server,
            "organizations/1",
            json!({
                "version": 3,
                "etag": "e",
                "bindings": [
                    {"role": "roles/browser", "members": ["user:carol@example.com"]},
                    {"role": "organizations/1/roles/custom", "members": ["user:carol@example.com"]},
                    {"role": "roles/owner", "members": ["user:dave@example.com"]}
                ]
            }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v1/roles/browser"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "roles/browser",
                "title": "Browser",
                "description": "Read access to browse the hierarchy"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let roles = org_one()
            .list_roles(&client, Some("carol@example.com"))
            .await
            .unwrap();

        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].title, "Browser");
        assert_eq!(roles[1].name, "organizations/1/roles/custom");
    }
}

/// Long-running operation polling
mod operation_tests {
    use super::*;

    const FAST: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_done_operation_returns_without_polling() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let op = json!({"name": "operations/cf.1", "done": true, "response": {"name": "folders/5"}});
        let done = wait_for_operation(&client, OperationApi::ResourceManager, op, FAST, FAST)
            .await
            .unwrap();
        assert_eq!(done["response"]["name"], "folders/5");
    }

    #[tokio::test]
    async fn test_polls_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/operations/acf.2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/acf.2",
                "done": true,
                "response": {"services": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let op = json!({"name": "operations/acf.2"});
        let done = wait_for_operation(
            &client,
            OperationApi::ServiceUsage,
            op,
            Duration::from_secs(5),
            FAST,
        )
        .await
        .unwrap();
        assert_eq!(done["done"], true);
    }

    #[tokio::test]
    async fn test_operation_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/operations/cp.3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/cp.3",
                "done": true,
                "error": {"code": 6, "message": "project id already taken"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = wait_for_operation(
            &client,
            OperationApi::ResourceManager,
            json!({"name": "operations/cp.3", "done": false}),
            Duration::from_secs(5),
            FAST,
        )
        .await;

        match result {
            Err(Error::OperationFailed { code, message, .. }) => {
                assert_eq!(code, 6);
                assert!(message.contains("already taken"));
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_operation_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/operations/cp.4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/cp.4",
                "done": false
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = wait_for_operation(
            &client,
            OperationApi::ResourceManager,
            json!({"name": "operations/cp.4"}),
            Duration::from_millis(50),
            FAST,
        )
        .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
    }
}

/// API errors and the user-facing messages derived from them
mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_api_error_keeps_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/organizations/999"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "The caller does not have permission",
                    "status": "PERMISSION_DENIED"
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = Organization::lookup(&client, "999").await.unwrap_err();

        match &err {
            Error::Api { status, message } => {
                assert_eq!(*status, 403);
                assert_eq!(message, "The caller does not have permission");
            },
            other => panic!("unexpected: {:?}", other),
        }
        assert!(err.is_missing());
        assert!(format_gcp_error(&err).contains("Permission denied"));
    }

    #[tokio::test]
    async fn test_non_json_error_body_uses_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/folders/1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        match client.get_folder("folders/1").await {
            Err(Error::Api { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            },
            other => panic!("unexpected: {:?}", other),
        }
    }
}

/// Billing
mod billing_tests {
    use super::*;

    #[tokio::test]
    async fn test_project_without_billing_has_no_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/sandbox/billingInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/sandbox/billingInfo",
                "billingAccountName": "",
                "billingEnabled": false
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let account = billing::project_billing_account(&client, "sandbox").await.unwrap();
        assert!(account.is_none());
    }

    #[tokio::test]
    async fn test_project_billing_account_is_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/billed/billingInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "billingAccountName": "billingAccounts/0A-1",
                "billingEnabled": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/billingAccounts/0A-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "billingAccounts/0A-1",
                "displayName": "Main",
                "open": true
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let account = billing::project_billing_account(&client, "billed")
            .await
            .unwrap()
            .expect("billing should be linked");
        assert_eq!(account.id, "0A-1");
        assert!(account.is_open());
    }

    #[tokio::test]
    async fn test_organization_accounts_are_scoped_and_filtered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/billingAccounts"))
            .and(query_param("parent", "organizations/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "billingAccounts": [
                    {"name": "billingAccounts/0A-1", "displayName": "Main", "open": true},
                    {"name": "billingAccounts/0B-2", "displayName": "Old", "open": false}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let open = org_one().billing_accounts(&client, true).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].display_name, "Main");

        let all = org_one().billing_accounts(&client, false).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}

/// Project lookup by id
mod project_tests {
    use super::*;

    async fn mount_search(server: &MockServer, projects: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v3/projects:search"))
            .and(query_param("query", "id:shop-prod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "projects": projects })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_lookup_resolves_folder_parent() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!([{"name": "projects/77", "projectId": "shop-prod", "state": "ACTIVE",
                    "parent": "folders/20", "displayName": "Shop"}]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v3/folders/20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "folders/20", "displayName": "prod", "parent": "folders/10"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let project = Project::lookup(&client, "shop-prod").await.unwrap();

        assert_eq!(project.name, "Shop");
        assert_eq!(project.parent.resource_name(), "folders/20");
        assert_eq!(project.parent.display_name(), "prod");
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let server = MockServer::start().await;
        mount_search(&server, json!([])).await;

        let client = client_for(&server);
        assert!(matches!(
            Project::lookup(&client, "shop-prod").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_ambiguous() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!([
                {"name": "projects/77", "projectId": "shop-prod"},
                {"name": "projects/78", "projectId": "shop-prod"}
            ]),
        )
        .await;

        let client = client_for(&server);
        match Project::lookup(&client, "shop-prod").await {
            Err(Error::Ambiguous { candidates, .. }) => {
                assert_eq!(candidates, vec!["projects/77", "projects/78"]);
            },
            other => panic!("unexpected: {:?}", other),
        }
    }
}

/// Managed project setup with the admin robot
mod admin_tests {
    use super::*;

    fn admin_config() -> AdminConfig {
        AdminConfig {
            name: "work".to_string(),
            dir: std::env::temp_dir().join("gcp-estate-test-work"),
            mode: None,
            admin_bot: "admin-bot@admin.iam.gserviceaccount.com".to_string(),
            trusted_humans: vec!["alice@example.com".to_string()],
            key_project_id: Some("admin".to_string()),
        }
    }

    fn session(server: &MockServer) -> AdminSession {
        AdminSession::with_client(admin_config(), client_for(server))
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_create_project_from_scratch() {
        let server = MockServer::start().await;
        let robot = "admin-robot@new-proj.iam.gserviceaccount.com";

        // Resource Manager answers 403 for unknown projects
        Mock::given(method("GET"))
            .and(path("/v3/projects/new-proj"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "denied"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v3/projects"))
            .and(body_partial_json(json!({
                "projectId": "new-proj",
                "labels": {"managed-by": "gcp-estate"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/cp.9",
                "done": true,
                "response": {
                    "projectId": "new-proj",
                    "displayName": "New Project",
                    "state": "ACTIVE",
                    "labels": {"managed-by": "gcp-estate"}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/new-proj/billingInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"billingEnabled": false})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/projects/new-proj/billingInfo"))
            .and(body_partial_json(json!({"billingAccountName": "billingAccounts/0A-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"billingEnabled": true})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/new-proj/serviceAccounts/admin-robot%40new-proj.iam.gserviceaccount.com"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "not found"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/new-proj/serviceAccounts"))
            .and(body_partial_json(json!({"accountId": "admin-robot"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": robot})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v3/projects/new-proj:getIamPolicy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"etag": "e1", "bindings": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v3/projects/new-proj:setIamPolicy"))
            .and(body_partial_json(json!({"policy": {"etag": "e1", "version": 3}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/projects/new-proj/services/firestore.googleapis.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "DISABLED"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/new-proj/services/firestore.googleapis.com:enable"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"code": 500, "message": "backend error"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/new-proj/services/storage.googleapis.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "ENABLED"})))
            .mount(&server)
            .await;

        let managed = session(&server)
            .create_project(NewProject {
                project_id: "new-proj".to_string(),
                display_name: Some("New Project".to_string()),
                billing_account_id: Some("0A-1".to_string()),
                apis: Some(vec![
                    "firestore.googleapis.com".to_string(),
                    "storage.googleapis.com".to_string(),
                ]),
            })
            .await
            .unwrap();

        assert_eq!(managed.state, "ACTIVE");
        assert_eq!(managed.labels["managed-by"], "gcp-estate");
        assert_eq!(managed.service_account, robot);
        assert_eq!(managed.failed_apis, vec!["firestore.googleapis.com"]);
    }

    #[tokio::test]
    async fn test_inactive_existing_project_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/projects/old-proj"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projectId": "old-proj",
                "state": "DELETE_REQUESTED"
            })))
            .mount(&server)
            .await;

        let result = session(&server)
            .create_project(NewProject {
                project_id: "old-proj".to_string(),
                billing_account_id: Some("0A-1".to_string()),
                apis: Some(Vec::new()),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(Error::UnsupportedOperation(_))));
    }

    #[tokio::test]
    async fn test_invalid_project_id_is_rejected_before_any_call() {
        let server = MockServer::start().await;
        let result = session(&server)
            .create_project(NewProject {
                project_id: "Bad_Id".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}

/// Folder and project creation, Service Usage
mod mutation_tests {
    use super::*;
    use gcp_estate::resource::REQUIRED_APIS;

    #[tokio::test]
    async fn test_create_folder_returns_new_folder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/folders"))
            .and(body_partial_json(json!({"displayName": "sandbox", "parent": "organizations/1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/cf.1",
                "done": true,
                "response": {"name": "folders/30", "displayName": "sandbox", "parent": "organizations/1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let folder = org_one().create_folder(&client, "sandbox").await.unwrap();
        assert_eq!(folder.resource_name, "folders/30");
        assert_eq!(folder.parent_resource_name, "organizations/1");
    }

    #[tokio::test]
    async fn test_no_organization_cannot_hold_folders() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        assert!(matches!(
            Container::NoOrganization.create_folder(&client, "sandbox").await,
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_project_without_parent_links_billing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/projects"))
            .and(body_partial_json(json!({"projectId": "solo-proj", "displayName": "Solo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/cp.5",
                "done": true,
                "response": {"name": "projects/55", "projectId": "solo-proj",
                             "displayName": "Solo", "state": "ACTIVE"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/projects/solo-proj/billingInfo"))
            .and(body_partial_json(json!({"billingAccountName": "billingAccounts/0A-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"billingEnabled": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let account = gcp_estate::BillingAccount {
            id: "0A-1".to_string(),
            display_name: "Main".to_string(),
            status: gcp_estate::resource::BillingStatus::Open,
        };
        let project = Container::NoOrganization
            .create_project(&client, "solo-proj", "Solo", Some(&account), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(project.id, "solo-proj");
        assert_eq!(project.project_number, "55");
        assert_eq!(project.parent, Container::NoOrganization);
    }

    fn quota_project() -> Project {
        Project {
            id: "quota-proj".to_string(),
            name: "Quota".to_string(),
            project_number: "9".to_string(),
            lifecycle_state: "ACTIVE".to_string(),
            parent: Container::NoOrganization,
        }
    }

    /// Only the missing APIs are enabled
    #[tokio::test]
    async fn test_bootstrap_quota_project_enables_missing_apis() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/quota-proj/services"))
            .and(query_param("filter", "state:ENABLED"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [
                    {"config": {"name": "iam.googleapis.com"}},
                    {"config": {"name": "serviceusage.googleapis.com"}},
                    {"config": {"name": "cloudresourcemanager.googleapis.com"}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/quota-proj/services:batchEnable"))
            .and(body_partial_json(json!({
                "serviceIds": ["cloudbilling.googleapis.com", "firestore.googleapis.com"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/acf.7",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let enabled = quota_project()
            .bootstrap_quota_project(&client, REQUIRED_APIS, Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(enabled, vec!["cloudbilling.googleapis.com", "firestore.googleapis.com"]);
    }

    #[tokio::test]
    async fn test_bootstrap_quota_project_is_noop_when_complete() {
        let server = MockServer::start().await;
        let services: Vec<_> = REQUIRED_APIS
            .iter()
            .map(|api| json!({"config": {"name": api}}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/v1/projects/quota-proj/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "services": services })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/quota-proj/services:batchEnable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let enabled = quota_project()
            .bootstrap_quota_project(&client, REQUIRED_APIS, Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(enabled.is_empty());
    }
}
