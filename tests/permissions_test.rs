//! Effective permission aggregation against mock Graph and REST endpoints

mod common;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sharepoint::models::GrantSource;
use sharepoint::{Error, ErrorKind};

use common::{client, site_json, HOSTNAME, SITE_PATH};

const ALICE: &str = "alice@contoso.com";
const GROUP_A: &str = "aaaaaaaa-0000-4000-8000-000000000001";
const GROUP_B: &str = "bbbbbbbb-0000-4000-8000-000000000002";

async fn mount_site_and_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/sites/contoso.sharepoint.com:/sites/Team"))
        .respond_with(ResponseTemplate::new(200).set_body_json(site_json()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/alice@contoso.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-alice",
            "displayName": "Alice",
            "mail": "Alice@contoso.com",
            "userPrincipalName": "alice@contoso.onmicrosoft.com"
        })))
        .mount(server)
        .await;
}

async fn mount_assignments(server: &MockServer, assignments: Value) {
    Mock::given(method("GET"))
        .and(path("/sites/Team/_api/web/roleassignments"))
        .and(query_param("$expand", "Member,RoleDefinitionBindings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": assignments })))
        .expect(1)
        .mount(server)
        .await;
}

fn assignment(id: i64, title: &str, login: &str, kind: i64, roles: &[&str]) -> Value {
    json!({
        "PrincipalId": id,
        "Member": {"Id": id, "Title": title, "LoginName": login, "PrincipalType": kind},
        "RoleDefinitionBindings": roles.iter().map(|r| json!({"Name": r})).collect::<Vec<_>>()
    })
}

fn directory_member(id: &str, kind: &str) -> Value {
    json!({"@odata.type": format!("#microsoft.graph.{}", kind), "id": id})
}

#[tokio::test]
async fn test_direct_read_and_site_group_edit() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(
        &server,
        json!([
            assignment(11, "Alice", "i:0#.f|membership|alice@contoso.com", 1, &["Read"]),
            assignment(12, "Jim Bob", "i:0#.f|membership|jimalice@contoso.com", 1, &["Full Control"]),
            assignment(7, "Team Members", "Team Members", 8, &["Edit", "Limited Access"]),
            assignment(8, "Team Owners", "Team Owners", 8, &["Full Control"]),
            assignment(3, "Everyone", "c:0(.s|true", 4, &["Read"])
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/sites/Team/_api/web/sitegroups(7)/users"))
        .and(query_param("$select", "Id,Email,LoginName,Title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            {"Id": 11, "Email": "alice@contoso.com", "LoginName": "i:0#.f|membership|alice@contoso.com", "Title": "Alice"}
        ]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites/Team/_api/web/sitegroups(8)/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            {"Id": 20, "Email": "owner@contoso.com", "LoginName": "i:0#.f|membership|owner@contoso.com", "Title": "Owner"}
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions(" Alice@Contoso.com ", HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert!(report.has_access());
    assert_eq!(report.effective.highest(), Some("Edit"));
    assert_eq!(report.effective.roles(), ["Edit", "Read", "Limited Access"]);
    assert_eq!(report.user.id, "u-alice");
    assert_eq!(report.site_path, "/sites/Team");

    let direct: Vec<_> = report.direct_grants().collect();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].roles, ["Read"]);

    let via_group: Vec<_> = report.group_grants().collect();
    assert_eq!(via_group.len(), 2);
    assert_eq!(via_group[0].source, GrantSource::SharePointGroup { group_id: 7 });
    assert_eq!(via_group[1].source, GrantSource::TenantWide);
}

#[tokio::test]
async fn test_nested_directory_group_with_cycle() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(
        &server,
        json!([assignment(
            30,
            "Engineering",
            &format!("c:0t.c|tenant|{}", GROUP_A.to_uppercase()),
            4,
            &["Contribute"]
        )]),
    )
    .await;
    // A contains B, B contains A again and then the user
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/members", GROUP_A)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            directory_member("u-bob", "user"),
            directory_member(GROUP_B, "group")
        ]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/members", GROUP_B)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            directory_member(GROUP_A, "group"),
            directory_member("u-alice", "user")
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions(ALICE, HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert_eq!(report.effective.roles(), ["Contribute"]);
    assert_eq!(
        report.grants[0].source,
        GrantSource::DirectoryGroup {
            group_id: GROUP_A.to_string()
        }
    );
}

#[tokio::test]
async fn test_cyclic_groups_without_user_terminate() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(
        &server,
        json!([assignment(30, "Engineering", &format!("c:0t.c|tenant|{}", GROUP_A), 4, &["Edit"])]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/members", GROUP_A)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            directory_member(GROUP_B, "group")
        ]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/members", GROUP_B)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            directory_member(GROUP_A, "group")
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions(ALICE, HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert!(!report.has_access());
    assert_eq!(report.effective.highest(), None);
    assert!(report.grants.is_empty());
}

#[tokio::test]
async fn test_site_group_fetch_failure_aborts() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(
        &server,
        json!([
            assignment(11, "Alice", "i:0#.f|membership|alice@contoso.com", 1, &["Read"]),
            assignment(7, "Team Members", "Team Members", 8, &["Edit"])
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/sites/Team/_api/web/sitegroups(7)/users"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let (client, _) = client(&server);
    let err = client
        .get_user_site_permissions(ALICE, HOSTNAME, SITE_PATH)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Aggregation);
    match err {
        Error::MembershipUnavailable { group, source } => {
            assert_eq!(group, "SharePoint group 7");
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("expected MembershipUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_user_is_not_resolved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites/contoso.sharepoint.com:/sites/Team"))
        .respond_with(ResponseTemplate::new(200).set_body_json(site_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/ghost@contoso.com"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "Request_ResourceNotFound", "message": "Resource does not exist"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("$filter", "mail eq 'ghost@contoso.com'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client(&server);
    let err = client
        .get_user_site_permissions("ghost@contoso.com", HOSTNAME, SITE_PATH)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Aggregation);
    assert!(matches!(err, Error::UserNotResolved { ref email, .. } if email == "ghost@contoso.com"));
}

#[tokio::test]
async fn test_empty_email_is_rejected() {
    let server = MockServer::start().await;
    let (client, tokens) = client(&server);
    let err = client
        .get_user_site_permissions("   ", HOSTNAME, SITE_PATH)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(tokens.acquired(), 0);
}

#[tokio::test]
async fn test_owners_claim_checks_group_owners() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(
        &server,
        json!([assignment(
            40,
            "Project X Owners",
            &format!("c:0o.c|federateddirectoryclaimprovider|{}_o", GROUP_A),
            4,
            &["Full Control"]
        )]),
    )
    .await;
    // Alice is only a member of the group
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/members", GROUP_A)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            directory_member("u-alice", "user")
        ]})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/owners", GROUP_A)))
        .and(query_param("$select", "id,displayName"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions(ALICE, HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert!(!report.has_access());
    assert!(report.grants.is_empty());
}

#[tokio::test]
async fn test_owner_through_owning_group() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(
        &server,
        json!([assignment(
            40,
            "Project X Owners",
            &format!("c:0o.c|federateddirectoryclaimprovider|{}_o", GROUP_A),
            4,
            &["Full Control"]
        )]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/owners", GROUP_A)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            directory_member("u-bob", "user"),
            directory_member(GROUP_B, "group")
        ]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/members", GROUP_B)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            directory_member("u-alice", "user")
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions(ALICE, HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert_eq!(report.effective.highest(), Some("Full Control"));
    assert_eq!(
        report.grants[0].source,
        GrantSource::DirectoryGroupOwners {
            group_id: GROUP_A.to_string()
        }
    );
}

#[tokio::test]
async fn test_everyone_claim_grants_every_user() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(
        &server,
        json!([assignment(3, "Everyone", "c:0(.s|true", 4, &["Read"])]),
    )
    .await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions(ALICE, HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert_eq!(report.effective.roles(), ["Read"]);
    assert_eq!(report.grants[0].source, GrantSource::TenantWide);
}

fn all_users_assignment() -> Value {
    assignment(
        5,
        "Everyone except external users",
        "c:0-.f|rolemanager|spo-grid-all-users/11111111-2222-3333-4444-555555555555",
        4,
        &["Edit"],
    )
}

#[tokio::test]
async fn test_everyone_except_external_grants_members() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(&server, json!([all_users_assignment()])).await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions(ALICE, HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert_eq!(report.effective.highest(), Some("Edit"));
    assert_eq!(report.grants[0].source, GrantSource::TenantWide);
}

#[tokio::test]
async fn test_everyone_except_external_skips_guests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites/contoso.sharepoint.com:/sites/Team"))
        .respond_with(ResponseTemplate::new(200).set_body_json(site_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/guest@fabrikam.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-guest",
            "mail": "guest@fabrikam.com",
            "userPrincipalName": "guest_fabrikam.com#EXT#@contoso.onmicrosoft.com"
        })))
        .mount(&server)
        .await;
    mount_assignments(&server, json!([all_users_assignment()])).await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions("guest@fabrikam.com", HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert!(!report.has_access());
}

#[tokio::test]
async fn test_unrecognised_group_claim_aborts() {
    let server = MockServer::start().await;
    mount_site_and_user(&server).await;
    mount_assignments(
        &server,
        json!([assignment(9, "Custom Role", "c:0-.f|rolemanager|some-custom-role", 4, &["Edit"])]),
    )
    .await;

    let (client, _) = client(&server);
    let err = client
        .get_user_site_permissions(ALICE, HOSTNAME, SITE_PATH)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Aggregation);
    match err {
        Error::UnsupportedClaim { principal, claim } => {
            assert_eq!(principal, "Custom Role");
            assert_eq!(claim, "c:0-.f|rolemanager|some-custom-role");
        }
        other => panic!("expected UnsupportedClaim, got {:?}", other),
    }
}

#[tokio::test]
async fn test_user_resolved_by_mail_when_upn_differs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites/contoso.sharepoint.com:/sites/Team"))
        .respond_with(ResponseTemplate::new(200).set_body_json(site_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/alias@contoso.com"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "Request_ResourceNotFound", "message": "Resource does not exist"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("$filter", "mail eq 'alias@contoso.com'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [{
            "id": "u-alias",
            "mail": "Alias@contoso.com",
            "userPrincipalName": "a.lias@contoso.onmicrosoft.com"
        }]})))
        .expect(1)
        .mount(&server)
        .await;
    mount_assignments(
        &server,
        json!([assignment(11, "A. Lias", "i:0#.f|membership|a.lias@contoso.onmicrosoft.com", 1, &["Read"])]),
    )
    .await;

    let (client, _) = client(&server);
    let report = client
        .get_user_site_permissions("alias@contoso.com", HOSTNAME, SITE_PATH)
        .await
        .unwrap();

    assert_eq!(report.user.id, "u-alias");
    assert_eq!(report.effective.roles(), ["Read"]);
}
