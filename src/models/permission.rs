//! Role assignment and effective permission models

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{DirectoryUser, Site};

/// SharePoint `PrincipalType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64")]
pub enum PrincipalKind {
    User,
    DistributionList,
    /// Entra ID security or Microsoft 365 group
    SecurityGroup,
    /// Group defined inside the site collection
    SharePointGroup,
    Other(i64),
}

impl From<i64> for PrincipalKind {
    fn from(value: i64) -> Self {
        match value {
            1 => PrincipalKind::User,
            2 => PrincipalKind::DistributionList,
            4 => PrincipalKind::SecurityGroup,
            8 => PrincipalKind::SharePointGroup,
            other => PrincipalKind::Other(other),
        }
    }
}

/// The principal a role assignment is granted to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub id: i64,
    pub title: Option<String>,
    pub login_name: Option<String>,
    pub email: Option<String>,
    pub principal_type: PrincipalKind,
}

/// Audience named by the claim of a group principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryClaim {
    /// Members of an Entra group (`c:0t.c|tenant|{id}`, `...|federateddirectoryclaimprovider|{id}`)
    Members(String),
    /// Owners of a Microsoft 365 group (`...|federateddirectoryclaimprovider|{id}_o`)
    Owners(String),
    /// Every authenticated user (`c:0(.s|true`)
    Everyone,
    /// Every user except guests (`...|rolemanager|spo-grid-all-users/{tenant}`)
    EveryoneExceptExternal,
}

impl Principal {
    /// Audience of a group claim; `None` when the login name is absent or unrecognised.
    pub fn directory_claim(&self) -> Option<DirectoryClaim> {
        static GUID: OnceLock<Regex> = OnceLock::new();
        let re = GUID.get_or_init(|| {
            Regex::new(r"(?i)^([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})(_o)?$")
                .expect("static regex")
        });
        let login = self.login_name.as_deref()?.trim();
        if login.eq_ignore_ascii_case("c:0(.s|true") {
            return Some(DirectoryClaim::Everyone);
        }
        // Only the claim value (last `|` segment) names the audience.
        let claim = login.rsplit('|').next().unwrap_or(login);
        if claim.to_ascii_lowercase().starts_with("spo-grid-all-users/") {
            return Some(DirectoryClaim::EveryoneExceptExternal);
        }
        let caps = re.captures(claim)?;
        let id = caps.get(1)?.as_str().to_ascii_lowercase();
        if caps.get(2).is_some() {
            Some(DirectoryClaim::Owners(id))
        } else {
            Some(DirectoryClaim::Members(id))
        }
    }

    pub fn label(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.login_name.clone())
            .unwrap_or_else(|| format!("principal {}", self.id))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleBinding {
    name: Option<String>,
}

/// `RoleDefinitionBindings` arrives as a bare array (nometadata) or `{results: [...]}` (verbose).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Bindings {
    List(Vec<RoleBinding>),
    Verbose { results: Vec<RoleBinding> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRoleAssignment {
    member: Principal,
    #[serde(default)]
    role_definition_bindings: Option<Bindings>,
}

/// Role assignment on the site scope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawRoleAssignment")]
pub struct RoleAssignment {
    pub principal: Principal,
    pub roles: Vec<String>,
}

impl From<RawRoleAssignment> for RoleAssignment {
    fn from(raw: RawRoleAssignment) -> Self {
        let bindings = match raw.role_definition_bindings {
            Some(Bindings::List(list)) | Some(Bindings::Verbose { results: list }) => list,
            None => Vec::new(),
        };
        RoleAssignment {
            principal: raw.member,
            roles: bindings.into_iter().filter_map(|b| b.name).collect(),
        }
    }
}

/// Member of a SharePoint group (`/_api/web/sitegroups({id})/users`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteUser {
    pub id: i64,
    pub email: Option<String>,
    pub login_name: Option<String>,
    pub title: Option<String>,
}

/// Privilege rank of a built-in role name; unknown or custom roles rank 0.
pub fn privilege_rank(role: &str) -> u8 {
    match role.trim().to_ascii_lowercase().as_str() {
        "full control" => 8,
        "design" => 7,
        "edit" => 6,
        "contribute" => 5,
        "read" => 4,
        "restricted view" => 3,
        "view only" => 2,
        "limited access" => 1,
        _ => 0,
    }
}

/// Deduplicated role set, most privileged first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveRole {
    roles: Vec<String>,
}

impl EffectiveRole {
    pub fn from_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        let mut roles: Vec<String> = unique.into_iter().collect();
        // BTreeSet order breaks ties alphabetically; the sort is stable.
        roles.sort_by_key(|r| Reverse(privilege_rank(r)));
        Self { roles }
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn highest(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }

    pub fn has_access(&self) -> bool {
        !self.roles.is_empty()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// How an assignment reached the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantSource {
    Direct,
    SharePointGroup { group_id: i64 },
    DirectoryGroup { group_id: String },
    /// Owner of a Microsoft 365 group, directly or through a group owner
    DirectoryGroupOwners { group_id: String },
    /// Tenant-wide claim such as "Everyone"
    TenantWide,
}

/// An assignment that applies to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub principal: Principal,
    pub source: GrantSource,
    pub roles: Vec<String>,
}

/// Effective permissions of one user on one site
#[derive(Debug, Clone)]
pub struct UserSitePermissions {
    pub user: DirectoryUser,
    pub hostname: String,
    pub site_path: String,
    pub site: Site,
    pub effective: EffectiveRole,
    pub grants: Vec<PermissionGrant>,
}

impl UserSitePermissions {
    pub fn has_access(&self) -> bool {
        self.effective.has_access()
    }

    pub fn direct_grants(&self) -> impl Iterator<Item = &PermissionGrant> {
        self.grants
            .iter()
            .filter(|g| g.source == GrantSource::Direct)
    }

    pub fn group_grants(&self) -> impl Iterator<Item = &PermissionGrant> {
        self.grants
            .iter()
            .filter(|g| g.source != GrantSource::Direct)
    }
}
