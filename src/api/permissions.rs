//! Effective permissions of a user on a site
//!
//! Role assignments come from SharePoint REST (Graph does not expose them).
//! An assignment applies to the user when its principal is
//! - the user itself,
//! - a SharePoint group the user belongs to directly,
//! - an Entra ID group the user belongs to, possibly through nested groups,
//! - the owners of a Microsoft 365 group the user owns, or
//! - a tenant-wide claim ("Everyone", or "Everyone except external users"
//!   for users that are not guests).
//!
//! A group claim that fits none of these aborts the query.
//!
//! The roles of all applying assignments are merged into one [`EffectiveRole`].

use super::directory::{DirectoryService, MembershipResolver};
use super::graph::GraphClient;
use super::rest::{SharePointRestClient, SiteEndpoint};
use super::sites::{normalize_site_path, SiteService};
use crate::error::{Error, Result};
use crate::models::{
    DirectoryClaim, DirectoryUser, EffectiveRole, GrantSource, PermissionGrant, PrincipalKind, RoleAssignment,
    SiteUser, UserSitePermissions,
};

const ROLE_ASSIGNMENTS: &str = "_api/web/roleassignments";

pub struct PermissionService<'a> {
    graph: &'a GraphClient,
    rest: &'a SharePointRestClient,
}

impl<'a> PermissionService<'a> {
    pub fn new(graph: &'a GraphClient, rest: &'a SharePointRestClient) -> Self {
        Self { graph, rest }
    }

    pub async fn get_user_site_permissions(
        &self,
        user_email: &str,
        hostname: &str,
        site_path: &str,
    ) -> Result<UserSitePermissions> {
        let email = user_email.trim().to_lowercase();
        if email.is_empty() {
            return Err(Error::InvalidArgument("user email must not be empty".into()));
        }
        let hostname = hostname.trim();
        let site_path = normalize_site_path(site_path);

        let site = SiteService::new(self.graph)
            .get_site(hostname, &site_path)
            .await?;
        let directory = DirectoryService::new(self.graph);
        let user = directory.get_user(&email).await?;
        let identity = Identity::new(&email, &user);

        let endpoint = self.rest.site(hostname, &site_path)?;
        let assignments: Vec<RoleAssignment> = endpoint
            .get_list(
                ROLE_ASSIGNMENTS,
                &[("$expand", "Member,RoleDefinitionBindings")],
            )
            .await?;
        tracing::debug!("{} role assignments on {}", assignments.len(), site.label());

        let mut resolver = MembershipResolver::new(&directory, &user.id);
        let mut grants = Vec::new();

        for assignment in assignments {
            let principal = &assignment.principal;
            let source = match principal.principal_type {
                PrincipalKind::User => {
                    if !identity.matches(
                        principal.email.as_deref(),
                        principal.login_name.as_deref(),
                        principal.title.as_deref(),
                    ) {
                        continue;
                    }
                    GrantSource::Direct
                }
                PrincipalKind::SharePointGroup => {
                    if !self.in_site_group(&endpoint, principal.id, &identity).await? {
                        continue;
                    }
                    GrantSource::SharePointGroup {
                        group_id: principal.id,
                    }
                }
                PrincipalKind::SecurityGroup => {
                    let Some(claim) = principal.directory_claim() else {
                        return Err(Error::UnsupportedClaim {
                            principal: principal.label(),
                            claim: principal.login_name.clone().unwrap_or_default(),
                        });
                    };
                    match claim {
                        DirectoryClaim::Members(group_id) => {
                            if !resolver.is_member(&group_id).await? {
                                continue;
                            }
                            GrantSource::DirectoryGroup { group_id }
                        }
                        DirectoryClaim::Owners(group_id) => {
                            if !resolver.is_owner(&group_id).await? {
                                continue;
                            }
                            GrantSource::DirectoryGroupOwners { group_id }
                        }
                        DirectoryClaim::Everyone => GrantSource::TenantWide,
                        DirectoryClaim::EveryoneExceptExternal => {
                            if identity.is_external() {
                                continue;
                            }
                            GrantSource::TenantWide
                        }
                    }
                }
                PrincipalKind::DistributionList | PrincipalKind::Other(_) => {
                    tracing::debug!(
                        "Skipping {} ({:?})",
                        principal.label(),
                        principal.principal_type
                    );
                    continue;
                }
            };

            tracing::debug!("{} grants {:?} via {:?}", principal.label(), assignment.roles, source);
            grants.push(PermissionGrant {
                principal: assignment.principal,
                source,
                roles: assignment.roles,
            });
        }

        let effective = EffectiveRole::from_roles(grants.iter().flat_map(|g| g.roles.iter().cloned()));
        tracing::info!(
            "{} on {}: {}",
            email,
            site.label(),
            effective.highest().unwrap_or("no access")
        );

        Ok(UserSitePermissions {
            user,
            hostname: hostname.to_string(),
            site_path,
            site,
            effective,
            grants,
        })
    }

    /// Direct membership of SharePoint group `group_id`.
    async fn in_site_group(
        &self,
        endpoint: &SiteEndpoint<'_>,
        group_id: i64,
        identity: &Identity,
    ) -> Result<bool> {
        let path = format!("_api/web/sitegroups({})/users", group_id);
        let members: Vec<SiteUser> = endpoint
            .get_list(&path, &[("$select", "Id,Email,LoginName,Title")])
            .await
            .map_err(|e| Error::MembershipUnavailable {
                group: format!("SharePoint group {}", group_id),
                source: Box::new(e),
            })?;
        Ok(members.iter().any(|m| {
            identity.matches(m.email.as_deref(), m.login_name.as_deref(), m.title.as_deref())
        }))
    }
}

/// Lowercased names the user may appear under in SharePoint: the address it
/// was looked up with, its mail and its UPN.
struct Identity {
    names: Vec<String>,
    external: bool,
}

impl Identity {
    fn new(email: &str, user: &DirectoryUser) -> Self {
        let mut names = vec![email.to_lowercase()];
        for name in [user.mail.as_deref(), user.user_principal_name.as_deref()]
            .into_iter()
            .flatten()
        {
            let name = name.trim().to_lowercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        // B2B guests carry #EXT# in their UPN
        let upn = user.user_principal_name.as_deref().unwrap_or(email);
        let external = upn.to_ascii_lowercase().contains("#ext#");
        Self { names, external }
    }

    fn is_external(&self) -> bool {
        self.external
    }

    /// Email equal, title equal, or a login claim whose value is the address
    /// (`i:0#.f|membership|alice@contoso.com`).
    fn matches(&self, email: Option<&str>, login_name: Option<&str>, title: Option<&str>) -> bool {
        let email = email.map(|e| e.trim().to_lowercase());
        let title = title.map(|t| t.trim().to_lowercase());
        let claim = login_name.map(|l| {
            let l = l.trim().to_lowercase();
            match l.rsplit_once('|') {
                Some((_, value)) => value.to_string(),
                None => l,
            }
        });

        self.names.iter().any(|name| {
            email.as_deref() == Some(name.as_str())
                || claim.as_deref() == Some(name.as_str())
                || title.as_deref() == Some(name.as_str())
        })
    }
}
