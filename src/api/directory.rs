//! Entra ID lookups: users and (nested) group membership

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::encode_path;
use super::graph::GraphClient;
use crate::error::{Error, ErrorKind, Result};
use crate::models::{DirectoryObject, DirectoryUser};

/// Deepest group nesting expanded below an assigned group.
pub const MAX_GROUP_DEPTH: usize = 10;

const USER_FIELDS: &str = "id,displayName,mail,userPrincipalName";

/// Membership listing for directory groups
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Direct members (users, groups, other objects) of `group_id`.
    async fn group_members(&self, group_id: &str) -> Result<Vec<DirectoryObject>>;

    /// Owners of `group_id`.
    async fn group_owners(&self, group_id: &str) -> Result<Vec<DirectoryObject>>;
}

pub struct DirectoryService<'a> {
    graph: &'a GraphClient,
}

impl<'a> DirectoryService<'a> {
    pub fn new(graph: &'a GraphClient) -> Self {
        Self { graph }
    }

    /// Resolve a user by UPN, falling back to an exact `mail` match for
    /// users whose address differs from their UPN. No match is `UserNotResolved`.
    pub async fn get_user(&self, email: &str) -> Result<DirectoryUser> {
        let path = format!("users/{}", encode_path(email));
        let not_found = match self.graph.get(&path, &[("$select", USER_FIELDS)]).await {
            Ok(user) => return Ok(user),
            Err(e) if e.kind() == ErrorKind::NotFound => e,
            Err(e) => return Err(e),
        };

        tracing::debug!("No user with UPN {}, searching by mail", email);
        let filter = format!("mail eq '{}'", email.replace('\'', "''"));
        let matches: Vec<DirectoryUser> = match self
            .graph
            .get_paged("users", &[("$filter", filter.as_str()), ("$select", USER_FIELDS)])
            .await
        {
            Ok(users) => users,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        matches.into_iter().next().ok_or_else(|| Error::UserNotResolved {
            email: email.to_string(),
            source: Box::new(not_found),
        })
    }
}

#[async_trait]
impl GroupDirectory for DirectoryService<'_> {
    async fn group_members(&self, group_id: &str) -> Result<Vec<DirectoryObject>> {
        let path = format!("groups/{}/members", encode_path(group_id));
        self.graph
            .get_paged(&path, &[("$select", "id,displayName")])
            .await
    }

    async fn group_owners(&self, group_id: &str) -> Result<Vec<DirectoryObject>> {
        let path = format!("groups/{}/owners", encode_path(group_id));
        self.graph
            .get_paged(&path, &[("$select", "id,displayName")])
            .await
    }
}

/// Answers "is this user a (transitive) member of group X", remembering
/// answers across calls. Traversal is breadth-first with a visited set, so
/// cyclic nesting terminates; nesting deeper than `max_depth` is an error.
pub struct MembershipResolver<'d, D: GroupDirectory> {
    directory: &'d D,
    user_id: String,
    max_depth: usize,
    known: HashMap<String, bool>,
}

impl<'d, D: GroupDirectory> MembershipResolver<'d, D> {
    pub fn new(directory: &'d D, user_id: &str) -> Self {
        Self::with_max_depth(directory, user_id, MAX_GROUP_DEPTH)
    }

    pub fn with_max_depth(directory: &'d D, user_id: &str, max_depth: usize) -> Self {
        Self {
            directory,
            user_id: user_id.to_ascii_lowercase(),
            max_depth,
            known: HashMap::new(),
        }
    }

    pub async fn is_member(&mut self, group_id: &str) -> Result<bool> {
        let root = group_id.to_ascii_lowercase();
        if let Some(&answer) = self.known.get(&root) {
            return Ok(answer);
        }

        let mut visited: HashSet<String> = HashSet::from([root.clone()]);
        let mut frontier = vec![root.clone()];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            if depth > self.max_depth {
                return Err(Error::GroupDepthExceeded {
                    group: format!("directory group {}", root),
                    max_depth: self.max_depth,
                });
            }

            let mut next = Vec::new();
            for group in &frontier {
                let members = self
                    .directory
                    .group_members(group)
                    .await
                    .map_err(|e| Error::MembershipUnavailable {
                        group: format!("directory group {}", group),
                        source: Box::new(e),
                    })?;

                for member in members {
                    let id = member.id.to_ascii_lowercase();
                    if member.is_user() && id == self.user_id {
                        tracing::debug!("User found in {} at depth {}", group, depth);
                        self.known.insert(root, true);
                        return Ok(true);
                    }
                    if !member.is_group() {
                        continue;
                    }
                    match self.known.get(&id).copied() {
                        Some(true) => {
                            self.known.insert(root, true);
                            return Ok(true);
                        }
                        Some(false) => continue,
                        None => {}
                    }
                    if visited.insert(id.clone()) {
                        next.push(id);
                    } else {
                        tracing::debug!("Group {} already visited under {}", id, root);
                    }
                }
            }

            frontier = next;
            depth += 1;
        }

        // Nothing reachable from root contains the user.
        for group in visited {
            self.known.insert(group, false);
        }
        Ok(false)
    }

    /// Whether the user owns `group_id`, directly or as a member of a group
    /// that owns it. Ownership itself does not nest.
    pub async fn is_owner(&mut self, group_id: &str) -> Result<bool> {
        let group = group_id.to_ascii_lowercase();
        let owners = self
            .directory
            .group_owners(&group)
            .await
            .map_err(|e| Error::MembershipUnavailable {
                group: format!("owners of directory group {}", group),
                source: Box::new(e),
            })?;

        if owners
            .iter()
            .any(|o| o.is_user() && o.id.eq_ignore_ascii_case(&self.user_id))
        {
            return Ok(true);
        }
        for owner in owners.iter().filter(|o| o.is_group()) {
            if self.is_member(&owner.id).await? {
                tracing::debug!("User owns {} through group {}", group, owner.id);
                return Ok(true);
            }
        }
        Ok(false)
    }
}
