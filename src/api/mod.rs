//! API clients and services for SharePoint Online
//!
//! Transport: [`GraphClient`] and [`SharePointRestClient`] on top of a shared
//! [`client::HttpCore`]. Services borrow a client and implement one concern
//! each: sites, drives/items, directory lookups, permissions.

pub mod client;
pub mod directory;
pub mod drives;
pub mod graph;
pub mod permissions;
pub mod rest;
pub mod sites;

pub use directory::{DirectoryService, GroupDirectory, MembershipResolver, MAX_GROUP_DEPTH};
pub use drives::{DriveService, SIMPLE_UPLOAD_LIMIT};
pub use graph::GraphClient;
pub use permissions::PermissionService;
pub use rest::{SharePointRestClient, SiteEndpoint};
pub use sites::SiteService;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// Percent-encode each `/`-separated segment; empty segments are dropped.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_segments() {
        assert_eq!(encode_path("Reports/2024/Q1"), "Reports/2024/Q1");
        assert_eq!(encode_path("/Shared Documents/a b.txt/"), "Shared%20Documents/a%20b.txt");
        assert_eq!(encode_path("Plan #1?.docx"), "Plan%20%231%3F.docx");
        assert_eq!(encode_path("Über/naïve.pdf"), "%C3%9Cber/na%C3%AFve.pdf");
        assert_eq!(encode_path("100%/a&b'c"), "100%25/a%26b%27c");
        assert_eq!(encode_path(""), "");
    }
}
