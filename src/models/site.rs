//! Site model

use serde::{Deserialize, Serialize};

/// A resolved SharePoint site. `id` is the composite
/// `{hostname},{site-collection-id},{web-id}` assigned by Graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub web_url: Option<String>,
}

impl Site {
    /// Display name, falling back to the URL name and then the id.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.id)
    }
}
