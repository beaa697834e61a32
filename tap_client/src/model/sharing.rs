//! TAP+ sharing service entities.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapUser {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapGroup {
    pub id: String,
    pub owner: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub users: Vec<TapUser>,
}

impl TapGroup {
    pub fn has_user(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }
}

impl fmt::Display for TapGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Group: {} (id: {}, owner: {}, users: {})",
            self.title,
            self.id,
            self.owner.as_deref().unwrap_or("None"),
            self.users.len()
        )
    }
}

/// Recipient of a shared item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapSharedToItem {
    /// Group (or user) identifier.
    pub id: String,
    /// `Group` or `User`.
    pub share_type: String,
    /// `Read` or `Write`.
    pub mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapSharedItem {
    pub id: String,
    /// `0` for tables.
    pub item_type: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub shared_to: Vec<TapSharedToItem>,
}

impl fmt::Display for TapSharedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shared item: {} (id: {}, shared to {} recipient(s))",
            self.title,
            self.id,
            self.shared_to.len()
        )
    }
}
