use serde::{Deserialize, Serialize};

pub const USER_COLLECTION: &str = "mst_user";
pub const GROUP_COLLECTION: &str = "mst_group";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl User {
    pub const ID: &'static str = "_id";
    pub const NAME: &'static str = "name";
    pub const EMAIL: &'static str = "email";

    pub fn new(id: i64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }

    /// A user whose name and email are derived from its id, so a read by
    /// name can be traced back to the insert that produced it.
    pub fn numbered(id: i64) -> Self {
        Self::new(id, format!("name-{id}"), format!("email-{id}"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Group {
    pub group_id: String,
    pub name: String,
    pub email: String,
}

impl Group {
    pub const GROUP_ID: &'static str = "group_id";
    pub const NAME: &'static str = "name";
    pub const EMAIL: &'static str = "email";

    pub fn new(
        group_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self::new(format!("group_id-{}", user.id), "group_name", "group_email")
    }
}

/// Partial update for a [`User`]. Fields left `None` are not serialized and
/// therefore untouched by a `$set`. The id is not updatable.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}
