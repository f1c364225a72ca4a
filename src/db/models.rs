use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub account_name: String,
    pub nick_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub sex: String,
    pub birthday: Option<String>,
    pub pref: String,
    pub updated_at: String,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub sex: String,
    pub birthday: Option<String>,
    #[serde(default)]
    pub pref: String,
}

/// An entry as stored: title and content share one `body` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub id: i64,
    pub user_id: i64,
    pub private: bool,
    pub body: String,
    pub created_at: String,
}

/// A diary entry with its stored body already split into title and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub user_id: i64,
    pub private: bool,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub entry_id: i64,
    pub user_id: i64,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub viewer_id: i64,
    pub owner_id: i64,
    pub created_at: String,
}
