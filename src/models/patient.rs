use serde::{Deserialize, Serialize};

/// Patient registry entry used for referral auto-fill and the records browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub sex: String,
}

impl Patient {
    pub fn new(id: &str, name: &str, age: &str, sex: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age: age.into(),
            sex: sex.into(),
        }
    }
}

/// Static roster entry for the communication screen (supplied by the page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub avatar_text: String,
    pub img: Option<String>,
}
