use serde::{Deserialize, Serialize};

/// Identity and context of whoever issues a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub email: String,
    pub timezone: String,
}

impl Caller {
    pub fn new(id: impl Into<String>, email: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            timezone: timezone.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Browse,
    Read,
    Add,
    Edit,
    Delete,
    Export,
    ExecuteAction(String),
}
