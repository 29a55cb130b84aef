use serde::{Deserialize, Serialize};

use crate::types::PrincipalId;

/// directory entry mapping an email to a principal id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Principal {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: PrincipalId::new(),
            email: email.into(),
            name: name.into(),
        }
    }
}
