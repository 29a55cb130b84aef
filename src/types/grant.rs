use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{GrantId, PrincipalId, RevisionId};
use crate::Error;

/// access level carried by a grant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    ReadWrite,
}

impl AccessLevel {
    pub fn allows_write(self) -> bool {
        matches!(self, AccessLevel::ReadWrite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::ReadWrite => "read_write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "read" | "r" => Ok(AccessLevel::Read),
            "read_write" | "read-write" | "rw" => Ok(AccessLevel::ReadWrite),
            _ => Err(Error::InvalidAccessLevel(s.to_string())),
        }
    }
}

/// permission for a grantee on another principal's revision
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub grantee: PrincipalId,
    /// target revision
    pub revision: RevisionId,
    /// owner of the target revision at grant time, never equal to grantee
    pub owner: PrincipalId,
    pub level: AccessLevel,
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} on {}",
            self.id, self.grantee, self.level, self.revision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_parse() {
        assert_eq!("read".parse::<AccessLevel>().unwrap(), AccessLevel::Read);
        assert_eq!(
            "read_write".parse::<AccessLevel>().unwrap(),
            AccessLevel::ReadWrite
        );
        assert_eq!("RW".parse::<AccessLevel>().unwrap(), AccessLevel::ReadWrite);
        assert!(matches!(
            "write".parse::<AccessLevel>(),
            Err(Error::InvalidAccessLevel(_))
        ));
    }

    #[test]
    fn test_access_level_ordering() {
        // effective access takes the max of held grants
        assert!(AccessLevel::ReadWrite > AccessLevel::Read);
        assert!(!AccessLevel::Read.allows_write());
        assert!(AccessLevel::ReadWrite.allows_write());
    }

    #[test]
    fn test_access_level_serde_names() {
        assert_eq!(
            serde_json::to_string(&AccessLevel::ReadWrite).unwrap(),
            "\"read_write\""
        );
        assert_eq!(
            serde_json::from_str::<AccessLevel>("\"read\"").unwrap(),
            AccessLevel::Read
        );
    }
}
