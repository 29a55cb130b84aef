//! principal resolution supplied by the host application

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::PrincipalId;

/// grant target as a caller names it: an email or a principal id
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GranteeRef {
    Id(PrincipalId),
    Email(String),
}

impl FromStr for GranteeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.parse::<PrincipalId>() {
            Ok(id) => Ok(GranteeRef::Id(id)),
            Err(_) => Ok(GranteeRef::Email(s.to_string())),
        }
    }
}

impl fmt::Display for GranteeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GranteeRef::Id(id) => write!(f, "{}", id),
            GranteeRef::Email(email) => f.write_str(email),
        }
    }
}

impl From<PrincipalId> for GranteeRef {
    fn from(id: PrincipalId) -> Self {
        GranteeRef::Id(id)
    }
}

/// narrow contract the catalog needs from an identity provider
pub trait IdentityProvider {
    fn lookup_by_email(&self, email: &str) -> Result<PrincipalId>;

    fn resolve(&self, grantee: &GranteeRef) -> Result<PrincipalId> {
        match grantee {
            GranteeRef::Id(id) => Ok(*id),
            GranteeRef::Email(email) => self.lookup_by_email(email),
        }
    }
}

impl IdentityProvider for Config {
    fn lookup_by_email(&self, email: &str) -> Result<PrincipalId> {
        self.get_principal(email)
            .map(|p| p.id)
            .ok_or_else(|| Error::UnknownPrincipal(email.to_string()))
    }
}

impl IdentityProvider for HashMap<String, PrincipalId> {
    fn lookup_by_email(&self, email: &str) -> Result<PrincipalId> {
        self.get(email)
            .copied()
            .ok_or_else(|| Error::UnknownPrincipal(email.to_string()))
    }
}
