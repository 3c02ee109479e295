use serde::{Deserialize, Serialize};

use crate::token::BearerToken;

/// The role an authenticated principal holds on the platform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Staffing-office administrator
    Admin,
    /// Shipping-company client
    Client,
}

impl Role {
    /// The role's path segment in platform URLs
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }

    /// The login surface serving this role
    pub fn portal(self) -> Portal {
        match self {
            Role::Admin => Portal::Admin,
            Role::Client => Portal::Client,
        }
    }
}

/// The error returned when parsing an unknown role name
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "client" => Ok(Role::Client),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// A login surface a signed-out user should be sent to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    /// The staffing-office login page
    Admin,
    /// The client login page
    Client,
}

/// The authenticated principal associated with a credential
///
/// The `subject` is the platform's user record, carried opaquely.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    /// The platform user record
    pub subject: serde_json::Value,
    /// The principal's role
    pub role: Role,
}

/// A credential together with the identity it proves
///
/// The pair travels as one value so that readers never observe an identity
/// without its credential. `identity` is `None` only while a stored credential
/// awaits its identity check.
#[derive(Clone, Debug)]
pub struct Session {
    /// The bearer credential
    pub credential: BearerToken,
    /// The authenticated principal, once known
    pub identity: Option<Identity>,
}

/// The session state observed by consumers
#[derive(Clone, Debug)]
pub struct SessionState {
    /// The current principal, if authenticated
    pub identity: Option<Identity>,
    /// True only until the initial bootstrap check resolves
    pub loading: bool,
}

impl SessionState {
    pub(crate) fn initial() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}
