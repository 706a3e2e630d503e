use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while parsing an endpoint full name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointKeyError {
    /// Name did not have the `zone.name` or `server.zone.name` shape
    #[error("Endpoint name '{input}' must look like 'zone.name' or 'server.zone.name'")]
    BadShape { input: String },

    /// One of the name segments was empty
    #[error("Endpoint name '{input}' has an empty segment")]
    EmptySegment { input: String },
}

/// Globally unique identity of an endpoint.
///
/// Endpoints hosted by this process have no server segment and print as
/// `zone.name`. Endpoints hosted by a peer carry the peer's name and print as
/// `server.zone.name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointKey {
    server: Option<String>,
    zone: String,
    name: String,
}

impl EndpointKey {
    pub fn local(zone: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            server: None,
            zone: zone.into(),
            name: name.into(),
        }
    }

    pub fn remote(
        server: impl Into<String>,
        zone: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            server: Some(server.into()),
            zone: zone.into(),
            name: name.into(),
        }
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_local(&self) -> bool {
        self.server.is_none()
    }

    /// Same endpoint with a different short name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            server: self.server.clone(),
            zone: self.zone.clone(),
            name: name.into(),
        }
    }

    /// How a peer called `server` refers to this endpoint.
    pub fn qualified(&self, server: &str) -> Self {
        Self {
            server: Some(server.to_string()),
            zone: self.zone.clone(),
            name: self.name.clone(),
        }
    }

    /// Drops the server segment when it names this process.
    pub fn localized(&self, own_server: &str) -> Self {
        match &self.server {
            Some(server) if server == own_server => Self::local(self.zone.clone(), self.name.clone()),
            _ => self.clone(),
        }
    }

    /// Same zone and, for remote keys, same server.
    pub fn same_zone(&self, other: &EndpointKey) -> bool {
        self.server == other.server && self.zone == other.zone
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server {
            Some(server) => write!(f, "{}.{}.{}", server, self.zone, self.name),
            None => write!(f, "{}.{}", self.zone, self.name),
        }
    }
}

impl FromStr for EndpointKey {
    type Err = EndpointKeyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = input.split('.').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(EndpointKeyError::EmptySegment {
                input: input.to_string(),
            });
        }
        match parts.as_slice() {
            [zone, name] => Ok(Self::local(*zone, *name)),
            [server, zone, name] => Ok(Self::remote(*server, *zone, *name)),
            _ => Err(EndpointKeyError::BadShape {
                input: input.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EndpointKey {
    type Error = EndpointKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EndpointKey> for String {
    fn from(key: EndpointKey) -> Self {
        key.to_string()
    }
}
