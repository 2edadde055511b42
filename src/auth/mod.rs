//! Authentication module
//!
//! Supports: API key (header or query), Bearer
//!
//! Every service this crate talks to uses a static credential, so auth is
//! applied once when a connector builds its HTTP client.

use crate::http::HttpClientConfigBuilder;
use std::fmt;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

/// Static authentication for one service
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// API key in a header or query parameter
    ApiKey {
        /// Where to place the API key
        location: Location,
        /// Header or query parameter name
        name: String,
        /// The API key value
        value: String,
    },

    /// Bearer token authentication
    Bearer {
        /// The bearer token
        token: String,
    },
}

impl AuthConfig {
    /// API key sent as a query parameter
    pub fn query_key(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApiKey {
            location: Location::Query,
            name: name.into(),
            value: value.into(),
        }
    }

    /// API key sent as a header
    pub fn header_key(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApiKey {
            location: Location::Header,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Bearer token
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Apply the credential to a client configuration
    pub fn apply(&self, builder: HttpClientConfigBuilder) -> HttpClientConfigBuilder {
        match self {
            Self::None => builder,
            Self::ApiKey {
                location: Location::Header,
                name,
                value,
            } => builder.header(name, value),
            Self::ApiKey {
                location: Location::Query,
                name,
                value,
            } => builder.query(name, value),
            Self::Bearer { token } => builder.header("Authorization", format!("Bearer {token}")),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ApiKey { location, name, .. } => f
                .debug_struct("ApiKey")
                .field("location", location)
                .field("name", name)
                .field("value", &"***")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}
