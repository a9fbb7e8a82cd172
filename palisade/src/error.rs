//! Rejections produced while authorizing a request

use std::{error::Error as StdError, fmt};

use palisade_oauth2::{InvalidScopeOperator, Scope};
use thiserror::Error;

use crate::token::{Realm, RealmRef};

/// Why an access token was deemed invalid
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum InvalidTokenReason {
    /// The token store did not recognize the token
    Unknown,
    /// The token's expiration time has passed
    Expired,
    /// The token has been revoked
    Revoked,
}

impl fmt::Display for InvalidTokenReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "token not recognized",
            Self::Expired => "token expired",
            Self::Revoked => "token revoked",
        })
    }
}

/// The access token was not found, has expired, or has been revoked
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid token: {reason}")]
pub struct InvalidToken {
    reason: InvalidTokenReason,
    realm: Option<Realm>,
}

impl InvalidToken {
    #[inline]
    pub(crate) fn new(reason: InvalidTokenReason, realm: Option<Realm>) -> Self {
        Self { reason, realm }
    }

    /// Why the token was rejected
    #[inline]
    pub fn reason(&self) -> InvalidTokenReason {
        self.reason
    }

    /// The realm of the validator that rejected the token
    #[inline]
    pub fn realm(&self) -> Option<&RealmRef> {
        self.realm.as_deref()
    }
}

/// A rejection raised while authorizing access to a protected resource
///
/// Every variant is a distinct terminal outcome. Callers mapping these to a
/// transport response should keep them distinct, since "no credentials",
/// "bad credentials", and "insufficient credentials" call for different
/// challenges.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The `Authorization` header is absent or empty
    #[error("authorization header is missing")]
    MissingAuthorization,

    /// The `Authorization` header is malformed, or names a token type with
    /// no registered validator
    #[error("unsupported token type")]
    UnsupportedTokenType,

    /// The token is unknown, expired, or revoked
    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),

    /// The token store rejected the shape of the request
    #[error("invalid request")]
    InvalidRequest {
        /// The realm of the validator that rejected the request
        realm: Option<Realm>,
    },

    /// The token does not grant the required scope
    #[error("insufficient scope")]
    InsufficientScope {
        /// The realm of the validator that rejected the token
        realm: Option<Realm>,
        /// The scope the protected resource requires
        required: Scope,
    },

    /// The caller supplied an unrecognized scope operator
    #[error("scope operator is misconfigured")]
    Configuration(#[from] InvalidScopeOperator),

    /// The token store failed while looking up or checking a token
    #[error("token store failure")]
    TokenStore(#[source] Box<dyn StdError + Send + Sync + 'static>),
}

impl AuthError {
    #[inline]
    pub(crate) fn token_store(
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::TokenStore(source.into())
    }

    /// The kind of rejection, without its payload
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::MissingAuthorization => AuthErrorKind::MissingAuthorization,
            Self::UnsupportedTokenType => AuthErrorKind::UnsupportedTokenType,
            Self::InvalidToken(_) => AuthErrorKind::InvalidToken,
            Self::InvalidRequest { .. } => AuthErrorKind::InvalidRequest,
            Self::InsufficientScope { .. } => AuthErrorKind::InsufficientScope,
            Self::Configuration(_) => AuthErrorKind::Configuration,
            Self::TokenStore(_) => AuthErrorKind::TokenStore,
        }
    }

    /// The realm of the validator that raised this rejection, if any
    pub fn realm(&self) -> Option<&RealmRef> {
        match self {
            Self::InvalidToken(err) => err.realm(),
            Self::InvalidRequest { realm } | Self::InsufficientScope { realm, .. } => {
                realm.as_deref()
            }
            _ => None,
        }
    }
}

/// The kind of an [`AuthError`]
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// See [`AuthError::MissingAuthorization`]
    MissingAuthorization,
    /// See [`AuthError::UnsupportedTokenType`]
    UnsupportedTokenType,
    /// See [`AuthError::InvalidToken`]
    InvalidToken,
    /// See [`AuthError::InvalidRequest`]
    InvalidRequest,
    /// See [`AuthError::InsufficientScope`]
    InsufficientScope,
    /// See [`AuthError::Configuration`]
    Configuration,
    /// See [`AuthError::TokenStore`]
    TokenStore,
}

impl AuthErrorKind {
    /// The error code for this kind
    ///
    /// `invalid_request`, `invalid_token`, and `insufficient_scope` are the
    /// codes registered by RFC 6750 for use in `WWW-Authenticate` challenges.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingAuthorization => "missing_authorization",
            Self::UnsupportedTokenType => "unsupported_token_type",
            Self::InvalidToken => "invalid_token",
            Self::InvalidRequest => "invalid_request",
            Self::InsufficientScope => "insufficient_scope",
            Self::Configuration => "configuration_error",
            Self::TokenStore => "token_store_failure",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_token_displays_its_reason() {
        let err = AuthError::from(InvalidToken::new(InvalidTokenReason::Expired, None));
        assert_eq!(err.to_string(), "invalid token: token expired");
        assert_eq!(err.kind(), AuthErrorKind::InvalidToken);
    }

    #[test]
    fn realm_is_exposed_for_challenge_generation() {
        let realm = Realm::from_static("api");
        let err = AuthError::InsufficientScope {
            realm: Some(realm.clone()),
            required: Scope::empty(),
        };
        assert_eq!(err.realm(), Some(&*realm));
        assert_eq!(AuthError::MissingAuthorization.realm(), None);
    }

    #[test]
    fn configuration_errors_convert_from_operator_parse_failures() {
        let err: AuthError = "XOR"
            .parse::<palisade_oauth2::ScopeOperator>()
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), AuthErrorKind::Configuration);
    }

    #[test]
    fn token_store_failures_keep_their_source() {
        let err = AuthError::token_store(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "database timed out",
        ));
        assert_eq!(err.kind(), AuthErrorKind::TokenStore);
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("database timed out")
        );
    }
}
