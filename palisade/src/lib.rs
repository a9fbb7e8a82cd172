//! Bearer-token protection for OAuth2 resource servers
//!
//! This crate authorizes requests carrying access tokens as described by
//! [RFC 6750](https://datatracker.ietf.org/doc/html/rfc6750). A
//! [`ResourceProtector`] reads the `Authorization` header, dispatches the
//! credential to the [`TokenValidator`] registered for its scheme, and
//! returns either the authenticated token or an [`AuthError`] describing
//! exactly why the request was turned away.
//!
//! Bearer tokens are handled by [`BearerTokenValidator`], which looks tokens
//! up through an application-supplied [`BearerTokenStore`] and then checks
//! the request, expiration, revocation, and scope, in that order.
//!
//! ```
//! use palisade::{
//!     AuthErrorKind, BasicAccessToken, BearerToken, BearerTokenValidator, InMemoryTokenStore,
//!     Realm, ResourceProtector, ResourceRequest,
//! };
//! use palisade_clock::{TestClock, UnixTime};
//! use palisade_oauth2::{scope, ScopeOperator};
//!
//! let store = InMemoryTokenStore::new().with_token(
//!     BearerToken::from_static("s3cr3t"),
//!     BasicAccessToken::new(scope!["read", "write"], UnixTime::from_secs(1_700_003_600)),
//! );
//!
//! let validator = BearerTokenValidator::new(store)
//!     .with_realm(Realm::from_static("reports"))
//!     .with_clock(TestClock::new(UnixTime::from_secs(1_700_000_000)));
//!
//! let protector = ResourceProtector::new().with_validator(validator);
//!
//! let request = http::Request::get("/reports")
//!     .header("Authorization", "Bearer s3cr3t")
//!     .body(())?;
//! let request = ResourceRequest::from(&request);
//!
//! assert!(protector.validate(&scope!["read"], &request).is_ok());
//!
//! let denied = protector
//!     .validate_with(&scope!["admin"], &request, &ScopeOperator::Any)
//!     .unwrap_err();
//! assert_eq!(denied.kind(), AuthErrorKind::InsufficientScope);
//! assert_eq!(denied.realm().map(|r| r.as_str()), Some("reports"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod bearer;
pub mod error;
mod memory;
mod protector;
mod request;
mod token;
mod validator;

pub use bearer::{BearerTokenStore, BearerTokenValidator};
pub use error::{AuthError, AuthErrorKind, InvalidToken, InvalidTokenReason};
pub use memory::{InMemoryTokenStore, IssuedToken};
pub use protector::ResourceProtector;
pub use request::ResourceRequest;
pub use token::{
    AccessToken, BasicAccessToken, BearerToken, BearerTokenRef, Realm, RealmRef, TokenType,
    TokenTypeRef,
};
pub use validator::TokenValidator;
