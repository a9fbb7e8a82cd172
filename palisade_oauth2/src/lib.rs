//! OAuth2 scopes and scope sufficiency
//!
//! Scopes follow the definition in
//! [RFC 6749, Section 3.3](https://datatracker.ietf.org/doc/html/rfc6749#section-3.3):
//! a scope is a set of scope tokens, written on the wire as a single
//! space-delimited string. Commas are legal inside a scope token and are
//! never treated as delimiters.
//!
//! Whether a granted scope satisfies a required scope is decided by a
//! [`ScopeOperator`]:
//!
//! ```
//! use palisade_oauth2::{scope, ScopeOperator, ScopeRequirement};
//! use palisade_traits::Policy;
//!
//! let granted = scope!["read", "write"];
//!
//! let read = scope!["read"];
//! assert!(ScopeRequirement::new(&read, &ScopeOperator::All)
//!     .evaluate(&granted)
//!     .is_ok());
//!
//! let admin = scope!["read", "admin"];
//! assert!(ScopeRequirement::new(&admin, &ScopeOperator::All)
//!     .evaluate(&granted)
//!     .is_err());
//! assert!(ScopeRequirement::new(&admin, &ScopeOperator::Any)
//!     .evaluate(&granted)
//!     .is_ok());
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

mod operator;
pub mod scope;

pub use operator::{InsufficientScope, InvalidScopeOperator, ScopeOperator, ScopeRequirement};
pub use scope::{HasScope, InvalidScopeToken, Scope, ScopeToken, ScopeTokenRef};
