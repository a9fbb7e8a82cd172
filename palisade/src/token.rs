//! Access tokens and the strings that identify them

use std::fmt;

use aliri_braid::braid;
use palisade_clock::UnixTime;
use palisade_oauth2::{HasScope, Scope};
use serde::{Deserialize, Serialize};

/// An access token record resolved from a token store
///
/// The token is owned by the embedding application. Validation only ever
/// reads its expiration time and granted scope; revocation is queried
/// through the store.
pub trait AccessToken: HasScope {
    /// The instant after which the token is no longer valid
    fn expires_at(&self) -> UnixTime;
}

impl<T> AccessToken for &'_ T
where
    T: AccessToken + ?Sized,
{
    #[inline]
    fn expires_at(&self) -> UnixTime {
        T::expires_at(self)
    }
}

/// A minimal access token record: a granted scope and an expiration time
///
/// ```
/// use palisade::{AccessToken, BasicAccessToken};
/// use palisade_clock::UnixTime;
/// use palisade_oauth2::{scope, HasScope};
///
/// let token: BasicAccessToken =
///     serde_json::from_str(r#"{ "scope": "read write", "expires_at": 1700000000 }"#).unwrap();
///
/// assert_eq!(token.scope(), &scope!["read", "write"]);
/// assert_eq!(token.expires_at(), UnixTime::from_secs(1_700_000_000));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAccessToken {
    /// The scope granted to the token
    #[serde(default)]
    pub scope: Scope,

    /// The instant after which the token is no longer valid
    pub expires_at: UnixTime,
}

impl BasicAccessToken {
    /// Constructs a new token record
    #[inline]
    pub fn new(scope: Scope, expires_at: UnixTime) -> Self {
        Self { scope, expires_at }
    }
}

impl HasScope for BasicAccessToken {
    #[inline]
    fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl AccessToken for BasicAccessToken {
    #[inline]
    fn expires_at(&self) -> UnixTime {
        self.expires_at
    }
}

/// The scheme naming a token type in an `Authorization` header, such as
/// `bearer`
///
/// Schemes compare case-insensitively on the wire; use
/// [`TokenType::normalized`] to obtain the lower-cased form used as a
/// registry key.
#[braid(serde, ref_doc = "A borrowed reference to a [`TokenType`]")]
pub struct TokenType;

impl TokenType {
    /// The `bearer` token type defined by RFC 6750
    #[inline]
    pub fn bearer() -> Self {
        Self::from_static("bearer")
    }

    /// Lower-cases a token type so that it can be compared with others
    #[inline]
    pub fn normalized(raw: &TokenTypeRef) -> Self {
        Self::new(raw.as_str().to_ascii_lowercase())
    }
}

/// An authentication realm, used to scope challenges to a protection space
#[braid(serde, ref_doc = "A borrowed reference to a [`Realm`]")]
pub struct Realm;

macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, $default)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

/// An opaque bearer token credential
///
/// Bearer tokens grant access to whoever holds them, so the formatted forms
/// of this type hide the credential. The alternate flag (`{:#}`) reveals a
/// short prefix, or as many characters as the requested width.
#[braid(serde, debug = "owned", display = "owned")]
pub struct BearerToken;

limited_reveal!(BearerTokenRef: "BEARER TOKEN", 5);

fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}
