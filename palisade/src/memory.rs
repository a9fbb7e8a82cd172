//! An in-memory bearer token store

use std::{convert::Infallible, fmt, ops::Deref, sync::Arc};

use ahash::{AHashMap, AHashSet};
use arc_swap::ArcSwap;
use palisade_clock::UnixTime;
use palisade_oauth2::{HasScope, Scope};

use crate::{AccessToken, BearerToken, BearerTokenRef, BearerTokenStore, ResourceRequest};

/// A token record issued by an [`InMemoryTokenStore`], paired with the
/// credential that resolved it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken<T> {
    credential: BearerToken,
    token: T,
}

impl<T> IssuedToken<T> {
    /// The credential this token was issued under
    #[inline]
    pub fn credential(&self) -> &BearerTokenRef {
        &self.credential
    }

    /// Extracts the token record
    #[inline]
    pub fn into_inner(self) -> T {
        self.token
    }
}

impl<T> Deref for IssuedToken<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.token
    }
}

impl<T: HasScope> HasScope for IssuedToken<T> {
    #[inline]
    fn scope(&self) -> &Scope {
        self.token.scope()
    }
}

impl<T: AccessToken> AccessToken for IssuedToken<T> {
    #[inline]
    fn expires_at(&self) -> UnixTime {
        self.token.expires_at()
    }
}

/// A token store holding its records in memory
///
/// Tokens are inserted while setting up the store. Revocations may be
/// recorded at any time, including while requests are being validated.
///
/// ```
/// use palisade::{BasicAccessToken, BearerToken, BearerTokenValidator, InMemoryTokenStore};
/// use palisade_clock::UnixTime;
/// use palisade_oauth2::scope;
///
/// let mut store = InMemoryTokenStore::new();
/// store.insert(
///     BearerToken::from_static("s3cr3t"),
///     BasicAccessToken::new(scope!["read"], UnixTime::from_secs(4_102_444_800)),
/// );
///
/// let validator = BearerTokenValidator::new(store);
/// ```
pub struct InMemoryTokenStore<T> {
    tokens: AHashMap<BearerToken, T>,
    revoked: ArcSwap<AHashSet<BearerToken>>,
}

impl<T> Default for InMemoryTokenStore<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for InMemoryTokenStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InMemoryTokenStore")
            .field("tokens", &self.tokens.len())
            .field("revoked", &self.revoked.load().len())
            .finish()
    }
}

impl<T> InMemoryTokenStore<T> {
    /// Constructs an empty store
    pub fn new() -> Self {
        Self {
            tokens: AHashMap::new(),
            revoked: ArcSwap::from_pointee(AHashSet::new()),
        }
    }

    /// Records a token under its credential, replacing any previous record
    pub fn insert(&mut self, credential: BearerToken, token: T) -> &mut Self {
        self.tokens.insert(credential, token);
        self
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with_token(mut self, credential: BearerToken, token: T) -> Self {
        self.insert(credential, token);
        self
    }

    /// The number of tokens held
    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the store holds no tokens
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Revokes the token issued under `credential`
    ///
    /// Returns `true` only for the call that moved a known credential into
    /// the revoked set. Unknown and already revoked credentials return
    /// `false` and leave the set untouched.
    pub fn revoke(&self, credential: &BearerTokenRef) -> bool {
        if !self.tokens.contains_key(credential) {
            tracing::debug!(token = ?credential, "ignoring revocation of unknown bearer token");
            return false;
        }

        let previous = self.revoked.rcu(|revoked| {
            if revoked.contains(credential) {
                Arc::clone(revoked)
            } else {
                let mut revoked = AHashSet::clone(revoked);
                revoked.insert(credential.to_owned());
                Arc::new(revoked)
            }
        });

        let newly_revoked = !previous.contains(credential);
        if newly_revoked {
            tracing::debug!(token = ?credential, "revoked bearer token");
        }
        newly_revoked
    }

    /// Whether `credential` has been revoked
    #[inline]
    pub fn is_revoked(&self, credential: &BearerTokenRef) -> bool {
        self.revoked.load().contains(credential)
    }
}

impl<T> BearerTokenStore for InMemoryTokenStore<T>
where
    T: AccessToken + Clone + Send + Sync,
{
    type Token = IssuedToken<T>;
    type Error = Infallible;

    fn authenticate_token(&self, token: &BearerTokenRef) -> Result<Option<Self::Token>, Self::Error> {
        Ok(self
            .tokens
            .get_key_value(token)
            .map(|(credential, token)| IssuedToken {
                credential: credential.clone(),
                token: token.clone(),
            }))
    }

    #[inline]
    fn request_invalid(&self, _: &ResourceRequest<'_>) -> bool {
        false
    }

    #[inline]
    fn token_revoked(&self, token: &Self::Token) -> Result<bool, Self::Error> {
        Ok(self.is_revoked(token.credential()))
    }
}
