//! Validation of RFC 6750 bearer tokens

use std::{error::Error as StdError, fmt, sync::Arc};

use palisade_clock::{Clock, System};
use palisade_oauth2::{HasScope, Scope, ScopeOperator, ScopeRequirement};
use palisade_traits::Policy;

use crate::{
    error::{InvalidToken, InvalidTokenReason},
    AccessToken, AuthError, BearerTokenRef, Realm, RealmRef, ResourceRequest, TokenType,
    TokenTypeRef, TokenValidator,
};

/// The capabilities a bearer token validator needs from the embedding
/// application
///
/// Implementations typically wrap a database or cache. All methods are
/// required. When a store is shared between concurrent requests, it must be
/// safe to call from several threads at once.
pub trait BearerTokenStore: Send + Sync {
    /// The token record resolved from a bearer credential
    type Token: AccessToken;

    /// A failure to reach or query the underlying store
    type Error: StdError + Send + Sync + 'static;

    /// Resolves a bearer credential to a token record
    ///
    /// Returns `Ok(None)` when the credential is not recognized.
    fn authenticate_token(&self, token: &BearerTokenRef) -> Result<Option<Self::Token>, Self::Error>;

    /// Checks the shape of the request beyond its credential
    ///
    /// Return `true` to reject the request as invalid, for instance when a
    /// required custom header is missing. Stores with no such requirement
    /// return `false`.
    fn request_invalid(&self, request: &ResourceRequest<'_>) -> bool;

    /// Checks whether the token has been revoked
    fn token_revoked(&self, token: &Self::Token) -> Result<bool, Self::Error>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> BearerTokenStore for $ty
            where
                T: BearerTokenStore + ?Sized,
            {
                type Token = T::Token;
                type Error = T::Error;

                #[inline]
                fn authenticate_token(
                    &self,
                    token: &BearerTokenRef,
                ) -> Result<Option<Self::Token>, Self::Error> {
                    T::authenticate_token(self, token)
                }

                #[inline]
                fn request_invalid(&self, request: &ResourceRequest<'_>) -> bool {
                    T::request_invalid(self, request)
                }

                #[inline]
                fn token_revoked(&self, token: &Self::Token) -> Result<bool, Self::Error> {
                    T::token_revoked(self, token)
                }
            }
        )*
    }
}

delegate_impls!(
    &'_ T
    Box<T>
    Arc<T>
);

/// Validator for the `bearer` token type
///
/// Each credential runs through an ordered pipeline, and the first failing
/// check decides the rejection:
///
/// 1. the store must recognize the token, else [`AuthError::InvalidToken`]
/// 2. the store must accept the request, else [`AuthError::InvalidRequest`]
/// 3. the token must not have expired, else [`AuthError::InvalidToken`]
/// 4. the token must not be revoked, else [`AuthError::InvalidToken`]
/// 5. the token's scope must satisfy the requirement, else
///    [`AuthError::InsufficientScope`]
///
/// Later checks never run once an earlier one fails; in particular, the
/// scope of an expired or revoked token is never inspected.
pub struct BearerTokenValidator<S, C = System> {
    store: S,
    clock: C,
    realm: Option<Realm>,
    token_type: TokenType,
}

impl<S, C> fmt::Debug for BearerTokenValidator<S, C>
where
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BearerTokenValidator")
            .field("clock", &self.clock)
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl<S, C> Clone for BearerTokenValidator<S, C>
where
    S: Clone,
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            realm: self.realm.clone(),
            token_type: self.token_type.clone(),
        }
    }
}

impl<S> BearerTokenValidator<S, System> {
    /// Constructs a validator over a token store, using the system clock
    #[inline]
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: System,
            realm: None,
            token_type: TokenType::bearer(),
        }
    }
}

impl<S, C> BearerTokenValidator<S, C> {
    /// Sets the realm reported with this validator's rejections
    #[inline]
    pub fn with_realm(self, realm: Realm) -> Self {
        Self {
            realm: Some(realm),
            ..self
        }
    }

    /// Replaces the clock used to decide expiration
    #[inline]
    pub fn with_clock<C2>(self, clock: C2) -> BearerTokenValidator<S, C2> {
        BearerTokenValidator {
            store: self.store,
            clock,
            realm: self.realm,
            token_type: self.token_type,
        }
    }

    /// The realm reported with this validator's rejections
    #[inline]
    pub fn realm(&self) -> Option<&RealmRef> {
        self.realm.as_deref()
    }

    /// The underlying token store
    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn invalid_token(&self, reason: InvalidTokenReason) -> AuthError {
        tracing::debug!(%reason, "rejecting bearer token");
        InvalidToken::new(reason, self.realm.clone()).into()
    }
}

impl<S, C> BearerTokenValidator<S, C>
where
    S: BearerTokenStore,
    C: Clock,
{
    /// Whether the token's expiration time lies strictly before the current
    /// time
    ///
    /// A token expiring at exactly the current instant is still valid.
    #[inline]
    pub fn token_expired(&self, token: &S::Token) -> bool {
        token.expires_at() < self.clock.now()
    }

    /// Whether the token's scope fails to satisfy `required` under
    /// `operator`
    ///
    /// An empty `required` scope is always satisfied.
    #[inline]
    pub fn scope_insufficient(
        &self,
        token: &S::Token,
        required: &Scope,
        operator: &ScopeOperator,
    ) -> bool {
        ScopeRequirement::new(required, operator)
            .evaluate(token.scope())
            .is_err()
    }
}

impl<S, C> TokenValidator for BearerTokenValidator<S, C>
where
    S: BearerTokenStore,
    C: Clock,
{
    type Token = S::Token;

    #[inline]
    fn token_type(&self) -> &TokenTypeRef {
        &self.token_type
    }

    fn validate(
        &self,
        credential: &str,
        required: &Scope,
        request: &ResourceRequest<'_>,
        operator: &ScopeOperator,
    ) -> Result<Self::Token, AuthError> {
        let credential = BearerTokenRef::from_str(credential);

        let token = self
            .store
            .authenticate_token(credential)
            .map_err(AuthError::token_store)?
            .ok_or_else(|| self.invalid_token(InvalidTokenReason::Unknown))?;

        if self.store.request_invalid(request) {
            tracing::debug!("rejecting request: token store reports it invalid");
            return Err(AuthError::InvalidRequest {
                realm: self.realm.clone(),
            });
        }

        if self.token_expired(&token) {
            return Err(self.invalid_token(InvalidTokenReason::Expired));
        }

        if self
            .store
            .token_revoked(&token)
            .map_err(AuthError::token_store)?
        {
            return Err(self.invalid_token(InvalidTokenReason::Revoked));
        }

        if self.scope_insufficient(&token, required, operator) {
            tracing::debug!(
                granted = %token.scope(),
                required = %required,
                ?operator,
                "rejecting bearer token: insufficient scope"
            );
            return Err(AuthError::InsufficientScope {
                realm: self.realm.clone(),
                required: required.clone(),
            });
        }

        tracing::trace!(token = ?credential, "bearer token accepted");

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        io,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use palisade_clock::{TestClock, UnixTime};
    use palisade_oauth2::scope;
    use tracing_test::traced_test;

    use super::*;
    use crate::{error::InvalidTokenReason, AuthErrorKind, BasicAccessToken};

    const NOW: u64 = 1_700_000_000;

    #[derive(Default)]
    struct FakeStore {
        tokens: HashMap<String, BasicAccessToken>,
        revoked: Vec<String>,
        require_device_header: bool,
        fail_lookups: bool,
        revocation_checks: AtomicUsize,
    }

    impl FakeStore {
        fn with_token(mut self, credential: &str, scope: Scope, expires_at: UnixTime) -> Self {
            self.tokens.insert(
                credential.to_owned(),
                BasicAccessToken::new(scope, expires_at),
            );
            self
        }

        fn with_revoked(mut self, credential: &str) -> Self {
            self.revoked.push(credential.to_owned());
            self
        }
    }

    impl BearerTokenStore for FakeStore {
        type Token = BasicAccessToken;
        type Error = io::Error;

        fn authenticate_token(
            &self,
            token: &BearerTokenRef,
        ) -> Result<Option<Self::Token>, Self::Error> {
            if self.fail_lookups {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "lookup timed out"));
            }
            Ok(self.tokens.get(token.as_str()).cloned())
        }

        fn request_invalid(&self, request: &ResourceRequest<'_>) -> bool {
            self.require_device_header && request.header("x-device-version").is_none()
        }

        fn token_revoked(&self, token: &Self::Token) -> Result<bool, Self::Error> {
            self.revocation_checks.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .revoked
                .iter()
                .filter_map(|c| self.tokens.get(c))
                .any(|t| t == token))
        }
    }

    fn validator(store: FakeStore) -> BearerTokenValidator<FakeStore, TestClock> {
        BearerTokenValidator::new(store)
            .with_realm(Realm::from_static("api"))
            .with_clock(TestClock::new(UnixTime::from_secs(NOW)))
    }

    fn fresh() -> UnixTime {
        UnixTime::from_secs(NOW + 3600)
    }

    fn run(
        validator: &BearerTokenValidator<FakeStore, TestClock>,
        credential: &str,
        required: &Scope,
        operator: &ScopeOperator,
    ) -> Result<BasicAccessToken, AuthError> {
        let request = http::Request::builder().body(()).unwrap();
        validator.validate(
            credential,
            required,
            &ResourceRequest::from(&request),
            operator,
        )
    }

    fn invalid_token_reason(result: Result<BasicAccessToken, AuthError>) -> InvalidTokenReason {
        match result {
            Err(AuthError::InvalidToken(err)) => err.reason(),
            other => panic!("expected an invalid token rejection, got {other:?}"),
        }
    }

    #[test]
    fn valid_token_is_returned() {
        let v = validator(FakeStore::default().with_token("abc", scope!["read"], fresh()));
        let token = run(&v, "abc", &scope!["read"], &ScopeOperator::All).unwrap();
        assert_eq!(token.scope, scope!["read"]);
    }

    #[test]
    fn unknown_token_is_invalid() {
        let v = validator(FakeStore::default());
        let result = run(&v, "nope", &Scope::empty(), &ScopeOperator::All);
        assert_eq!(invalid_token_reason(result), InvalidTokenReason::Unknown);
    }

    #[test]
    fn rejections_carry_the_configured_realm() {
        let v = validator(FakeStore::default());
        let err = run(&v, "nope", &Scope::empty(), &ScopeOperator::All).unwrap_err();
        assert_eq!(err.realm().map(RealmRef::as_str), Some("api"));
    }

    #[test]
    fn token_expiring_now_is_not_expired() {
        let v = validator(FakeStore::default().with_token(
            "abc",
            Scope::empty(),
            UnixTime::from_secs(NOW),
        ));
        assert!(run(&v, "abc", &Scope::empty(), &ScopeOperator::All).is_ok());
    }

    #[test]
    fn token_one_microsecond_past_expiry_is_expired() {
        let store = FakeStore::default().with_token("abc", Scope::empty(), UnixTime::from_secs(NOW));
        let mut clock = TestClock::new(UnixTime::from_secs(NOW));
        clock.inc_micros(1);
        let v = validator(store).with_clock(clock);

        let result = run(&v, "abc", &Scope::empty(), &ScopeOperator::All);
        assert_eq!(invalid_token_reason(result), InvalidTokenReason::Expired);
    }

    #[test]
    fn expired_token_skips_revocation_and_scope_checks() {
        let predicate_called = Arc::new(AtomicBool::new(false));
        let operator = {
            let called = Arc::clone(&predicate_called);
            ScopeOperator::custom(move |_, _| {
                called.store(true, Ordering::SeqCst);
                true
            })
        };
        let v = validator(FakeStore::default().with_token(
            "abc",
            Scope::empty(),
            UnixTime::from_secs(NOW - 1),
        ));

        let result = run(&v, "abc", &scope!["read"], &operator);

        assert_eq!(invalid_token_reason(result), InvalidTokenReason::Expired);
        assert_eq!(v.store().revocation_checks.load(Ordering::SeqCst), 0);
        assert!(!predicate_called.load(Ordering::SeqCst));
    }

    #[test]
    fn revoked_token_is_invalid() {
        let v = validator(
            FakeStore::default()
                .with_token("abc", scope!["read"], fresh())
                .with_revoked("abc"),
        );
        let result = run(&v, "abc", &scope!["read"], &ScopeOperator::All);
        assert_eq!(invalid_token_reason(result), InvalidTokenReason::Revoked);
    }

    #[test]
    fn revocation_takes_precedence_over_insufficient_scope() {
        let v = validator(
            FakeStore::default()
                .with_token("abc", scope!["read"], fresh())
                .with_revoked("abc"),
        );
        let result = run(&v, "abc", &scope!["admin"], &ScopeOperator::All);
        assert_eq!(invalid_token_reason(result), InvalidTokenReason::Revoked);
    }

    #[test]
    fn invalid_request_is_checked_before_expiry() {
        let store = FakeStore {
            require_device_header: true,
            ..FakeStore::default()
        }
        .with_token("abc", Scope::empty(), UnixTime::from_secs(NOW - 1));
        let v = validator(store);

        let err = run(&v, "abc", &Scope::empty(), &ScopeOperator::All).unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidRequest);
    }

    #[test]
    fn request_with_required_header_is_accepted() {
        let store = FakeStore {
            require_device_header: true,
            ..FakeStore::default()
        }
        .with_token("abc", Scope::empty(), fresh());
        let v = validator(store);

        let request = http::Request::builder()
            .header("X-Device-Version", "2")
            .body(())
            .unwrap();
        let result = v.validate(
            "abc",
            &Scope::empty(),
            &ResourceRequest::from(&request),
            &ScopeOperator::All,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn all_operator_requires_every_scope() {
        let v = validator(FakeStore::default().with_token("abc", scope!["read", "write"], fresh()));

        assert!(run(&v, "abc", &scope!["read"], &ScopeOperator::All).is_ok());

        let err = run(&v, "abc", &scope!["read", "admin"], &ScopeOperator::All).unwrap_err();
        match err {
            AuthError::InsufficientScope { required, realm } => {
                assert_eq!(required, scope!["read", "admin"]);
                assert_eq!(realm, Some(Realm::from_static("api")));
            }
            other => panic!("expected insufficient scope, got {other:?}"),
        }
    }

    #[test]
    fn any_operator_requires_one_scope() {
        let v = validator(FakeStore::default().with_token("abc", scope!["read"], fresh()));

        assert!(run(&v, "abc", &scope!["write", "read"], &ScopeOperator::Any).is_ok());

        let err = run(&v, "abc", &scope!["write", "admin"], &ScopeOperator::Any).unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InsufficientScope);
    }

    #[test]
    fn empty_required_scope_is_sufficient_for_every_operator() {
        let v = validator(FakeStore::default().with_token("abc", Scope::empty(), fresh()));
        let never = ScopeOperator::custom(|_, _| false);

        for operator in [ScopeOperator::All, ScopeOperator::Any, never] {
            assert!(run(&v, "abc", &Scope::empty(), &operator).is_ok());
        }
    }

    #[test]
    fn custom_operator_result_is_inverted_into_the_verdict() {
        let v = validator(FakeStore::default().with_token("abc", scope!["read"], fresh()));
        let token = BasicAccessToken::new(scope!["read"], fresh());
        let required = scope!["admin"];

        let allow = ScopeOperator::custom(|granted, required| {
            granted.contains_all(&scope!["read"]) && required.contains_all(&scope!["admin"])
        });
        let deny = ScopeOperator::custom(|_, _| false);

        assert!(!v.scope_insufficient(&token, &required, &allow));
        assert!(v.scope_insufficient(&token, &required, &deny));

        assert!(run(&v, "abc", &required, &allow).is_ok());
        assert_eq!(
            run(&v, "abc", &required, &deny).unwrap_err().kind(),
            AuthErrorKind::InsufficientScope
        );
    }

    #[test]
    fn store_failures_are_not_authorization_outcomes() {
        let v = validator(FakeStore {
            fail_lookups: true,
            ..FakeStore::default()
        });

        let err = run(&v, "abc", &Scope::empty(), &ScopeOperator::All).unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::TokenStore);
    }

    #[test]
    fn token_type_is_bearer() {
        let v = validator(FakeStore::default());
        assert_eq!(v.token_type(), &*TokenType::bearer());
    }

    #[test]
    #[traced_test]
    fn rejection_reason_is_logged_without_the_credential() {
        let v = validator(FakeStore::default().with_token(
            "s3cr3t-credential",
            Scope::empty(),
            UnixTime::from_secs(NOW - 1),
        ));

        let _ = run(&v, "s3cr3t-credential", &Scope::empty(), &ScopeOperator::All);

        assert!(logs_contain("token expired"));
        assert!(!logs_contain("s3cr3t-credential"));
    }
}
