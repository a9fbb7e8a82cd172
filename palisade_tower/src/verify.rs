use std::{fmt, sync::Arc};

use http::{Request, Response};
use http_body::Body;
use palisade::{AuthError, ResourceProtector, ResourceRequest};
use palisade_oauth2::{Scope, ScopeOperator};
use tower_http::validate_request::ValidateRequest;

use crate::OnAuthError;

#[derive(Clone, Debug)]
pub(crate) enum Operator {
    Resolved(ScopeOperator),
    Named(Arc<str>),
}

/// Request validator that authorizes the presented access token against a
/// required scope
///
/// On success, the authenticated token is inserted into the
/// [`Request::extensions`]. Construct one through
/// [`Authorizer`](crate::Authorizer).
pub struct VerifyAccessToken<T, OnError> {
    protector: ResourceProtector<T>,
    required: Arc<Scope>,
    operator: Operator,
    on_error: OnError,
}

impl<T, OnError> Clone for VerifyAccessToken<T, OnError>
where
    OnError: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            protector: self.protector.clone(),
            required: Arc::clone(&self.required),
            operator: self.operator.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T, OnError> fmt::Debug for VerifyAccessToken<T, OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerifyAccessToken")
            .field("protector", &self.protector)
            .field("required", &self.required)
            .field("operator", &self.operator)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<T, OnError> VerifyAccessToken<T, OnError> {
    #[inline]
    pub(crate) fn new(
        protector: ResourceProtector<T>,
        required: Scope,
        operator: Operator,
        on_error: OnError,
    ) -> Self {
        Self {
            protector,
            required: Arc::new(required),
            operator,
            on_error,
        }
    }

    /// The scope this validator requires
    #[inline]
    pub fn required(&self) -> &Scope {
        &self.required
    }
}

impl<T, OnError> VerifyAccessToken<T, OnError>
where
    OnError: OnAuthError,
{
    fn handle_auth_error(&self, error: AuthError) -> Response<OnError::Body> {
        match error {
            AuthError::MissingAuthorization => self.on_error.on_missing_authorization(),
            AuthError::UnsupportedTokenType => self.on_error.on_unsupported_token_type(),
            AuthError::InvalidToken(err) => self.on_error.on_invalid_token(err),
            AuthError::InvalidRequest { realm } => self.on_error.on_invalid_request(realm.as_deref()),
            AuthError::InsufficientScope { realm, required } => self
                .on_error
                .on_insufficient_scope(realm.as_deref(), &required),
            AuthError::Configuration(err) => self.on_error.on_configuration_error(err),
            AuthError::TokenStore(err) => self.on_error.on_token_store_failure(err),
        }
    }
}

impl<T, OnError, ReqBody> ValidateRequest<ReqBody> for VerifyAccessToken<T, OnError>
where
    OnError: OnAuthError,
    OnError::Body: Body + Default,
    T: Clone + Send + Sync + 'static,
{
    type ResponseBody = OnError::Body;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        let view = ResourceRequest::from(&*request);
        let result = match &self.operator {
            Operator::Resolved(operator) => {
                self.protector
                    .validate_with(&self.required, &view, operator)
            }
            Operator::Named(name) => {
                self.protector
                    .validate_with_operator_name(&self.required, &view, name)
            }
        };

        let token = result.map_err(|err| self.handle_auth_error(err))?;

        let _ = request.extensions_mut().insert(token);

        tracing::trace!("access token was authorized");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, io};

    use http::{header, HeaderValue, StatusCode};
    use palisade::{
        BasicAccessToken, BearerToken, BearerTokenRef, BearerTokenStore, BearerTokenValidator,
        InMemoryTokenStore, IssuedToken, Realm,
    };
    use palisade_clock::{TestClock, UnixTime};
    use palisade_oauth2::scope;
    use tracing_test::traced_test;

    use crate::{Authorizer, TerseErrorHandler, VerboseErrorHandler};

    use super::*;

    type Token = IssuedToken<BasicAccessToken>;

    fn protector() -> ResourceProtector<Token> {
        let store = InMemoryTokenStore::new()
            .with_token(
                BearerToken::from_static("reader"),
                BasicAccessToken::new(scope!["read"], UnixTime::from_secs(2_000)),
            )
            .with_token(
                BearerToken::from_static("stale"),
                BasicAccessToken::new(scope!["read"], UnixTime::from_secs(500)),
            );
        let validator = BearerTokenValidator::new(store)
            .with_realm(Realm::from_static("api"))
            .with_clock(TestClock::new(UnixTime::from_secs(1_000)));
        ResourceProtector::new().with_validator(validator)
    }

    fn terse() -> Authorizer<Token, TerseErrorHandler<String>> {
        Authorizer::new(protector()).with_error_handler(
            TerseErrorHandler::new().with_realm(Realm::from_static("api")),
        )
    }

    fn request(authorization: Option<&str>) -> Request<()> {
        let mut builder = Request::get("/documents");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap()
    }

    fn challenges<B>(resp: &Response<B>) -> BTreeSet<&str> {
        resp.headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    #[test]
    fn authorized_token_is_placed_in_extensions() {
        let mut verify = terse().verifier(scope!["read"]);
        let mut req = request(Some("Bearer reader"));

        verify.validate(&mut req).unwrap();

        let token = req.extensions().get::<Token>().unwrap();
        assert_eq!(token.credential().as_str(), "reader");
        assert_eq!(token.scope, scope!["read"]);
    }

    #[test]
    fn missing_authorization_is_challenged_with_the_handler_realm() {
        let mut verify = terse().verifier(scope!["read"]);

        let resp = verify.validate(&mut request(None)).unwrap_err();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(challenges(&resp), BTreeSet::from([r#"Bearer realm="api""#]));
    }

    #[test]
    fn unsupported_token_type_is_a_bad_request_without_challenge() {
        let mut verify = terse().verifier(scope!["read"]);

        let resp = verify
            .validate(&mut request(Some("Digest abc123")))
            .unwrap_err();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(challenges(&resp).is_empty());
    }

    #[test]
    fn invalid_token_is_challenged_with_the_validator_realm() {
        let mut verify = terse().verifier(scope!["read"]);

        for credential in ["Bearer unknown", "Bearer stale"] {
            let resp = verify.validate(&mut request(Some(credential))).unwrap_err();

            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                challenges(&resp),
                BTreeSet::from([r#"Bearer realm="api", error="invalid_token""#])
            );
        }
    }

    #[test]
    fn insufficient_scope_is_forbidden_and_names_the_scope() {
        let mut verify = terse().verifier(scope!["read", "write"]);

        let resp = verify
            .validate(&mut request(Some("Bearer reader")))
            .unwrap_err();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            challenges(&resp),
            BTreeSet::from([r#"Bearer realm="api", error="insufficient_scope", scope="read write""#])
        );
    }

    #[test]
    fn operator_applies_to_the_layer() {
        let authorizer = terse();

        let mut any = authorizer.verifier_with(scope!["read", "write"], ScopeOperator::Any);
        assert!(any.validate(&mut request(Some("Bearer reader"))).is_ok());

        let mut named = authorizer.verifier_named(scope!["write", "read"], "OR");
        assert!(named.validate(&mut request(Some("Bearer reader"))).is_ok());
    }

    #[test]
    fn unknown_operator_name_is_a_server_error() {
        let mut verify = terse().verifier_named(scope!["read"], "XOR");

        let resp = verify
            .validate(&mut request(Some("Bearer reader")))
            .unwrap_err();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(challenges(&resp).is_empty());
    }

    #[test]
    fn verbose_handler_describes_the_failure() {
        let mut verify = Authorizer::new(protector())
            .with_verbose_error_handler::<String>()
            .verifier(scope!["read"]);

        let resp = verify
            .validate(&mut request(Some("Bearer stale")))
            .unwrap_err();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            challenges(&resp),
            BTreeSet::from([
                r#"Bearer realm="api", error="invalid_token", error_description="token expired""#
            ])
        );
    }

    #[test]
    fn verbose_handler_without_realm_gives_a_bare_challenge() {
        let mut verify = Authorizer::new(protector())
            .with_error_handler(VerboseErrorHandler::<String>::new())
            .verifier(scope!["read"]);

        let resp = verify.validate(&mut request(None)).unwrap_err();

        assert_eq!(challenges(&resp), BTreeSet::from(["Bearer"]));
    }

    struct PickyStore;

    impl BearerTokenStore for PickyStore {
        type Token = BasicAccessToken;
        type Error = io::Error;

        fn authenticate_token(
            &self,
            token: &BearerTokenRef,
        ) -> Result<Option<Self::Token>, Self::Error> {
            match token.as_str() {
                "offline" => Err(io::Error::new(io::ErrorKind::NotConnected, "store offline")),
                _ => Ok(Some(BasicAccessToken::new(
                    Scope::empty(),
                    UnixTime::from_secs(2_000),
                ))),
            }
        }

        fn request_invalid(&self, request: &ResourceRequest<'_>) -> bool {
            request.header("x-client-id").is_none()
        }

        fn token_revoked(&self, _: &Self::Token) -> Result<bool, Self::Error> {
            Ok(false)
        }
    }

    fn picky() -> VerifyAccessToken<BasicAccessToken, TerseErrorHandler<String>> {
        let validator = BearerTokenValidator::new(PickyStore)
            .with_clock(TestClock::new(UnixTime::from_secs(1_000)));
        Authorizer::new(ResourceProtector::new().with_validator(validator))
            .with_terse_error_handler::<String>()
            .verifier(Scope::empty())
    }

    #[test]
    fn invalid_request_is_a_bad_request_with_challenge() {
        let resp = picky()
            .validate(&mut request(Some("Bearer anything")))
            .unwrap_err();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            challenges(&resp),
            BTreeSet::from([r#"Bearer error="invalid_request""#])
        );

        let mut req = request(Some("Bearer anything"));
        req.headers_mut()
            .insert("x-client-id", HeaderValue::from_static("cli"));
        assert!(picky().validate(&mut req).is_ok());
    }

    #[test]
    #[traced_test]
    fn token_store_failure_is_a_server_error() {
        let resp = picky()
            .validate(&mut request(Some("Bearer offline")))
            .unwrap_err();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(challenges(&resp).is_empty());
        assert!(logs_contain("store offline"));
    }

    #[test]
    fn handler_can_be_shared_behind_a_pointer() {
        let handler = Arc::new(TerseErrorHandler::<String>::new());
        let mut verify = Authorizer::new(protector())
            .with_error_handler(handler)
            .verifier(scope!["read"]);

        let resp = verify.validate(&mut request(None)).unwrap_err();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
