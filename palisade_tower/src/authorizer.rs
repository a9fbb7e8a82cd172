use std::{fmt, sync::Arc};

use http_body::Body;
use palisade::ResourceProtector;
use palisade_oauth2::{Scope, ScopeOperator};
use tower_http::validate_request::ValidateRequestHeaderLayer;

use crate::{
    verify::{Operator, VerifyAccessToken},
    OnAuthError, TerseErrorHandler, VerboseErrorHandler,
};

/// Builder for generating layers that authenticate access tokens and
/// authorize access based on oauth2 scope grants
pub struct Authorizer<T, OnError> {
    protector: ResourceProtector<T>,
    on_error: OnError,
}

impl<T, OnError> Clone for Authorizer<T, OnError>
where
    OnError: Clone,
{
    fn clone(&self) -> Self {
        Self {
            protector: self.protector.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T, OnError> fmt::Debug for Authorizer<T, OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("protector", &self.protector)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<T> Authorizer<T, ()> {
    /// Constructs a new authorizer over a resource protector
    ///
    /// An error handler must be attached before layers can be produced.
    #[inline]
    pub fn new(protector: ResourceProtector<T>) -> Self {
        Self {
            protector,
            on_error: (),
        }
    }

    /// Attaches a custom error handler to generate responses
    /// in the event of an authorization failure
    #[inline]
    pub fn with_error_handler<OnError>(self, on_error: OnError) -> Authorizer<T, OnError> {
        Authorizer {
            protector: self.protector,
            on_error,
        }
    }

    /// Attaches the default terse error handler: [`TerseErrorHandler`]
    ///
    /// This error handler generates responses containing the relevant
    /// status code and challenge with an empty body
    #[inline]
    pub fn with_terse_error_handler<ResBody: Body + Default>(
        self,
    ) -> Authorizer<T, TerseErrorHandler<ResBody>> {
        self.with_error_handler(TerseErrorHandler::new())
    }

    /// Attaches the default verbose error handler: [`VerboseErrorHandler`]
    ///
    /// This error handler generates responses containing the relevant
    /// status code and a challenge describing the failure, with an empty
    /// body
    #[inline]
    pub fn with_verbose_error_handler<ResBody: Body + Default>(
        self,
    ) -> Authorizer<T, VerboseErrorHandler<ResBody>> {
        self.with_error_handler(VerboseErrorHandler::new())
    }
}

impl<T, OnError> Authorizer<T, OnError> {
    /// The underlying resource protector
    #[inline]
    pub fn protector(&self) -> &ResourceProtector<T> {
        &self.protector
    }
}

impl<T, OnError> Authorizer<T, OnError>
where
    OnError: OnAuthError + Clone,
    OnError::Body: Body + Default,
    T: Clone + Send + Sync + 'static,
{
    /// Request validator requiring every token in `required` to have been
    /// granted
    pub fn verifier(&self, required: Scope) -> VerifyAccessToken<T, OnError> {
        self.verifier_with(required, ScopeOperator::All)
    }

    /// Request validator comparing scopes with `operator`
    pub fn verifier_with(
        &self,
        required: Scope,
        operator: ScopeOperator,
    ) -> VerifyAccessToken<T, OnError> {
        VerifyAccessToken::new(
            self.protector.clone(),
            required,
            Operator::Resolved(operator),
            self.on_error.clone(),
        )
    }

    /// Request validator comparing scopes with the operator named `operator`
    ///
    /// The name is resolved on each request. An unknown name rejects every
    /// request through [`OnAuthError::on_configuration_error`].
    pub fn verifier_named(&self, required: Scope, operator: &str) -> VerifyAccessToken<T, OnError> {
        VerifyAccessToken::new(
            self.protector.clone(),
            required,
            Operator::Named(Arc::from(operator)),
            self.on_error.clone(),
        )
    }

    /// Authorizer layer that requires every token in `required` to have been
    /// granted to the presented access token
    ///
    /// The token will be parsed from the request `Authorization` header and
    /// checked by the validator registered for its token type.
    ///
    /// The authenticated token will be made available through
    /// [`Request::extensions`][http::Request::extensions].
    pub fn scope_layer(
        &self,
        required: Scope,
    ) -> ValidateRequestHeaderLayer<VerifyAccessToken<T, OnError>> {
        ValidateRequestHeaderLayer::custom(self.verifier(required))
    }

    /// Authorizer layer that compares the presented access token's scope
    /// against `required` using `operator`
    pub fn scope_layer_with(
        &self,
        required: Scope,
        operator: ScopeOperator,
    ) -> ValidateRequestHeaderLayer<VerifyAccessToken<T, OnError>> {
        ValidateRequestHeaderLayer::custom(self.verifier_with(required, operator))
    }

    /// Authorizer layer that compares the presented access token's scope
    /// against `required` using the operator named `operator`, such as
    /// `"AND"` or `"OR"`
    pub fn scope_layer_named(
        &self,
        required: Scope,
        operator: &str,
    ) -> ValidateRequestHeaderLayer<VerifyAccessToken<T, OnError>> {
        ValidateRequestHeaderLayer::custom(self.verifier_named(required, operator))
    }
}
