use std::sync::Arc;

use palisade_oauth2::{Scope, ScopeOperator};

use crate::{AuthError, ResourceRequest, TokenTypeRef};

/// Validates credentials of a single token type
///
/// A validator is registered with a [`ResourceProtector`](crate::ResourceProtector)
/// under its [`token_type`](TokenValidator::token_type). When a request
/// presents that scheme in its `Authorization` header, the credential
/// following the scheme is handed to [`validate`](TokenValidator::validate).
pub trait TokenValidator {
    /// The authenticated token produced on success
    type Token;

    /// The scheme this validator handles, such as `bearer`
    ///
    /// Matching against the `Authorization` header is case-insensitive.
    fn token_type(&self) -> &TokenTypeRef;

    /// Validates a credential against the required scope
    fn validate(
        &self,
        credential: &str,
        required: &Scope,
        request: &ResourceRequest<'_>,
        operator: &ScopeOperator,
    ) -> Result<Self::Token, AuthError>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> TokenValidator for $ty
            where
                T: TokenValidator + ?Sized,
            {
                type Token = T::Token;

                #[inline]
                fn token_type(&self) -> &TokenTypeRef {
                    T::token_type(self)
                }

                #[inline]
                fn validate(
                    &self,
                    credential: &str,
                    required: &Scope,
                    request: &ResourceRequest<'_>,
                    operator: &ScopeOperator,
                ) -> Result<Self::Token, AuthError> {
                    T::validate(self, credential, required, request, operator)
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
