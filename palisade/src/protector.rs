use std::{collections::hash_map::Entry, fmt, sync::Arc};

use ahash::AHashMap;
use http::header::AUTHORIZATION;
use palisade_oauth2::{Scope, ScopeOperator};

use crate::{AuthError, ResourceRequest, TokenType, TokenTypeRef, TokenValidator};

type SharedValidator<T> = Arc<dyn TokenValidator<Token = T> + Send + Sync>;

/// Protects resources by dispatching requests to the validator for the
/// token type they present
///
/// A protector is set up once with the validators it should accept, then
/// shared between request handlers. Cloning is cheap.
///
/// ```
/// use palisade::{
///     AuthError, BasicAccessToken, BearerToken, BearerTokenValidator, InMemoryTokenStore,
///     ResourceProtector, ResourceRequest,
/// };
/// use palisade_clock::UnixTime;
/// use palisade_oauth2::scope;
///
/// let store = InMemoryTokenStore::new().with_token(
///     BearerToken::from_static("s3cr3t"),
///     BasicAccessToken::new(scope!["read"], UnixTime::from_secs(4_102_444_800)),
/// );
/// let protector = ResourceProtector::new().with_validator(BearerTokenValidator::new(store));
///
/// let request = http::Request::get("/reports")
///     .header("Authorization", "Bearer s3cr3t")
///     .body(())?;
/// let token = protector.validate(&scope!["read"], &ResourceRequest::from(&request))?;
/// assert_eq!(token.credential().as_str(), "s3cr3t");
///
/// let anonymous = http::Request::get("/reports").body(())?;
/// assert!(matches!(
///     protector.validate(&scope!["read"], &ResourceRequest::from(&anonymous)),
///     Err(AuthError::MissingAuthorization),
/// ));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ResourceProtector<T> {
    validators: AHashMap<TokenType, SharedValidator<T>>,
}

impl<T> Clone for ResourceProtector<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            validators: self.validators.clone(),
        }
    }
}

impl<T> Default for ResourceProtector<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ResourceProtector<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut token_types: Vec<_> = self.token_types().collect();
        token_types.sort_unstable();
        f.debug_struct("ResourceProtector")
            .field("token_types", &token_types)
            .finish()
    }
}

impl<T> ResourceProtector<T> {
    /// Constructs a protector with no registered validators
    ///
    /// Until a validator is registered, every request carrying credentials
    /// is rejected as presenting an unsupported token type.
    pub fn new() -> Self {
        Self {
            validators: AHashMap::new(),
        }
    }

    /// Registers a validator for its token type
    ///
    /// Token types are matched case-insensitively. If a validator is already
    /// registered for the same token type, the new one is ignored.
    pub fn register<V>(&mut self, validator: V)
    where
        V: TokenValidator<Token = T> + Send + Sync + 'static,
    {
        let token_type = TokenType::normalized(validator.token_type());
        match self.validators.entry(token_type) {
            Entry::Occupied(entry) => {
                tracing::debug!(
                    token_type = %entry.key(),
                    "validator already registered for token type, ignoring"
                );
            }
            Entry::Vacant(entry) => {
                tracing::trace!(token_type = %entry.key(), "registered validator");
                entry.insert(Arc::new(validator));
            }
        }
    }

    /// Builder-style variant of [`register`](Self::register)
    #[inline]
    pub fn with_validator<V>(mut self, validator: V) -> Self
    where
        V: TokenValidator<Token = T> + Send + Sync + 'static,
    {
        self.register(validator);
        self
    }

    /// Whether a validator is registered for `token_type`, compared
    /// case-insensitively
    pub fn is_registered(&self, token_type: &TokenTypeRef) -> bool {
        self.validators
            .contains_key(&TokenType::normalized(token_type))
    }

    /// The lower-cased token types with a registered validator, in no
    /// particular order
    pub fn token_types(&self) -> impl Iterator<Item = &TokenTypeRef> {
        self.validators.keys().map(|k| &**k)
    }

    /// Authorizes a request, requiring every token in `required` to have been
    /// granted
    #[inline]
    pub fn validate(&self, required: &Scope, request: &ResourceRequest<'_>) -> Result<T, AuthError> {
        self.validate_with(required, request, &ScopeOperator::All)
    }

    /// Authorizes a request, comparing scopes with `operator`
    ///
    /// The credential is taken from the `Authorization` header, which must
    /// hold a token type and a credential separated by whitespace. The
    /// validator registered for the token type then decides the outcome.
    pub fn validate_with(
        &self,
        required: &Scope,
        request: &ResourceRequest<'_>,
        operator: &ScopeOperator,
    ) -> Result<T, AuthError> {
        let (scheme, credential) = parse_authorization(request)?;

        let validator = self
            .validators
            .get(&TokenType::new(scheme.to_ascii_lowercase()))
            .ok_or_else(|| {
                tracing::debug!(token_type = scheme, "no validator registered for token type");
                AuthError::UnsupportedTokenType
            })?;

        tracing::trace!(token_type = %validator.token_type(), "dispatching to validator");
        validator.validate(credential, required, request, operator)
    }

    /// Authorizes a request, comparing scopes with the operator named
    /// `operator`
    ///
    /// The name is parsed before the request is inspected, so an unknown
    /// operator is reported as [`AuthError::Configuration`] no matter what
    /// the request carries.
    pub fn validate_with_operator_name(
        &self,
        required: &Scope,
        request: &ResourceRequest<'_>,
        operator: &str,
    ) -> Result<T, AuthError> {
        let operator: ScopeOperator = operator.parse()?;
        self.validate_with(required, request, &operator)
    }
}

/// Splits the `Authorization` header into its scheme and credential
fn parse_authorization<'a>(request: &ResourceRequest<'a>) -> Result<(&'a str, &'a str), AuthError> {
    let header = match request.header(AUTHORIZATION) {
        Some(header) if !header.is_empty() => header,
        _ => {
            tracing::trace!("no authorization header present");
            return Err(AuthError::MissingAuthorization);
        }
    };

    let value = header.to_str().map_err(|_| {
        tracing::debug!("authorization header is not visible ASCII");
        AuthError::UnsupportedTokenType
    })?;

    match value.trim().split_once(char::is_whitespace) {
        Some((scheme, credential)) if !credential.trim_start().is_empty() => {
            Ok((scheme, credential.trim_start()))
        }
        _ => {
            tracing::debug!("authorization header does not hold a scheme and credential");
            Err(AuthError::UnsupportedTokenType)
        }
    }
}
