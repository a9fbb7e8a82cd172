//! Authorizers for working with `tower_http` and other constructs in the
//! ecosystem, including `axum`.
//!
//! An [`Authorizer`] wraps a [`ResourceProtector`](palisade::ResourceProtector)
//! and produces [`ValidateRequestHeaderLayer`]s that authorize each request
//! against a required scope. The authenticated token is made available
//! through [`Request::extensions`][http::Request::extensions], while
//! rejections are turned into responses by an [`OnAuthError`] handler.
//!
//! ```
//! use http::{header, Request, StatusCode};
//! use palisade::{
//!     BasicAccessToken, BearerToken, BearerTokenValidator, InMemoryTokenStore, IssuedToken,
//!     ResourceProtector,
//! };
//! use palisade_clock::UnixTime;
//! use palisade_oauth2::scope;
//! use palisade_tower::Authorizer;
//! use tower_http::validate_request::ValidateRequest;
//!
//! let store = InMemoryTokenStore::new().with_token(
//!     BearerToken::from_static("s3cr3t"),
//!     BasicAccessToken::new(scope!["reports"], UnixTime::from_secs(4_102_444_800)),
//! );
//! let protector = ResourceProtector::new().with_validator(BearerTokenValidator::new(store));
//!
//! let authorizer = Authorizer::new(protector).with_verbose_error_handler::<String>();
//!
//! // Attach to a router with `.layer(authorizer.scope_layer(scope!["reports"]))`
//! let mut verify = authorizer.verifier(scope!["reports"]);
//!
//! let mut request = Request::get("/reports")
//!     .header(header::AUTHORIZATION, "Bearer s3cr3t")
//!     .body(())?;
//! assert!(verify.validate(&mut request).is_ok());
//! assert!(request
//!     .extensions()
//!     .get::<IssuedToken<BasicAccessToken>>()
//!     .is_some());
//!
//! let mut anonymous = Request::get("/reports").body(())?;
//! let response = verify.validate(&mut anonymous).unwrap_err();
//! assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`ValidateRequestHeaderLayer`]: tower_http::validate_request::ValidateRequestHeaderLayer

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

use std::{error::Error as StdError, fmt, marker::PhantomData};

use http::Response;
use palisade::{InvalidToken, Realm, RealmRef};
use palisade_oauth2::{InvalidScopeOperator, Scope};

mod authorizer;
pub mod util;
mod verify;

pub use authorizer::Authorizer;
pub use verify::VerifyAccessToken;

/// Handler for responding to rejections raised while authorizing a request
///
/// Each method corresponds to one kind of
/// [`AuthError`](palisade::AuthError).
pub trait OnAuthError {
    /// The body type returned on an error
    type Body;

    /// Response when the request carried no `Authorization` header
    fn on_missing_authorization(&self) -> Response<Self::Body>;

    /// Response when the `Authorization` header is malformed or names an
    /// unsupported token type
    fn on_unsupported_token_type(&self) -> Response<Self::Body>;

    /// Response when the token is unknown, expired, or revoked
    fn on_invalid_token(&self, error: InvalidToken) -> Response<Self::Body>;

    /// Response when the token store rejected the request itself
    fn on_invalid_request(&self, realm: Option<&RealmRef>) -> Response<Self::Body>;

    /// Response when the token lacks the required scope
    fn on_insufficient_scope(
        &self,
        realm: Option<&RealmRef>,
        required: &Scope,
    ) -> Response<Self::Body>;

    /// Response when the layer was configured with an unknown scope operator
    fn on_configuration_error(&self, error: InvalidScopeOperator) -> Response<Self::Body>;

    /// Response when the token store failed
    fn on_token_store_failure(
        &self,
        error: Box<dyn StdError + Send + Sync + 'static>,
    ) -> Response<Self::Body>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> OnAuthError for $ty
            where
                T: OnAuthError + ?Sized,
            {
                type Body = T::Body;

                fn on_missing_authorization(&self) -> Response<Self::Body> {
                    T::on_missing_authorization(self)
                }

                fn on_unsupported_token_type(&self) -> Response<Self::Body> {
                    T::on_unsupported_token_type(self)
                }

                fn on_invalid_token(&self, error: InvalidToken) -> Response<Self::Body> {
                    T::on_invalid_token(self, error)
                }

                fn on_invalid_request(&self, realm: Option<&RealmRef>) -> Response<Self::Body> {
                    T::on_invalid_request(self, realm)
                }

                fn on_insufficient_scope(
                    &self,
                    realm: Option<&RealmRef>,
                    required: &Scope,
                ) -> Response<Self::Body> {
                    T::on_insufficient_scope(self, realm, required)
                }

                fn on_configuration_error(&self, error: InvalidScopeOperator) -> Response<Self::Body> {
                    T::on_configuration_error(self, error)
                }

                fn on_token_store_failure(
                    &self,
                    error: Box<dyn StdError + Send + Sync + 'static>,
                ) -> Response<Self::Body> {
                    T::on_token_store_failure(self, error)
                }
            }
        )*
    }
}

delegate_impls!(
    &'_ T
    Box<T>
    std::rc::Rc<T>
    std::sync::Arc<T>
);

macro_rules! error_handler {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<ResBody> {
            realm: Option<Realm>,
            _ty: PhantomData<fn() -> ResBody>,
        }

        impl<ResBody> $name<ResBody> {
            /// Instantiates a new instance over a given body type
            #[inline]
            pub fn new() -> Self {
                Self {
                    realm: None,
                    _ty: PhantomData,
                }
            }

            /// Sets the realm advertised when a request carries no credentials
            #[inline]
            pub fn with_realm(self, realm: Realm) -> Self {
                Self {
                    realm: Some(realm),
                    _ty: PhantomData,
                }
            }
        }

        impl<ResBody> fmt::Debug for $name<ResBody> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("realm", &self.realm)
                    .finish()
            }
        }

        impl<ResBody> Default for $name<ResBody> {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl<ResBody> Clone for $name<ResBody> {
            #[inline]
            fn clone(&self) -> Self {
                Self {
                    realm: self.realm.clone(),
                    _ty: PhantomData,
                }
            }
        }
    };
}

error_handler! {
    /// Terse responders for authentication and authorization failures
    ///
    /// Responses carry the status code and challenge appropriate to the
    /// failure, with an empty body and no `error_description`.
    TerseErrorHandler
}

error_handler! {
    /// Verbose responders for authentication and authorization failures
    ///
    /// Like [`TerseErrorHandler`], but challenges also carry an
    /// `error_description` explaining the failure.
    VerboseErrorHandler
}

impl<ResBody> OnAuthError for TerseErrorHandler<ResBody>
where
    ResBody: Default,
{
    type Body = ResBody;

    #[inline]
    fn on_missing_authorization(&self) -> Response<Self::Body> {
        tracing::debug!("authorization failed: authorization header is missing");
        util::missing_authorization(self.realm.as_deref())
    }

    #[inline]
    fn on_unsupported_token_type(&self) -> Response<Self::Body> {
        tracing::debug!("authorization failed: unsupported token type");
        util::bad_request()
    }

    #[inline]
    fn on_invalid_token(&self, error: InvalidToken) -> Response<Self::Body> {
        tracing::debug!(reason = %error.reason(), "authorization failed: invalid token");
        util::invalid_token(error.realm(), "")
    }

    #[inline]
    fn on_invalid_request(&self, realm: Option<&RealmRef>) -> Response<Self::Body> {
        tracing::debug!("authorization failed: invalid request");
        util::invalid_request(realm, "")
    }

    #[inline]
    fn on_insufficient_scope(
        &self,
        realm: Option<&RealmRef>,
        required: &Scope,
    ) -> Response<Self::Body> {
        tracing::debug!(%required, "authorization failed: insufficient scope");
        util::insufficient_scope(realm, "", required)
    }

    #[inline]
    fn on_configuration_error(&self, error: InvalidScopeOperator) -> Response<Self::Body> {
        tracing::warn!(%error, "authorization layer is misconfigured");
        util::internal_server_error()
    }

    #[inline]
    fn on_token_store_failure(
        &self,
        error: Box<dyn StdError + Send + Sync + 'static>,
    ) -> Response<Self::Body> {
        tracing::warn!(%error, "token store failed");
        util::internal_server_error()
    }
}

impl<ResBody> OnAuthError for VerboseErrorHandler<ResBody>
where
    ResBody: Default,
{
    type Body = ResBody;

    #[inline]
    fn on_missing_authorization(&self) -> Response<Self::Body> {
        tracing::debug!("authorization failed: authorization header is missing");
        util::missing_authorization(self.realm.as_deref())
    }

    #[inline]
    fn on_unsupported_token_type(&self) -> Response<Self::Body> {
        tracing::debug!("authorization failed: unsupported token type");
        util::bad_request()
    }

    #[inline]
    fn on_invalid_token(&self, error: InvalidToken) -> Response<Self::Body> {
        let message = error.reason().to_string();
        tracing::debug!("authorization failed: {message}");
        util::invalid_token(error.realm(), &message)
    }

    #[inline]
    fn on_invalid_request(&self, realm: Option<&RealmRef>) -> Response<Self::Body> {
        let message = "request was rejected by the token store";
        tracing::debug!("authorization failed: {message}");
        util::invalid_request(realm, message)
    }

    #[inline]
    fn on_insufficient_scope(
        &self,
        realm: Option<&RealmRef>,
        required: &Scope,
    ) -> Response<Self::Body> {
        let message = "token does not grant the required scope";
        tracing::debug!(%required, "authorization failed: {message}");
        util::insufficient_scope(realm, message, required)
    }

    #[inline]
    fn on_configuration_error(&self, error: InvalidScopeOperator) -> Response<Self::Body> {
        tracing::warn!(%error, "authorization layer is misconfigured");
        util::internal_server_error()
    }

    #[inline]
    fn on_token_store_failure(
        &self,
        error: Box<dyn StdError + Send + Sync + 'static>,
    ) -> Response<Self::Body> {
        tracing::warn!(%error, "token store failed");
        util::internal_server_error()
    }
}
