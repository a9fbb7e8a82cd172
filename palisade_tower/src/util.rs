//! Utilities for generating HTTP responses on authorization failures
//!
//! Challenges follow the `WWW-Authenticate` syntax of
//! [RFC 6750, Section 3](https://datatracker.ietf.org/doc/html/rfc6750#section-3).
//! Realms and descriptions are escaped with [`str::escape_default`], so any
//! input produces a valid header value.

use std::fmt::Write;

use http::{header, HeaderValue, Response, StatusCode};
use palisade::RealmRef;
use palisade_oauth2::Scope;

/// Build a `401 Unauthorized` response challenging a request that carried no
/// credentials
///
/// The prepared response will have the form:
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// www-authenticate: Bearer realm="{realm}"
/// ```
///
/// `realm` is omitted when not given, leaving a bare `Bearer` challenge.
pub fn missing_authorization<Body: Default>(realm: Option<&RealmRef>) -> Response<Body> {
    respond(
        StatusCode::UNAUTHORIZED,
        Some(challenge(realm, None, "", None)),
    )
}

/// Build a `401 Unauthorized` response for a token that is unknown, expired,
/// or revoked
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// www-authenticate: Bearer realm="{realm}", error="invalid_token", error_description="{description}"
/// ```
///
/// `realm` is omitted when not given; `error_description` is omitted if
/// `description` is empty.
pub fn invalid_token<Body: Default>(realm: Option<&RealmRef>, description: &str) -> Response<Body> {
    respond(
        StatusCode::UNAUTHORIZED,
        Some(challenge(realm, Some("invalid_token"), description, None)),
    )
}

/// Build a `400 Bad Request` response for a request the token store rejected
///
/// ```http
/// HTTP/1.1 400 Bad Request
/// www-authenticate: Bearer realm="{realm}", error="invalid_request", error_description="{description}"
/// ```
pub fn invalid_request<Body: Default>(
    realm: Option<&RealmRef>,
    description: &str,
) -> Response<Body> {
    respond(
        StatusCode::BAD_REQUEST,
        Some(challenge(realm, Some("invalid_request"), description, None)),
    )
}

/// Build a `403 Forbidden` response for a token lacking the required scope
///
/// ```http
/// HTTP/1.1 403 Forbidden
/// www-authenticate: Bearer realm="{realm}", error="insufficient_scope", error_description="{description}", scope="{required}"
/// ```
///
/// `scope` is omitted when `required` is empty.
pub fn insufficient_scope<Body: Default>(
    realm: Option<&RealmRef>,
    description: &str,
    required: &Scope,
) -> Response<Body> {
    let scope = (!required.is_empty()).then_some(required);
    respond(
        StatusCode::FORBIDDEN,
        Some(challenge(
            realm,
            Some("insufficient_scope"),
            description,
            scope,
        )),
    )
}

/// Build a `400 Bad Request` response without a challenge
///
/// Used when the `Authorization` header names a scheme that is not
/// supported, where a bearer challenge would not apply.
pub fn bad_request<Body: Default>() -> Response<Body> {
    respond(StatusCode::BAD_REQUEST, None)
}

/// Build a `500 Internal Server Error` response without a challenge
pub fn internal_server_error<Body: Default>() -> Response<Body> {
    respond(StatusCode::INTERNAL_SERVER_ERROR, None)
}

fn respond<Body: Default>(status: StatusCode, challenge: Option<HeaderValue>) -> Response<Body> {
    let mut resp = Response::new(Body::default());
    *resp.status_mut() = status;
    if let Some(challenge) = challenge {
        resp.headers_mut()
            .insert(header::WWW_AUTHENTICATE, challenge);
    }
    resp
}

// Because of the definition of a `Scope`, this never needs to escape `scope`,
// as `Scope` can only be printable ASCII characters and won't include `\` or `"`.
fn challenge(
    realm: Option<&RealmRef>,
    error: Option<&str>,
    description: &str,
    scope: Option<&Scope>,
) -> HeaderValue {
    let mut value = String::from("Bearer");
    let mut params = 0;
    let mut param = |value: &mut String, name: &str, content: &dyn std::fmt::Display| {
        let sep = if params == 0 { " " } else { ", " };
        params += 1;
        let _ = write!(value, r#"{sep}{name}="{content}""#);
    };

    if let Some(realm) = realm {
        param(&mut value, "realm", &realm.as_str().escape_default());
    }
    if let Some(error) = error {
        param(&mut value, "error", &error);
    }
    if !description.is_empty() {
        param(
            &mut value,
            "error_description",
            &description.escape_default(),
        );
    }
    if let Some(scope) = scope {
        param(&mut value, "scope", scope);
    }

    HeaderValue::try_from(value).expect("escaped challenge is a valid header value")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use palisade::Realm;
    use palisade_oauth2::scope;

    use super::*;

    #[test]
    fn missing_authorization_without_realm_is_a_bare_challenge() {
        let resp = missing_authorization::<()>(None);

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            extract_www_authenticate_headers(&resp),
            BTreeSet::from(["Bearer"])
        );
    }

    #[test]
    fn missing_authorization_names_the_realm() {
        let realm = Realm::from_static("example");
        let resp = missing_authorization::<()>(Some(&realm));

        assert_eq!(
            extract_www_authenticate_headers(&resp),
            BTreeSet::from([r#"Bearer realm="example""#])
        );
    }

    #[test]
    fn invalid_token_with_empty_description_doesnt_include_description() {
        let realm = Realm::from_static("example");
        let resp = invalid_token::<()>(Some(&realm), "");

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            extract_www_authenticate_headers(&resp),
            BTreeSet::from([r#"Bearer realm="example", error="invalid_token""#])
        );
    }

    #[test]
    fn challenge_parameters_are_comma_separated() {
        let realm = Realm::from_static("example");
        let resp = invalid_token::<()>(Some(&realm), "token expired");

        assert_eq!(
            extract_www_authenticate_headers(&resp),
            BTreeSet::from([
                r#"Bearer realm="example", error="invalid_token", error_description="token expired""#
            ])
        );
    }

    #[test]
    fn in_invalid_token_description_unicode_and_non_printing_description_does_not_panic() {
        let resp = invalid_token::<()>(
            None,
            "\0\n\ttest™: \"Ĉu oni povas bone ŝanĝi ĉi tiu mesaĝon en respondon?\"",
        );

        let expected = BTreeSet::from([
            r#"Bearer error="invalid_token", error_description="\u{0}\n\ttest\u{2122}: \"\u{108}u oni povas bone \u{15d}an\u{11d}i \u{109}i tiu mesa\u{11d}on en respondon?\"""#,
        ]);

        assert_eq!(extract_www_authenticate_headers(&resp), expected);
    }

    #[test]
    fn realm_is_escaped() {
        let realm = Realm::from_static("quoted \"realm\"");
        let resp = invalid_request::<()>(Some(&realm), "");

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            extract_www_authenticate_headers(&resp),
            BTreeSet::from([r#"Bearer realm="quoted \"realm\"", error="invalid_request""#])
        );
    }

    #[test]
    fn insufficient_scope_lists_the_required_scope() {
        let realm = Realm::from_static("example");
        let resp = insufficient_scope::<()>(
            Some(&realm),
            "descriptive error",
            &scope!["write", "read"],
        );

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            extract_www_authenticate_headers(&resp),
            BTreeSet::from([
                r#"Bearer realm="example", error="insufficient_scope", error_description="descriptive error", scope="read write""#
            ])
        );
    }

    #[test]
    fn insufficient_scope_with_empty_scope_omits_the_scope() {
        let resp = insufficient_scope::<()>(None, "", &Scope::empty());

        assert_eq!(
            extract_www_authenticate_headers(&resp),
            BTreeSet::from([r#"Bearer error="insufficient_scope""#])
        );
    }

    #[test]
    fn unchallenged_responses_carry_no_header() {
        let resp = bad_request::<()>();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(extract_www_authenticate_headers(&resp).is_empty());

        let resp = internal_server_error::<()>();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(extract_www_authenticate_headers(&resp).is_empty());
    }

    fn extract_www_authenticate_headers<B>(resp: &Response<B>) -> BTreeSet<&str> {
        resp.headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect::<BTreeSet<_>>()
    }
}
