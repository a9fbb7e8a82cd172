//! Scope tokens and scope sets

use std::{collections::hash_set, convert::Infallible, fmt, str::FromStr};

use ahash::AHashSet;
use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An invalid scope token
#[derive(Debug, Error)]
pub enum InvalidScopeToken {
    /// The scope token was the empty string
    #[error("scope token cannot be empty")]
    EmptyString,
    /// The scope token contained an invalid byte
    #[error("invalid scope token byte at position {position}: 0x{value:02x}")]
    InvalidByte {
        /// The index in the scope token where the invalid byte was found
        position: usize,
        /// The invalid byte value
        value: u8,
    },
}

impl From<Infallible> for InvalidScopeToken {
    #[inline(always)]
    fn from(x: Infallible) -> Self {
        match x {}
    }
}

/// An OAuth2 scope token as defined in [RFC 6749, Section 3.3][RFC6749 3.3]
///
/// A scope token must be composed of printable ASCII characters excluding
/// ` ` (space), `"` (double quote), and `\` (backslash).
///
///   [RFC6749 3.3]: (https://datatracker.ietf.org/doc/html/rfc6749#section-3.3)
#[braid(
    serde,
    validator,
    ref_doc = "A borrowed reference to an OAuth2 [`ScopeToken`]"
)]
pub struct ScopeToken;

impl aliri_braid::Validator for ScopeToken {
    type Error = InvalidScopeToken;

    /// Validates that the scope token is valid
    ///
    /// A valid scope token is non-empty and composed of printable
    /// ASCII characters except ` `, `"`, and `\`.
    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            Err(InvalidScopeToken::EmptyString)
        } else if let Some((position, &value)) = s
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, &b)| b <= 0x20 || b == 0x22 || b == 0x5C || 0x7F <= b)
        {
            Err(InvalidScopeToken::InvalidByte { position, value })
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum ScopeDto {
    String(String),
    Array(Vec<ScopeToken>),
}

impl TryFrom<Option<ScopeDto>> for Scope {
    type Error = InvalidScopeToken;

    fn try_from(dto: Option<ScopeDto>) -> Result<Self, Self::Error> {
        match dto {
            Some(ScopeDto::String(s)) => Self::try_from(s),
            Some(ScopeDto::Array(arr)) => Ok(arr.into_iter().collect()),
            None => Ok(Self::empty()),
        }
    }
}

impl From<Scope> for ScopeDto {
    fn from(s: Scope) -> Self {
        ScopeDto::String(s.to_string())
    }
}

/// An OAuth2 scope defining a set of access permissions
///
/// Scopes parse from a whitespace-delimited string. Any run of whitespace
/// separates two tokens; no other character does.
///
/// ```
/// use palisade_oauth2::{Scope, ScopeTokenRef};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let scope: Scope = "read  write\tread,admin".parse()?;
/// assert_eq!(scope.len(), 3);
/// assert!(scope.contains(ScopeTokenRef::from_str("read,admin")?));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "Option<ScopeDto>", into = "ScopeDto")]
pub struct Scope(AHashSet<ScopeToken>);

impl Scope {
    /// Produces an empty scope
    #[inline]
    pub fn empty() -> Self {
        Self(AHashSet::new())
    }

    /// Constructs a new scope from a single scope token
    #[inline]
    pub fn single(scope_token: ScopeToken) -> Self {
        let mut s = Self::empty();
        s.insert(scope_token);
        s
    }

    /// Adds an additional scope token
    #[inline]
    pub fn and(self, scope_token: ScopeToken) -> Self {
        let mut s = self;
        s.insert(scope_token);
        s
    }

    /// Constructs a scope from an iterator of scope tokens
    #[inline]
    pub fn from_scope_tokens<I>(scope_tokens: I) -> Self
    where
        I: IntoIterator<Item = ScopeToken>,
    {
        Self::from_iter(scope_tokens)
    }

    /// Constructs a scope from a static, whitespace-delimited string
    ///
    /// # Panics
    ///
    /// This function will panic if any token in the string is not a valid
    /// [`ScopeToken`].
    pub fn from_static(scope: &'static str) -> Self {
        match scope.parse() {
            Ok(scope) => scope,
            Err(err) => panic!("{}: scope = {}", err, scope),
        }
    }

    /// Adds a scope token to the scope
    #[inline]
    pub fn insert(&mut self, scope_token: ScopeToken) {
        self.0.insert(scope_token);
    }

    /// The number of distinct scope tokens
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this scope holds no scope tokens at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Produces an iterator of the scope tokens in this set
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Checks whether this scope holds `scope_token`
    #[inline]
    pub fn contains(&self, scope_token: &ScopeTokenRef) -> bool {
        self.0.contains(scope_token)
    }

    /// Checks to see whether this scope contains all of
    /// the scope tokens in `subset`.
    #[inline]
    pub fn contains_all(&self, subset: &Scope) -> bool {
        self.0.is_superset(&subset.0)
    }

    /// Checks to see whether this scope shares at least one scope
    /// token with `other`.
    #[inline]
    pub fn intersects(&self, other: &Scope) -> bool {
        !self.0.is_disjoint(&other.0)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut tokens: Vec<_> = self.iter().map(ScopeTokenRef::as_str).collect();
        tokens.sort_unstable();
        f.debug_set().entries(tokens).finish()
    }
}

/// Formats the scope as it is written on the wire, with tokens in
/// lexicographic order
impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut tokens: Vec<_> = self.iter().map(ScopeTokenRef::as_str).collect();
        tokens.sort_unstable();
        f.write_str(&tokens.join(" "))
    }
}

impl IntoIterator for Scope {
    type Item = ScopeToken;
    type IntoIter = <AHashSet<ScopeToken> as IntoIterator>::IntoIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An iterator over a set of borrowed scope tokens
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: hash_set::Iter<'a, ScopeToken>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ScopeTokenRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|x| x.as_ref())
    }
}

impl<'a> IntoIterator for &'a Scope {
    type Item = &'a ScopeTokenRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Iter {
            iter: self.0.iter(),
        }
    }
}

impl<S> Extend<S> for Scope
where
    S: Into<ScopeToken>,
{
    #[inline]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = S>,
    {
        self.0.extend(iter.into_iter().map(Into::into))
    }
}

impl<S> FromIterator<S> for Scope
where
    S: Into<ScopeToken>,
{
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

impl TryFrom<&'_ str> for Scope {
    type Error = InvalidScopeToken;

    #[inline]
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.split_whitespace()
            .map(|t| ScopeToken::new(t.to_owned()))
            .collect()
    }
}

impl TryFrom<String> for Scope {
    type Error = InvalidScopeToken;

    #[inline]
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

impl FromStr for Scope {
    type Err = InvalidScopeToken;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// Indicates that the type has an OAuth2 scope
pub trait HasScope {
    /// OAuth2 scope
    ///
    /// Scope granted to the underlying token, generally recorded alongside
    /// the token when it was issued.
    fn scope(&self) -> &Scope;
}

impl HasScope for Scope {
    #[inline]
    fn scope(&self) -> &Scope {
        self
    }
}

impl<T> HasScope for &'_ T
where
    T: HasScope + ?Sized,
{
    #[inline]
    fn scope(&self) -> &Scope {
        T::scope(self)
    }
}

/// Construct a [`Scope`] from a list of scope token literals
///
/// ```
/// use palisade_oauth2::{scope, Scope};
///
/// let scope = scope!["read", "write"];
/// assert_eq!(scope, "write read".parse::<Scope>().unwrap());
///
/// assert!(scope![].is_empty());
/// ```
///
/// # Panics
///
/// Panics if any literal is not a valid [`ScopeToken`].
#[macro_export]
macro_rules! scope {
    ($($token:literal),* $(,)?) => {
        $crate::Scope::from_static(concat!($($token, " "),*))
    };
}
