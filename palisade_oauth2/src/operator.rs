use std::{fmt, str::FromStr, sync::Arc};

use thiserror::Error;

use crate::Scope;

/// Indicates the requester held insufficient scope to be granted access
/// to a controlled resource
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Error)]
#[error("insufficient scope")]
pub struct InsufficientScope;

/// The name given for a scope operator is not recognized
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid scope operator '{name}': expected 'AND' or 'OR'")]
pub struct InvalidScopeOperator {
    name: String,
}

impl InvalidScopeOperator {
    /// The unrecognized operator name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

type Predicate = dyn Fn(&Scope, &Scope) -> bool + Send + Sync;

/// How a granted scope is compared against a required scope
///
/// Operators parse from their conventional names, case-insensitively:
///
/// ```
/// use palisade_oauth2::ScopeOperator;
///
/// assert!(matches!("AND".parse::<ScopeOperator>(), Ok(ScopeOperator::All)));
/// assert!(matches!("or".parse::<ScopeOperator>(), Ok(ScopeOperator::Any)));
/// assert!("XOR".parse::<ScopeOperator>().is_err());
/// ```
#[derive(Clone, Default)]
pub enum ScopeOperator {
    /// Every required scope token must have been granted (`AND`)
    #[default]
    All,
    /// At least one required scope token must have been granted (`OR`)
    Any,
    /// A caller-supplied predicate over `(granted, required)` decides
    Custom(Arc<Predicate>),
}

impl ScopeOperator {
    /// Constructs an operator from a predicate over `(granted, required)`
    ///
    /// The predicate returns `true` when the granted scope is sufficient.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Scope, &Scope) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    /// Whether `granted` satisfies `required` under this operator
    ///
    /// This does not special-case an empty `required` scope; see
    /// [`ScopeRequirement`] for the complete sufficiency rule.
    pub fn is_satisfied(&self, granted: &Scope, required: &Scope) -> bool {
        match self {
            Self::All => granted.contains_all(required),
            Self::Any => granted.intersects(required),
            Self::Custom(predicate) => predicate(granted, required),
        }
    }
}

impl fmt::Debug for ScopeOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Any => f.write_str("Any"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FromStr for ScopeOperator {
    type Err = InvalidScopeOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("and") {
            Ok(Self::All)
        } else if s.eq_ignore_ascii_case("or") {
            Ok(Self::Any)
        } else {
            Err(InvalidScopeOperator { name: s.to_owned() })
        }
    }
}

/// A required scope paired with the operator used to test it
///
/// An empty required scope is satisfied by any granted scope, whatever the
/// operator; a custom predicate is not consulted in that case.
#[derive(Clone, Copy, Debug)]
pub struct ScopeRequirement<'a> {
    required: &'a Scope,
    operator: &'a ScopeOperator,
}

impl<'a> ScopeRequirement<'a> {
    /// Pairs a required scope with an operator
    #[inline]
    pub const fn new(required: &'a Scope, operator: &'a ScopeOperator) -> Self {
        Self { required, operator }
    }

    /// The required scope
    #[inline]
    pub const fn required(&self) -> &'a Scope {
        self.required
    }

    /// The operator used to test the required scope
    #[inline]
    pub const fn operator(&self) -> &'a ScopeOperator {
        self.operator
    }
}

impl palisade_traits::Policy for ScopeRequirement<'_> {
    type Request = Scope;
    type Denial = InsufficientScope;

    fn evaluate(&self, granted: &Scope) -> Result<(), Self::Denial> {
        if self.required.is_empty() || self.operator.is_satisfied(granted, self.required) {
            Ok(())
        } else {
            Err(InsufficientScope)
        }
    }
}
