//! Version-based handler dispatch.
//!
//! A [`DispatchChain`] is an ordered list of (predicate, handler) pairs.
//! Predicates are built from field lookups over a capability [`Signature`]
//! (implicit AND), optionally combined with arbitrary check functions.
//! Resolution walks the chain in declaration order and returns the handler
//! of the first matching entry; no match is a terminal "not supported"
//! condition, never a silent no-op.
//!
//! Chains are built once at initialization time and are read-only afterwards.
//!
//! # Example
//!
//! ```ignore
//! let mut chain = DispatchChain::new();
//! chain.register(
//!     Predicate::builder().version_lt("2.0").build(),
//!     handler_v1,
//! );
//! chain.register(
//!     Predicate::builder().version_gte("2.0").build(),
//!     handler_v2,
//! );
//! let handler = chain.resolve(&signature, &profile)?;
//! ```

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::core::profile::Profile;
use crate::core::signature::Signature;

/// Errors raised by chain construction or resolution.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No entry in the chain matched the signature.
    #[error("no handler matches signature: {0}")]
    NotSupported(String),

    /// A regex lookup failed to compile.
    #[error("invalid pattern for field '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// A single field lookup operator.
#[derive(Debug, Clone)]
pub enum Lookup {
    Exact(String),
    IExact(String),
    StartsWith(String),
    IStartsWith(String),
    EndsWith(String),
    IEndsWith(String),
    Contains(String),
    IContains(String),
    In(Vec<String>),
    Regex(Regex),
    IsEmpty(bool),
    /// Ordering operators, evaluated through the profile's version
    /// comparator. Only meaningful on the `version` field.
    VersionLt(String),
    VersionLte(String),
    VersionGt(String),
    VersionGte(String),
}

impl Lookup {
    fn matches(&self, actual: Option<&str>, profile: &dyn Profile) -> bool {
        // A missing field only satisfies IsEmpty(true).
        let value = match (actual, self) {
            (None, Lookup::IsEmpty(want)) => return *want,
            (None, _) => return false,
            (Some(v), _) => v,
        };

        match self {
            Lookup::Exact(want) => value == want,
            Lookup::IExact(want) => value.eq_ignore_ascii_case(want),
            Lookup::StartsWith(want) => value.starts_with(want.as_str()),
            Lookup::IStartsWith(want) => {
                value.to_lowercase().starts_with(&want.to_lowercase())
            }
            Lookup::EndsWith(want) => value.ends_with(want.as_str()),
            Lookup::IEndsWith(want) => value.to_lowercase().ends_with(&want.to_lowercase()),
            Lookup::Contains(want) => value.contains(want.as_str()),
            Lookup::IContains(want) => value.to_lowercase().contains(&want.to_lowercase()),
            Lookup::In(options) => options.iter().any(|o| o == value),
            Lookup::Regex(pattern) => pattern.is_match(value),
            Lookup::IsEmpty(want) => value.is_empty() == *want,
            Lookup::VersionLt(want) => profile.cmp_version(value, want) == Ordering::Less,
            Lookup::VersionLte(want) => profile.cmp_version(value, want) != Ordering::Greater,
            Lookup::VersionGt(want) => profile.cmp_version(value, want) == Ordering::Greater,
            Lookup::VersionGte(want) => profile.cmp_version(value, want) != Ordering::Less,
        }
    }
}

type CheckFn = Arc<dyn Fn(&Signature) -> bool + Send + Sync>;

/// A compiled predicate: field lookups plus positional checks, all ANDed.
#[derive(Clone, Default)]
pub struct Predicate {
    lookups: Vec<(String, Lookup)>,
    checks: Vec<CheckFn>,
}

impl Predicate {
    /// Start building a predicate.
    pub fn builder() -> PredicateBuilder {
        PredicateBuilder::default()
    }

    /// An always-true predicate, used for catch-all chain entries.
    pub fn any() -> Self {
        Self::default()
    }

    /// Evaluate the predicate against a signature.
    ///
    /// All lookups and all checks must hold. An empty predicate matches
    /// everything.
    pub fn matches(&self, signature: &Signature, profile: &dyn Profile) -> bool {
        self.lookups
            .iter()
            .all(|(field, lookup)| lookup.matches(signature.field(field), profile))
            && self.checks.iter().all(|check| check(signature))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("lookups", &self.lookups)
            .field("checks", &self.checks.len())
            .finish()
    }
}

/// Builder for [`Predicate`], called at module-initialization time.
#[derive(Default)]
pub struct PredicateBuilder {
    lookups: Vec<(String, Lookup)>,
    checks: Vec<CheckFn>,
    error: Option<DispatchError>,
}

impl PredicateBuilder {
    /// Add a field lookup.
    pub fn field(mut self, name: impl Into<String>, lookup: Lookup) -> Self {
        self.lookups.push((name.into(), lookup));
        self
    }

    /// Add a case-sensitive regex lookup.
    pub fn field_regex(mut self, name: impl Into<String>, pattern: &str) -> Self {
        let name = name.into();
        match Regex::new(pattern) {
            Ok(re) => self.lookups.push((name, Lookup::Regex(re))),
            Err(source) => {
                self.error
                    .get_or_insert(DispatchError::InvalidPattern { field: name, source });
            }
        }
        self
    }

    /// Add a case-insensitive regex lookup.
    pub fn field_iregex(mut self, name: impl Into<String>, pattern: &str) -> Self {
        let name = name.into();
        match Regex::new(&format!("(?i){}", pattern)) {
            Ok(re) => self.lookups.push((name, Lookup::Regex(re))),
            Err(source) => {
                self.error
                    .get_or_insert(DispatchError::InvalidPattern { field: name, source });
            }
        }
        self
    }

    /// Add an arbitrary boolean check over the whole signature.
    pub fn check(mut self, f: impl Fn(&Signature) -> bool + Send + Sync + 'static) -> Self {
        self.checks.push(Arc::new(f));
        self
    }

    /// `version < value`, via the profile comparator.
    pub fn version_lt(self, value: impl Into<String>) -> Self {
        self.field("version", Lookup::VersionLt(value.into()))
    }

    /// `version <= value`, via the profile comparator.
    pub fn version_lte(self, value: impl Into<String>) -> Self {
        self.field("version", Lookup::VersionLte(value.into()))
    }

    /// `version > value`, via the profile comparator.
    pub fn version_gt(self, value: impl Into<String>) -> Self {
        self.field("version", Lookup::VersionGt(value.into()))
    }

    /// `version >= value`, via the profile comparator.
    pub fn version_gte(self, value: impl Into<String>) -> Self {
        self.field("version", Lookup::VersionGte(value.into()))
    }

    /// Finish the predicate.
    pub fn build(self) -> Result<Predicate, DispatchError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Predicate {
            lookups: self.lookups,
            checks: self.checks,
        })
    }
}

/// Ordered (predicate, handler) chain.
///
/// `H` is the handler payload; the engine stores script bodies, tests can
/// store anything clonable.
#[derive(Clone)]
pub struct DispatchChain<H> {
    entries: Vec<(Predicate, H)>,
}

impl<H> DispatchChain<H> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a handler, preserving declaration order.
    pub fn register(&mut self, predicate: Predicate, handler: H) -> &mut Self {
        self.entries.push((predicate, handler));
        self
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the chain has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the handler of the first entry whose predicate matches.
    pub fn resolve(
        &self,
        signature: &Signature,
        profile: &dyn Profile,
    ) -> Result<&H, DispatchError> {
        self.entries
            .iter()
            .find(|(predicate, _)| predicate.matches(signature, profile))
            .map(|(_, handler)| handler)
            .ok_or_else(|| {
                DispatchError::NotSupported(format!(
                    "vendor={} platform={} version={} image={}",
                    signature.vendor, signature.platform, signature.version, signature.image
                ))
            })
    }
}

impl<H> Default for DispatchChain<H> {
    fn default() -> Self {
        Self::new()
    }
}
