//! Composable class predicates for graph queries and rules.
//!
//! Package patterns use dotted package identifiers:
//!
//! - `..` matches any number of packages, including none
//! - `*` matches exactly one package; inside a segment (`serv*`) it is a
//!   wildcard over characters
//! - `(*)` and `(**)` work like `*` and `..` but capture what they matched
//!
//! ```
//! use arch_graph_core::predicate::PackageMatcher;
//!
//! let slices = PackageMatcher::new("com.example.(*)..").unwrap();
//! assert_eq!(
//!     slices.captures("com.example.billing.api"),
//!     Some(vec!["billing".to_string()])
//! );
//! assert!(PackageMatcher::new("..domain..").unwrap().matches("a.domain.b"));
//! ```

use std::fmt;

use thiserror::Error;

use crate::descriptor::JavaType;
use crate::graph::DomainGraph;
use crate::model::JavaClass;

/// Invalid predicate arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// A package or name pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// What is wrong with it.
        message: String,
    },
}

impl PredicateError {
    fn invalid(pattern: &str, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard(glob::Pattern),
    One,
    Many,
    CaptureOne,
    CaptureMany,
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> Result<Self, PredicateError> {
        Ok(match raw {
            "*" => Self::One,
            "**" => Self::Many,
            "(*)" => Self::CaptureOne,
            "(**)" => Self::CaptureMany,
            s if s.contains(['(', ')']) => {
                return Err(PredicateError::invalid(
                    pattern,
                    "capture groups must be '(*)' or '(**)'",
                ))
            }
            s if s.contains(['*', '?', '[']) => Self::Wildcard(
                glob::Pattern::new(s).map_err(|e| PredicateError::invalid(pattern, e.msg))?,
            ),
            s => Self::Literal(s.to_string()),
        })
    }

    fn matches_one(&self, package: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == package,
            Self::Wildcard(glob) => glob.matches(package),
            Self::One | Self::CaptureOne => true,
            Self::Many | Self::CaptureMany => false,
        }
    }
}

/// A compiled package pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMatcher {
    pattern: String,
    segments: Vec<Segment>,
}

impl PackageMatcher {
    /// Compiles a package pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PredicateError::InvalidPattern`] for empty patterns, runs
    /// of three or more dots and malformed segments.
    pub fn new(pattern: &str) -> Result<Self, PredicateError> {
        if pattern.trim().is_empty() {
            return Err(PredicateError::invalid(pattern, "pattern is empty"));
        }
        if pattern.contains("...") {
            return Err(PredicateError::invalid(pattern, "more than two consecutive dots"));
        }
        let segments = pattern
            .replace("..", ".**.")
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| Segment::parse(s, pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as written.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of capture groups.
    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::CaptureOne | Segment::CaptureMany))
            .count()
    }

    /// Whether `package` (dotted, empty for the default package) matches.
    #[must_use]
    pub fn matches(&self, package: &str) -> bool {
        self.captures(package).is_some()
    }

    /// The captured parts if `package` matches, in pattern order.
    #[must_use]
    pub fn captures(&self, package: &str) -> Option<Vec<String>> {
        let parts: Vec<&str> = package.split('.').filter(|s| !s.is_empty()).collect();
        let mut captures = Vec::new();
        match_segments(&self.segments, &parts, &mut captures).then_some(captures)
    }
}

impl fmt::Display for PackageMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn match_segments(segments: &[Segment], package: &[&str], captures: &mut Vec<String>) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return package.is_empty();
    };
    let mark = captures.len();

    match first {
        Segment::Many | Segment::CaptureMany => {
            for i in 0..=package.len() {
                if *first == Segment::CaptureMany {
                    captures.push(package[..i].join("."));
                }
                if match_segments(rest, &package[i..], captures) {
                    return true;
                }
                captures.truncate(mark);
            }
            false
        }
        single => {
            let Some((head, tail)) = package.split_first() else {
                return false;
            };
            if !single.matches_one(head) {
                return false;
            }
            if *single == Segment::CaptureOne {
                captures.push((*head).to_string());
            }
            if match_segments(rest, tail, captures) {
                true
            } else {
                captures.truncate(mark);
                false
            }
        }
    }
}

/// A test over classes of a graph.
pub trait ClassPredicate: Send + Sync {
    /// Whether `class` satisfies the predicate.
    fn test(&self, class: &JavaClass, graph: &DomainGraph) -> bool;

    /// Human-readable description, e.g. `reside in a package '..domain..'`.
    fn description(&self) -> String;
}

/// A boxed predicate.
pub type PredicateBox = Box<dyn ClassPredicate>;

impl ClassPredicate for PredicateBox {
    fn test(&self, class: &JavaClass, graph: &DomainGraph) -> bool {
        self.as_ref().test(class, graph)
    }

    fn description(&self) -> String {
        self.as_ref().description()
    }
}

/// Combinators available on every predicate.
pub trait PredicateExt: ClassPredicate + Sized {
    /// Both predicates hold.
    fn and<P: ClassPredicate>(self, other: P) -> And<Self, P> {
        And(self, other)
    }

    /// At least one predicate holds.
    fn or<P: ClassPredicate>(self, other: P) -> Or<Self, P> {
        Or(self, other)
    }

    /// Boxes the predicate.
    fn boxed(self) -> PredicateBox
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<T: ClassPredicate> PredicateExt for T {}

/// Conjunction of two predicates.
#[derive(Debug, Clone)]
pub struct And<A, B>(A, B);

impl<A: ClassPredicate, B: ClassPredicate> ClassPredicate for And<A, B> {
    fn test(&self, class: &JavaClass, graph: &DomainGraph) -> bool {
        self.0.test(class, graph) && self.1.test(class, graph)
    }

    fn description(&self) -> String {
        format!("{} and {}", self.0.description(), self.1.description())
    }
}

/// Disjunction of two predicates.
#[derive(Debug, Clone)]
pub struct Or<A, B>(A, B);

impl<A: ClassPredicate, B: ClassPredicate> ClassPredicate for Or<A, B> {
    fn test(&self, class: &JavaClass, graph: &DomainGraph) -> bool {
        self.0.test(class, graph) || self.1.test(class, graph)
    }

    fn description(&self) -> String {
        format!("{} or {}", self.0.description(), self.1.description())
    }
}

/// Negation of a predicate.
#[derive(Debug, Clone)]
pub struct Not<P>(P);

impl<P: ClassPredicate> ClassPredicate for Not<P> {
    fn test(&self, class: &JavaClass, graph: &DomainGraph) -> bool {
        !self.0.test(class, graph)
    }

    fn description(&self) -> String {
        format!("not {}", self.0.description())
    }
}

/// Negates `predicate`.
pub fn not<P: ClassPredicate>(predicate: P) -> Not<P> {
    Not(predicate)
}

/// Class resides in a package matching a package pattern.
#[derive(Debug, Clone)]
pub struct ResidesInPackage(PackageMatcher);

impl ClassPredicate for ResidesInPackage {
    fn test(&self, class: &JavaClass, _graph: &DomainGraph) -> bool {
        !class.is_array() && self.0.matches(class.package())
    }

    fn description(&self) -> String {
        format!("reside in a package '{}'", self.0)
    }
}

/// Classes whose package matches `pattern`.
///
/// # Errors
///
/// Returns [`PredicateError`] if the pattern is invalid.
pub fn resides_in_package(pattern: &str) -> Result<ResidesInPackage, PredicateError> {
    PackageMatcher::new(pattern).map(ResidesInPackage)
}

/// Binary name matches a glob.
#[derive(Debug, Clone)]
pub struct NameMatches(glob::Pattern);

impl ClassPredicate for NameMatches {
    fn test(&self, class: &JavaClass, _graph: &DomainGraph) -> bool {
        self.0.matches(class.name())
    }

    fn description(&self) -> String {
        format!("have name matching '{}'", self.0)
    }
}

/// Classes whose binary name matches `pattern` (`*` also spans dots).
///
/// # Errors
///
/// Returns [`PredicateError`] if the glob is invalid.
pub fn name_matches(pattern: &str) -> Result<NameMatches, PredicateError> {
    glob::Pattern::new(pattern)
        .map(NameMatches)
        .map_err(|e| PredicateError::invalid(pattern, e.msg))
}

/// Class is the named type or a subtype of it.
#[derive(Debug, Clone)]
pub struct AssignableTo(String);

impl ClassPredicate for AssignableTo {
    fn test(&self, class: &JavaClass, graph: &DomainGraph) -> bool {
        graph.is_assignable_to(class.id(), &self.0)
    }

    fn description(&self) -> String {
        format!("be assignable to {}", self.0)
    }
}

/// Classes assignable to `name`.
#[must_use]
pub fn assignable_to(name: &str) -> AssignableTo {
    AssignableTo(normalize(name))
}

/// Class carries an annotation of the named type.
#[derive(Debug, Clone)]
pub struct AnnotatedWith(String);

impl ClassPredicate for AnnotatedWith {
    fn test(&self, class: &JavaClass, graph: &DomainGraph) -> bool {
        class
            .annotations()
            .iter()
            .any(|a| graph.get(a.annotation_type).name() == self.0)
    }

    fn description(&self) -> String {
        format!("be annotated with @{}", self.0)
    }
}

/// Classes annotated with `name`.
#[must_use]
pub fn annotated_with(name: &str) -> AnnotatedWith {
    AnnotatedWith(normalize(name))
}

/// Only the name of the class is known.
#[derive(Debug, Clone, Copy)]
pub struct IsStub;

impl ClassPredicate for IsStub {
    fn test(&self, class: &JavaClass, _graph: &DomainGraph) -> bool {
        class.is_stub()
    }

    fn description(&self) -> String {
        "be unresolved".to_string()
    }
}

/// Stub classes.
#[must_use]
pub fn is_stub() -> IsStub {
    IsStub
}

/// Class is an interface or annotation type.
#[derive(Debug, Clone, Copy)]
pub struct IsInterface;

impl ClassPredicate for IsInterface {
    fn test(&self, class: &JavaClass, _graph: &DomainGraph) -> bool {
        class.is_interface()
    }

    fn description(&self) -> String {
        "be interfaces".to_string()
    }
}

/// Interfaces.
#[must_use]
pub fn is_interface() -> IsInterface {
    IsInterface
}

fn normalize(name: &str) -> String {
    JavaType::class(name).map_or_else(|_| name.to_string(), |t| t.name().to_string())
}
