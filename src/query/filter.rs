//! The filter algebra: a closed set of predicate variants over aspect
//! attributes, independent of storage. Only the query compiler turns these
//! into SQL; filters themselves are pure, composable value objects.

use crate::aspect::{AspectId, AttributeValue};
use crate::library::MediaItemId;
use std::collections::BTreeSet;

/// Default escape character for LIKE patterns built by this crate.
pub const LIKE_ESCAPE_CHAR: char = '\\';

/// Reference to one attribute of one aspect type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    pub aspect: AspectId,
    pub attribute: String,
}

impl AttributeRef {
    pub fn new(aspect: AspectId, attribute: impl Into<String>) -> Self {
        AttributeRef {
            aspect,
            attribute: attribute.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Query predicate tree. Exhaustively matched by the compiler, so a new
/// variant fails to compile until every translation site handles it.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Relational comparison against a literal.
    Compare {
        attr: AttributeRef,
        op: CompareOp,
        value: AttributeValue,
    },
    /// Text pattern match. The pattern is taken as-is: callers escape
    /// `%`, `_` and the escape character themselves (see [`escape_like`]).
    Like {
        attr: AttributeRef,
        pattern: String,
        escape: char,
        case_sensitive: bool,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Membership in a literal id set.
    IdIn(Vec<MediaItemId>),
    /// Constant false; used instead of "match everything by accident" when
    /// e.g. an empty search term is given.
    AlwaysFalse,
}

impl Filter {
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Filter {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Filter {
        Filter::Or(filters.into_iter().collect())
    }

    pub fn not(filter: Filter) -> Filter {
        Filter::Not(Box::new(filter))
    }

    pub fn eq(attr: AttributeRef, value: impl Into<AttributeValue>) -> Filter {
        Filter::Compare {
            attr,
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    /// Case-insensitive substring match; the term is escaped here.
    pub fn contains(attr: AttributeRef, term: &str) -> Filter {
        Filter::Like {
            attr,
            pattern: format!("%{}%", escape_like(term, LIKE_ESCAPE_CHAR)),
            escape: LIKE_ESCAPE_CHAR,
            case_sensitive: false,
        }
    }

    /// Case-insensitive prefix match; the prefix is escaped here.
    pub fn starts_with(attr: AttributeRef, prefix: &str) -> Filter {
        Filter::Like {
            attr,
            pattern: format!("{}%", escape_like(prefix, LIKE_ESCAPE_CHAR)),
            escape: LIKE_ESCAPE_CHAR,
            case_sensitive: false,
        }
    }

    /// The distinct aspect ids referenced anywhere in this tree. The
    /// compiler joins these tables in addition to the caller's
    /// necessary/optional sets.
    pub fn referenced_aspects(&self) -> BTreeSet<AspectId> {
        let mut aspects = BTreeSet::new();
        self.collect_aspects(&mut aspects);
        aspects
    }

    fn collect_aspects(&self, into: &mut BTreeSet<AspectId>) {
        match self {
            Filter::Compare { attr, .. } | Filter::Like { attr, .. } => {
                into.insert(attr.aspect);
            }
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_aspects(into);
                }
            }
            Filter::Not(child) => child.collect_aspects(into),
            Filter::IdIn(_) | Filter::AlwaysFalse => {}
        }
    }
}

/// Escape `%`, `_` and the escape character itself so a literal term can be
/// embedded in a LIKE pattern. The compiler never escapes patterns; every
/// pattern constructor goes through this.
pub fn escape_like(term: &str, escape: char) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if c == '%' || c == '_' || c == escape {
            out.push(escape);
        }
        out.push(c);
    }
    out
}
