use crate::value::Value;
use std::collections::BTreeSet;
use std::ops::{BitAnd, BitOr};

///
/// Predicate AST
///
/// Pure representation of WHERE-clause logic. This layer carries no schema
/// knowledge, no bind-list ownership, and no execution semantics; those live
/// in `spec`, `serial`, and the data source respectively.
///

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
}

impl CompareOp {
    /// SQL comparison token, used when a comparison degrades to an opaque
    /// fragment during serialization.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
        }
    }
}

///
/// Operand
///
/// Right-hand side of a comparison: either a reference into the owning
/// spec's bind list (by unique name) or an inline literal.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Bound(String),
    Literal(Value),
}

///
/// Comparison
///
/// Leaf comparison. `table == None` means the collection's own table; it is
/// resolved against the entity binding at serialization time.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub table: Option<String>,
    pub column: String,
    pub op: CompareOp,
    pub operand: Operand,
}

impl Comparison {
    #[must_use]
    pub fn new(
        table: Option<String>,
        column: impl Into<String>,
        op: CompareOp,
        operand: Operand,
    ) -> Self {
        Self {
            table,
            column: column.into(),
            op,
            operand,
        }
    }

    /// Comparison against a bound parameter on the collection's own table.
    #[must_use]
    pub fn bound(column: impl Into<String>, op: CompareOp, name: impl Into<String>) -> Self {
        Self::new(None, column, op, Operand::Bound(name.into()))
    }

    /// Comparison against an inline literal on the collection's own table.
    #[must_use]
    pub fn literal(column: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self::new(None, column, op, Operand::Literal(value))
    }
}

///
/// RawFragment
///
/// Opaque textual predicate with positional `?` placeholders and its own
/// bind slice. Trees containing one forfeit the structural round-trip
/// guarantee; serialization degrades to the verbatim text.
///

#[derive(Clone, Debug, PartialEq)]
pub struct RawFragment {
    pub sql: String,
    pub bind: Vec<Value>,
}

///
/// Predicate
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Compare(Comparison),
    And(Vec<Self>),
    Or(Box<Self>, Box<Self>),
    Not(Box<Self>),
    Raw(RawFragment),
}

impl Predicate {
    #[must_use]
    pub const fn and(preds: Vec<Self>) -> Self {
        Self::And(preds)
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    #[expect(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(pred: Self) -> Self {
        Self::Not(Box::new(pred))
    }

    #[must_use]
    pub fn raw(sql: impl Into<String>, bind: Vec<Value>) -> Self {
        Self::Raw(RawFragment {
            sql: sql.into(),
            bind,
        })
    }

    #[must_use]
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::Compare(Comparison::literal(column, CompareOp::Eq, value))
    }

    #[must_use]
    pub fn ne(column: impl Into<String>, value: Value) -> Self {
        Self::Compare(Comparison::literal(column, CompareOp::Ne, value))
    }

    #[must_use]
    pub fn lt(column: impl Into<String>, value: Value) -> Self {
        Self::Compare(Comparison::literal(column, CompareOp::Lt, value))
    }

    #[must_use]
    pub fn lte(column: impl Into<String>, value: Value) -> Self {
        Self::Compare(Comparison::literal(column, CompareOp::Lte, value))
    }

    #[must_use]
    pub fn gt(column: impl Into<String>, value: Value) -> Self {
        Self::Compare(Comparison::literal(column, CompareOp::Gt, value))
    }

    #[must_use]
    pub fn gte(column: impl Into<String>, value: Value) -> Self {
        Self::Compare(Comparison::literal(column, CompareOp::Gte, value))
    }

    #[must_use]
    pub fn in_(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Compare(Comparison::literal(column, CompareOp::In, Value::List(values)))
    }

    /// AND-append `other` onto this predicate, flattening an existing
    /// top-level `And` list instead of nesting.
    #[must_use]
    pub fn push_and(self, other: Self) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            existing => Self::And(vec![existing, other]),
        }
    }

    /// True when any node in the tree is a raw fragment.
    #[must_use]
    pub fn has_raw(&self) -> bool {
        match self {
            Self::Raw(_) => true,
            Self::Compare(_) => false,
            Self::And(children) => children.iter().any(Self::has_raw),
            Self::Or(left, right) => left.has_raw() || right.has_raw(),
            Self::Not(child) => child.has_raw(),
        }
    }

    /// Collect every bound-parameter name referenced in the tree.
    pub fn bound_names(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Compare(cmp) => {
                if let Operand::Bound(name) = &cmp.operand {
                    out.insert(name.clone());
                }
            }
            Self::And(children) => {
                for child in children {
                    child.bound_names(out);
                }
            }
            Self::Or(left, right) => {
                left.bound_names(out);
                right.bound_names(out);
            }
            Self::Not(child) => child.bound_names(out),
            Self::Raw(_) => {}
        }
    }
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(vec![self, rhs])
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(Box::new(self), Box::new(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_flattens_top_level_lists() {
        let p = Predicate::eq("a", 1i64.into())
            .push_and(Predicate::eq("b", 2i64.into()))
            .push_and(Predicate::eq("c", 3i64.into()));

        match p {
            Predicate::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected flattened And, got {other:?}"),
        }
    }

    #[test]
    fn operators_mirror_constructors() {
        let left = Predicate::eq("a", 1i64.into());
        let right = Predicate::eq("b", 2i64.into());

        assert_eq!(
            left.clone() & right.clone(),
            Predicate::and(vec![left.clone(), right.clone()])
        );
        assert_eq!(left.clone() | right.clone(), Predicate::or(left, right));
    }

    #[test]
    fn raw_detection_walks_nested_nodes() {
        let clean = Predicate::not(Predicate::eq("a", 1i64.into()));
        assert!(!clean.has_raw());

        let tainted = Predicate::or(clean, Predicate::raw("a > ?", vec![1i64.into()]));
        assert!(tainted.has_raw());
    }

    #[test]
    fn bound_names_are_collected_once() {
        let mut p = Predicate::Compare(Comparison::bound("color", CompareOp::Eq, "color"));
        p = p.push_and(Predicate::not(Predicate::Compare(Comparison::bound(
            "size",
            CompareOp::Eq,
            "size",
        ))));

        let mut names = BTreeSet::new();
        p.bound_names(&mut names);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["color".to_string(), "size".to_string()]
        );
    }
}
