use crate::value::Value;
use derive_more::IntoIterator;

///
/// Criterion
///
/// One structured predicate input: a column→value match on the collection's
/// own table, a column group on an explicit table, a negated criteria set,
/// or a disjunction of criteria branches. Raw textual fragments are not
/// criteria; they enter through the dedicated raw verb.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Criterion {
    Column(String, Value),
    Table(String, Vec<(String, Value)>),
    Not(Criteria),
    Any(Vec<Criteria>),
}

///
/// Criteria
///
/// Ordered criterion list, combined as a conjunction when lowered.
///

#[derive(Clone, Debug, Default, IntoIterator, PartialEq)]
pub struct Criteria(#[into_iterator(owned, ref)] Vec<Criterion>);

impl Criteria {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Single column→value match on the collection's own table.
    #[must_use]
    pub fn column(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(vec![Criterion::Column(column.into(), value.into())])
    }

    /// Column group on an explicit table.
    #[must_use]
    pub fn table<I, S, V>(table: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        Self(vec![Criterion::Table(
            table.into(),
            pairs
                .into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        )])
    }

    /// Negate a criteria set.
    #[expect(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self(vec![Criterion::Not(inner)])
    }

    /// Disjunction over criteria branches.
    #[must_use]
    pub fn any_of(branches: Vec<Self>) -> Self {
        Self(vec![Criterion::Any(branches)])
    }

    /// AND-append more criteria.
    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        self.0.extend(other.0);
        self
    }

    /// AND-append one more column match.
    #[must_use]
    pub fn and_column(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push(Criterion::Column(column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>, V: Into<Value>> From<(S, V)> for Criteria {
    fn from((column, value): (S, V)) -> Self {
        Self::column(column, value)
    }
}

impl<S: Into<String>, V: Into<Value>> From<Vec<(S, V)>> for Criteria {
    fn from(pairs: Vec<(S, V)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(column, value)| Criterion::Column(column.into(), value.into()))
                .collect(),
        )
    }
}
