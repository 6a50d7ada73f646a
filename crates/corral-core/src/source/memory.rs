//! Module: source::memory
//! Responsibility: in-memory reference implementation of the source
//! boundary, used by the test suites and as executable documentation of the
//! contract. Raw SQL fragments are out of its vocabulary by design.

use crate::{
    predicate::{CompareOp, Comparison, Operand, Predicate},
    registry::EntityDef,
    source::{DataSource, Record, SourceError},
    spec::{Bindings, QuerySpec},
    value::{Value, compare_values},
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

///
/// MemorySource
///
/// Tables of plain records. Populated before sharing; queries never mutate.
/// Joins, includes, and references are accepted and ignored — this source
/// serves exactly one table per entity.
///

#[derive(Debug, Default)]
pub struct MemorySource {
    tables: BTreeMap<String, Vec<Record>>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, record: Record) {
        self.tables.entry(table.into()).or_default().push(record);
    }

    pub fn extend<I>(&mut self, table: impl Into<String>, records: I)
    where
        I: IntoIterator<Item = Record>,
    {
        self.tables
            .entry(table.into())
            .or_default()
            .extend(records);
    }

    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }

    /// Filter → order → distinct → window; projection is the caller's call.
    fn materialize(
        &self,
        entity: &EntityDef,
        spec: &QuerySpec,
    ) -> Result<Vec<Record>, SourceError> {
        let mut rows = Vec::new();
        for record in self.rows(entity.table()) {
            if match spec.predicate() {
                Some(predicate) => eval(predicate, record, entity.table(), spec.bind())?,
                None => true,
            } {
                rows.push(record.clone());
            }
        }

        if !spec.order().is_empty() {
            let keys: Vec<_> = spec.order().iter().map(|expr| parse_order(expr)).collect();
            rows.sort_by(|a, b| {
                for (column, descending) in &keys {
                    let ord = compare_values(&a.value(column), &b.value(column))
                        .unwrap_or(Ordering::Equal);
                    let ord = if *descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        if spec.distinct() {
            let projected: Vec<String> = spec
                .select()
                .iter()
                .map(|c| strip_table(c).to_string())
                .collect();
            let mut seen: Vec<Record> = Vec::new();
            rows.retain(|record| {
                let key = if projected.is_empty() {
                    record.clone()
                } else {
                    record.project(projected.iter().map(String::as_str))
                };
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            });
        }

        let offset = usize::try_from(spec.offset().unwrap_or(0)).unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(offset);
        let rows = match spec.limit() {
            Some(limit) => rows
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => rows.collect(),
        };
        Ok(rows)
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, entity: &EntityDef, spec: &QuerySpec) -> Result<Vec<Record>, SourceError> {
        let rows = self.materialize(entity, spec)?;
        if spec.select().is_empty() {
            return Ok(rows);
        }
        let columns: Vec<String> = spec
            .select()
            .iter()
            .map(|c| strip_table(c).to_string())
            .collect();
        Ok(rows
            .into_iter()
            .map(|record| record.project(columns.iter().map(String::as_str)))
            .collect())
    }

    fn count(&self, entity: &EntityDef, spec: &QuerySpec) -> Result<u64, SourceError> {
        Ok(self.materialize(entity, spec)?.len() as u64)
    }

    fn pluck(
        &self,
        entity: &EntityDef,
        spec: &QuerySpec,
        column: &str,
    ) -> Result<Vec<Value>, SourceError> {
        if !entity.columns().is_empty() && !entity.has_column(strip_table(column)) {
            return Err(SourceError::UnknownColumn {
                table: entity.table().to_string(),
                column: column.to_string(),
            });
        }
        let rows = self.materialize(entity, spec)?;
        Ok(rows
            .into_iter()
            .map(|record| record.value(strip_table(column)))
            .collect())
    }
}

/// `"name desc"` → (`name`, descending); `"widgets.name"` → (`name`, asc).
fn parse_order(expr: &str) -> (String, bool) {
    let mut parts = expr.split_whitespace();
    let column = strip_table(parts.next().unwrap_or_default()).to_string();
    let descending = parts
        .next()
        .is_some_and(|dir| dir.eq_ignore_ascii_case("desc"));
    (column, descending)
}

fn strip_table(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

fn eval(
    predicate: &Predicate,
    record: &Record,
    table: &str,
    bind: &Bindings,
) -> Result<bool, SourceError> {
    match predicate {
        Predicate::Compare(cmp) => eval_compare(cmp, record, table, bind),
        Predicate::And(children) => {
            for child in children {
                if !eval(child, record, table, bind)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(left, right) => {
            Ok(eval(left, record, table, bind)? || eval(right, record, table, bind)?)
        }
        Predicate::Not(child) => Ok(!eval(child, record, table, bind)?),
        Predicate::Raw(fragment) => Err(SourceError::Unsupported {
            what: format!("raw predicate fragment '{}'", fragment.sql),
        }),
    }
}

fn eval_compare(
    cmp: &Comparison,
    record: &Record,
    table: &str,
    bind: &Bindings,
) -> Result<bool, SourceError> {
    if let Some(t) = &cmp.table {
        if t != table {
            return Err(SourceError::Unsupported {
                what: format!("cross-table predicate on '{t}'"),
            });
        }
    }

    let lhs = record.value(&cmp.column);
    let rhs = match &cmp.operand {
        Operand::Literal(value) => value.clone(),
        Operand::Bound(name) => bind
            .iter()
            .find(|b| &b.name == name)
            .map(|b| b.value.clone())
            .ok_or_else(|| SourceError::Backend {
                message: format!("unbound parameter '{name}'"),
            })?,
    };

    let ord = compare_values(&lhs, &rhs);
    Ok(match cmp.op {
        CompareOp::Eq => ord == Some(Ordering::Equal),
        CompareOp::Ne => ord != Some(Ordering::Equal),
        CompareOp::Lt => ord == Some(Ordering::Less),
        CompareOp::Lte => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ord == Some(Ordering::Greater),
        CompareOp::Gte => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::In => rhs
            .as_list()
            .is_some_and(|items| {
                items
                    .iter()
                    .any(|item| compare_values(&lhs, item) == Some(Ordering::Equal))
            }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Criteria;

    fn widget_entity() -> EntityDef {
        EntityDef::new("Widget").with_columns(["id", "name", "color", "price"])
    }

    fn seeded() -> MemorySource {
        let mut source = MemorySource::new();
        source.extend(
            "widgets",
            (1..=6).map(|i| {
                let color = if i % 2 == 0 { "red" } else { "blue" };
                Record::from_pairs([
                    ("id", Value::Uint(i)),
                    ("name", Value::Text(format!("w{i}"))),
                    ("color", Value::Text(color.to_string())),
                    ("price", Value::Uint(i * 10)),
                ])
            }),
        );
        source
    }

    #[test]
    fn filters_resolve_bound_parameters() {
        let source = seeded();
        let spec = QuerySpec::new().with_criteria(Criteria::column("color", "red"));
        let rows = source.fetch(&widget_entity(), &spec).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.value("color") == Value::Text("red".into())));
    }

    #[test]
    fn ordering_supports_desc_and_table_prefixes() {
        let source = seeded();
        let spec = QuerySpec::new().with_order(["widgets.price desc"]);
        let rows = source.fetch(&widget_entity(), &spec).unwrap();
        assert_eq!(rows[0].value("price"), Value::Uint(60));
        assert_eq!(rows[5].value("price"), Value::Uint(10));
    }

    #[test]
    fn windows_apply_after_ordering() {
        let source = seeded();
        let spec = QuerySpec::new()
            .with_order(["price"])
            .with_limit(Some(2))
            .with_offset(Some(2));
        let rows = source.fetch(&widget_entity(), &spec).unwrap();
        let prices: Vec<_> = rows.iter().map(|r| r.value("price")).collect();
        assert_eq!(prices, vec![Value::Uint(30), Value::Uint(40)]);
    }

    #[test]
    fn distinct_applies_to_the_selected_columns() {
        let source = seeded();
        let spec = QuerySpec::new()
            .with_select(["color"])
            .with_distinct(true)
            .with_order(["color"]);
        let rows = source.fetch(&widget_entity(), &spec).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn raw_fragments_are_refused() {
        let source = seeded();
        let spec = QuerySpec::new()
            .with_raw("price > ?", vec![Value::Uint(10)])
            .unwrap();
        let err = source.fetch(&widget_entity(), &spec).unwrap_err();
        assert!(matches!(err, SourceError::Unsupported { .. }));
    }

    #[test]
    fn pluck_validates_the_column() {
        let source = seeded();
        let spec = QuerySpec::new();
        let entity = widget_entity();

        let ids = source.pluck(&entity, &spec, "id").unwrap();
        assert_eq!(ids.len(), 6);

        let err = source.pluck(&entity, &spec, "ghost").unwrap_err();
        assert!(matches!(err, SourceError::UnknownColumn { .. }));
    }
}
