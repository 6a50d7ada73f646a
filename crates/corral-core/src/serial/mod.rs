//! Module: serial
//! Responsibility: the portable primitive representation of a collection —
//! encoding a predicate tree into primitive nodes and replaying them back.
//! Does not own: predicate construction or registry resolution rules.
//!
//! The wire mapping is a stable, transmitted format: fixed top-level keys,
//! `where` as a list whose head may be a table→column→value mapping and
//! whose tail may contain `{not: …}` / `{or: […]}` entries or opaque text
//! fragments.

#[cfg(test)]
mod tests;

use crate::{
    collection::Collection,
    error::Error,
    predicate::{CompareOp, Comparison, Operand, Predicate},
    registry::{CollectionDef, Registry},
    source::DataSource,
    spec::{Bind, Criteria},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// SerialError
///

#[derive(Debug, ThisError)]
pub enum SerialError {
    #[error("reference '{name}' does not resolve to a known, compatible type")]
    InvalidReference { name: String },

    #[error("predicate node cannot be serialized: {detail}")]
    UnserializableNode { detail: String },

    #[error("bind entry '{name}' has no matching predicate reference")]
    DanglingBind { name: String },

    #[error("malformed where node: {detail}")]
    MalformedNode { detail: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

///
/// WhereNode
///
/// One entry of the `where` list. Untagged: `{not: …}` and `{or: […]}` are
/// tried before the plain table→column→value mapping, a JSON array is a
/// group (one side of an `or` that covered several fragments), and a bare
/// string is an opaque fragment.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WhereNode {
    Not { not: Box<WhereNode> },
    Or { or: Vec<WhereNode> },
    Map(BTreeMap<String, BTreeMap<String, Value>>),
    Group(Vec<WhereNode>),
    Raw(String),
}

///
/// CollectionRepr
///
/// The portable primitive mapping. Key set and spelling are part of the
/// persisted format and must stay stable.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRepr {
    pub entity_type: Option<String>,
    pub collection_type: Option<String>,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub joins: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(rename = "where", default)]
    pub where_clause: Vec<WhereNode>,
    #[serde(default)]
    pub bind: Vec<Bind>,
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub order: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Collection {
    /// Snapshot this collection into the portable primitive mapping.
    pub fn to_primitive(&self) -> Result<CollectionRepr, Error> {
        to_primitive(self)
    }

    /// Snapshot this collection into its JSON form.
    pub fn to_json(&self) -> Result<String, Error> {
        let repr = self.to_primitive()?;
        Ok(serde_json::to_string(&repr).map_err(SerialError::from)?)
    }

    /// Rebuild a collection from the portable primitive mapping.
    pub fn from_primitive(
        registry: Arc<Registry>,
        source: Arc<dyn DataSource>,
        repr: &CollectionRepr,
    ) -> Result<Self, Error> {
        from_primitive(registry, source, repr)
    }

    /// Rebuild a collection from its JSON form.
    pub fn from_json(
        registry: Arc<Registry>,
        source: Arc<dyn DataSource>,
        json: &str,
    ) -> Result<Self, Error> {
        let repr: CollectionRepr = serde_json::from_str(json).map_err(SerialError::from)?;
        from_primitive(registry, source, &repr)
    }
}

//
// Encoding
//

pub fn to_primitive(collection: &Collection) -> Result<CollectionRepr, Error> {
    let entity = collection.binding()?;
    let spec = collection.effective_spec();

    let mut binds: Vec<Bind> = spec.bind().to_vec();
    let mut nodes = Vec::new();
    let mut raw_values = Vec::new();
    if let Some(predicate) = spec.predicate() {
        encode_into(
            predicate,
            entity.table(),
            &mut binds,
            &mut nodes,
            &mut raw_values,
        )?;
    }
    if let Some(dangling) = binds.first() {
        return Err(SerialError::DanglingBind {
            name: dangling.name.clone(),
        }
        .into());
    }

    // The registered collection type name travels; an ad-hoc def does not.
    let collection_type = collection
        .registry()
        .collection(collection.def().name())
        .map(|def| def.name().to_string());

    Ok(CollectionRepr {
        entity_type: Some(entity.name().to_string()),
        collection_type,
        select: spec.select().to_vec(),
        distinct: spec.distinct(),
        joins: spec.joins().to_vec(),
        references: spec.references().to_vec(),
        includes: spec.includes().to_vec(),
        where_clause: merge_map_nodes(nodes),
        bind: raw_values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Bind {
                name: format!("${}", i + 1),
                value,
            })
            .collect(),
        group: spec.group().to_vec(),
        order: spec.order().to_vec(),
        limit: spec.limit(),
        offset: spec.offset(),
    })
}

/// Flatten `And` lists into the surrounding node list.
fn encode_into(
    predicate: &Predicate,
    table: &str,
    binds: &mut Vec<Bind>,
    nodes: &mut Vec<WhereNode>,
    raw_values: &mut Vec<Value>,
) -> Result<(), SerialError> {
    match predicate {
        Predicate::And(children) => {
            for child in children {
                encode_into(child, table, binds, nodes, raw_values)?;
            }
            Ok(())
        }
        other => {
            nodes.push(encode_node(other, table, binds, raw_values)?);
            Ok(())
        }
    }
}

fn encode_node(
    predicate: &Predicate,
    table: &str,
    binds: &mut Vec<Bind>,
    raw_values: &mut Vec<Value>,
) -> Result<WhereNode, SerialError> {
    match predicate {
        Predicate::Compare(cmp) => encode_compare(cmp, table, binds, raw_values),
        Predicate::Not(child) => Ok(WhereNode::Not {
            not: Box::new(encode_node(child, table, binds, raw_values)?),
        }),
        Predicate::Or(left, right) => Ok(WhereNode::Or {
            or: vec![
                encode_node(left, table, binds, raw_values)?,
                encode_node(right, table, binds, raw_values)?,
            ],
        }),
        Predicate::And(children) => Ok(WhereNode::Group(
            children
                .iter()
                .map(|child| encode_node(child, table, binds, raw_values))
                .collect::<Result<_, _>>()?,
        )),
        Predicate::Raw(fragment) => {
            raw_values.extend(fragment.bind.iter().cloned());
            Ok(WhereNode::Raw(fragment.sql.clone()))
        }
    }
}

fn encode_compare(
    cmp: &Comparison,
    default_table: &str,
    binds: &mut Vec<Bind>,
    raw_values: &mut Vec<Value>,
) -> Result<WhereNode, SerialError> {
    let value = resolve_operand(cmp, binds)?;
    let table = cmp.table.as_deref().unwrap_or(default_table);

    match cmp.op {
        CompareOp::Eq => Ok(map_node(table, &cmp.column, value)),
        CompareOp::Ne => Ok(WhereNode::Not {
            not: Box::new(map_node(table, &cmp.column, value)),
        }),
        CompareOp::In => {
            // No structural spelling; degrade to an opaque fragment with
            // one placeholder per element.
            let Value::List(items) = value else {
                return Err(SerialError::UnserializableNode {
                    detail: format!(
                        "IN comparison on '{}.{}' requires a list operand",
                        table, cmp.column
                    ),
                });
            };
            let marks = vec!["?"; items.len()].join(", ");
            raw_values.extend(items);
            Ok(WhereNode::Raw(format!(
                "{}.{} IN ({marks})",
                table, cmp.column
            )))
        }
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            raw_values.push(value);
            Ok(WhereNode::Raw(format!(
                "{}.{} {} ?",
                table,
                cmp.column,
                cmp.op.token()
            )))
        }
    }
}

fn resolve_operand(cmp: &Comparison, binds: &mut Vec<Bind>) -> Result<Value, SerialError> {
    match &cmp.operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Bound(name) => {
            let idx = binds.iter().position(|b| &b.name == name).ok_or_else(|| {
                SerialError::UnserializableNode {
                    detail: format!("unbound parameter '{name}'"),
                }
            })?;
            Ok(binds.remove(idx).value)
        }
    }
}

fn map_node(table: &str, column: &str, value: Value) -> WhereNode {
    let mut columns = BTreeMap::new();
    columns.insert(column.to_string(), value);
    let mut map = BTreeMap::new();
    map.insert(table.to_string(), columns);
    WhereNode::Map(map)
}

/// Merge plain map nodes into one table→column→value mapping hoisted to the
/// head of the list. A column already present keeps its fragment separate
/// instead of being silently overwritten.
fn merge_map_nodes(nodes: Vec<WhereNode>) -> Vec<WhereNode> {
    let mut merged: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
    let mut rest = Vec::new();

    for node in nodes {
        match node {
            WhereNode::Map(map) => {
                for (table, columns) in map {
                    let slot = merged.entry(table.clone()).or_default();
                    let mut collided = BTreeMap::new();
                    for (column, value) in columns {
                        if slot.contains_key(&column) {
                            collided.insert(column, value);
                        } else {
                            slot.insert(column, value);
                        }
                    }
                    if !collided.is_empty() {
                        let mut map = BTreeMap::new();
                        map.insert(table, collided);
                        rest.push(WhereNode::Map(map));
                    }
                }
            }
            other => rest.push(other),
        }
    }

    let mut out = Vec::with_capacity(rest.len() + 1);
    if !merged.is_empty() {
        out.push(WhereNode::Map(merged));
    }
    out.extend(rest);
    out
}

//
// Decoding
//

pub fn from_primitive(
    registry: Arc<Registry>,
    source: Arc<dyn DataSource>,
    repr: &CollectionRepr,
) -> Result<Collection, Error> {
    let def = resolve_types(&registry, repr)?;
    let mut collection = Collection::from_parts(registry, source, def);
    let entity = collection.binding()?;
    let table = entity.table().to_string();

    if !repr.select.is_empty() {
        collection = collection.select(repr.select.clone());
    }
    if repr.distinct {
        collection = collection.distinct(true);
    }
    if !repr.joins.is_empty() {
        collection = collection.joins(repr.joins.clone());
    }
    if !repr.references.is_empty() {
        collection = collection.references(repr.references.clone());
    }
    if !repr.includes.is_empty() {
        collection = collection.includes(repr.includes.clone());
    }

    // Map-shaped predicates replay individually through the structured
    // verbs; textual fragments accumulate and replay once, positionally
    // paired with the transmitted bind values.
    let mut raws = Vec::new();
    for node in &repr.where_clause {
        collection = apply_node(collection, node, &table, &mut raws)?;
    }
    if !raws.is_empty() {
        let sql = normalize_placeholders(&raws.join(" AND "));
        let values: Vec<Value> = repr.bind.iter().map(|b| b.value.clone()).collect();
        collection = collection.filter_raw(&sql, values)?;
    }

    if !repr.group.is_empty() {
        collection = collection.group(repr.group.clone());
    }
    if !repr.order.is_empty() {
        collection = collection.order(repr.order.clone());
    }
    if repr.limit.is_some() {
        collection = collection.limit(repr.limit);
    }
    if repr.offset.is_some() {
        collection = collection.offset(repr.offset);
    }
    Ok(collection)
}

/// Resolve and cross-validate the transmitted type names.
fn resolve_types(
    registry: &Arc<Registry>,
    repr: &CollectionRepr,
) -> Result<Arc<CollectionDef>, SerialError> {
    if let Some(entity) = &repr.entity_type {
        if registry.entity(entity).is_none() {
            return Err(SerialError::InvalidReference {
                name: entity.clone(),
            });
        }
    }

    match (&repr.collection_type, &repr.entity_type) {
        (Some(collection), entity) => {
            let def = registry
                .collection(collection)
                .ok_or_else(|| SerialError::InvalidReference {
                    name: collection.clone(),
                })?;
            if let Some(entity) = entity {
                let resolved =
                    registry
                        .resolve_def(&def)
                        .map_err(|_| SerialError::InvalidReference {
                            name: collection.clone(),
                        })?;
                if resolved.name() != entity {
                    return Err(SerialError::InvalidReference {
                        name: entity.clone(),
                    });
                }
            }
            Ok(def)
        }
        (None, Some(entity)) => Ok(Arc::new(CollectionDef::over(entity.clone()))),
        (None, None) => Err(SerialError::InvalidReference {
            name: "<no collection or entity type>".to_string(),
        }),
    }
}

fn apply_node(
    collection: Collection,
    node: &WhereNode,
    table: &str,
    raws: &mut Vec<String>,
) -> Result<Collection, Error> {
    match node {
        WhereNode::Map(map) => Ok(collection.filter(map_criteria(map, table))),
        WhereNode::Not { not } => {
            let criteria = node_criteria(not, table)?;
            Ok(collection.not(criteria))
        }
        WhereNode::Or { .. } => {
            let criteria = node_criteria(node, table)?;
            Ok(collection.filter(criteria))
        }
        WhereNode::Group(nodes) => {
            let mut collection = collection;
            for node in nodes {
                collection = apply_node(collection, node, table, raws)?;
            }
            Ok(collection)
        }
        WhereNode::Raw(sql) => {
            raws.push(sql.clone());
            Ok(collection)
        }
    }
}

/// Lower a where node back into structured criteria. Raw fragments cannot
/// appear below `not`/`or` in a reconstructible payload.
fn node_criteria(node: &WhereNode, table: &str) -> Result<Criteria, SerialError> {
    match node {
        WhereNode::Map(map) => Ok(map_criteria(map, table)),
        WhereNode::Not { not } => Ok(Criteria::not(node_criteria(not, table)?)),
        WhereNode::Or { or } => {
            let branches = or
                .iter()
                .map(|branch| node_criteria(branch, table))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Criteria::any_of(branches))
        }
        WhereNode::Group(nodes) => {
            let mut criteria = Criteria::new();
            for node in nodes {
                criteria = criteria.and(node_criteria(node, table)?);
            }
            Ok(criteria)
        }
        WhereNode::Raw(sql) => Err(SerialError::MalformedNode {
            detail: format!("opaque fragment '{sql}' cannot be nested under not/or"),
        }),
    }
}

fn map_criteria(map: &BTreeMap<String, BTreeMap<String, Value>>, table: &str) -> Criteria {
    let mut criteria = Criteria::new();
    for (map_table, columns) in map {
        let pairs: Vec<(String, Value)> = columns
            .iter()
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();
        criteria = if map_table == table {
            pairs
                .into_iter()
                .fold(criteria, |acc, (column, value)| acc.and_column(column, value))
        } else {
            criteria.and(Criteria::table(map_table.clone(), pairs))
        };
    }
    criteria
}

/// Rewrite `$n` positional placeholders to `?`, preserving everything else.
fn normalize_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().is_some_and(char::is_ascii_digit) {
            while chars.peek().is_some_and(char::is_ascii_digit) {
                chars.next();
            }
            out.push('?');
        } else {
            out.push(c);
        }
    }
    out
}
