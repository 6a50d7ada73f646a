use crate::{DEFAULT_BATCH_SIZE, source::RecordOps};
use convert_case::{Case, Casing};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("no entity type could be resolved for collection type '{collection}'")]
    UnresolvedEntityBinding { collection: String },

    #[error("entity type '{entity}' is not a persistable record: {reason}")]
    InvalidEntityType { entity: String, reason: String },

    #[error("unknown entity type '{entity}'")]
    UnknownEntity { entity: String },

    #[error("unknown collection type '{collection}'")]
    UnknownCollection { collection: String },
}

///
/// EntityDef
///
/// Descriptor of a domain-entity type: name, backing table, column set,
/// identity column, and an optional per-record operation handler used by
/// delegation.
///

#[derive(Clone)]
pub struct EntityDef {
    name: String,
    table: String,
    columns: Vec<String>,
    primary_key: String,
    record_ops: Option<Arc<dyn RecordOps>>,
}

impl EntityDef {
    /// New definition. The table name defaults to the snake-cased plural of
    /// the entity name (`StockedProduct` → `stocked_products`).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table = pluralize(&name.to_case(Case::Snake));
        Self {
            name,
            table,
            columns: Vec::new(),
            primary_key: "id".to_string(),
            record_ops: None,
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    #[must_use]
    pub fn with_record_ops(mut self, ops: Arc<dyn RecordOps>) -> Self {
        self.record_ops = Some(ops);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    #[must_use]
    pub fn record_ops(&self) -> Option<&Arc<dyn RecordOps>> {
        self.record_ops.as_ref()
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// The persistable-record capability: a queryable column set containing
    /// the identity column.
    fn persistable(&self) -> Result<(), RegistryError> {
        if self.columns.is_empty() {
            return Err(RegistryError::InvalidEntityType {
                entity: self.name.clone(),
                reason: "no queryable columns".to_string(),
            });
        }
        if !self.has_column(&self.primary_key) {
            return Err(RegistryError::InvalidEntityType {
                entity: self.name.clone(),
                reason: format!("identity column '{}' is not a column", self.primary_key),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("primary_key", &self.primary_key)
            .field("record_ops", &self.record_ops.is_some())
            .finish()
    }
}

///
/// CollectionDef
///
/// Descriptor of a collection type: optional explicit entity binding,
/// optional parent collection type, and the batching configuration.
///

#[derive(Clone, Debug)]
pub struct CollectionDef {
    name: String,
    entity: Option<String>,
    parent: Option<String>,
    default_batch_size: u64,
    batching_threshold: u64,
}

impl CollectionDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: None,
            parent: None,
            default_batch_size: DEFAULT_BATCH_SIZE,
            batching_threshold: 0,
        }
    }

    /// Anonymous collection type bound directly to an entity type; used for
    /// ad-hoc collections and deserialized payloads without a collection
    /// type name.
    #[must_use]
    pub fn over(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(pluralize(&entity)).with_entity(entity)
    }

    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    #[must_use]
    pub const fn with_default_batch_size(mut self, size: u64) -> Self {
        self.default_batch_size = size;
        self
    }

    /// Whole-set operations on collections at or above this total engage
    /// batching automatically. Zero disables the policy.
    #[must_use]
    pub const fn with_batching_threshold(mut self, threshold: u64) -> Self {
        self.batching_threshold = threshold;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    #[must_use]
    pub const fn default_batch_size(&self) -> u64 {
        self.default_batch_size
    }

    #[must_use]
    pub const fn batching_threshold(&self) -> u64 {
        self.batching_threshold
    }
}

///
/// Registry
///
/// Explicit registration service for entity and collection types, injected
/// into collection construction. Populated at startup, read-only afterward.
///
/// Binding resolution is memoized on first success and never re-inferred,
/// even if a later registration would change the outcome; the stale cache
/// is deliberate. The memo is behind a lock only so a registry can be
/// shared read-only across threads.
///

#[derive(Debug, Default)]
pub struct Registry {
    entities: BTreeMap<String, Arc<EntityDef>>,
    collections: BTreeMap<String, Arc<CollectionDef>>,
    resolved: RwLock<BTreeMap<String, Arc<EntityDef>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, validating the persistable-record
    /// capability. Re-registering a name replaces the previous definition
    /// (already-memoized bindings keep the old one).
    pub fn register_entity(&mut self, def: EntityDef) -> Result<(), RegistryError> {
        def.persistable()?;
        self.entities.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Register a collection type. An explicit entity binding must name a
    /// registered, persistable entity.
    pub fn register_collection(&mut self, def: CollectionDef) -> Result<(), RegistryError> {
        if let Some(entity) = &def.entity {
            let known = self
                .entities
                .get(entity)
                .ok_or_else(|| RegistryError::UnknownEntity {
                    entity: entity.clone(),
                })?;
            known.persistable()?;
        }
        self.collections.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<Arc<EntityDef>> {
        self.entities.get(name).cloned()
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<Arc<CollectionDef>> {
        self.collections.get(name).cloned()
    }

    /// Resolve the entity binding for a collection type name.
    ///
    /// Order: explicit binding on the def, then the memo, then
    /// naming-convention inference (singularized name), then the parent
    /// collection chain. The first success is memoized per name.
    pub fn resolve(&self, collection: &str) -> Result<Arc<EntityDef>, RegistryError> {
        if let Some(hit) = self
            .resolved
            .read()
            .expect("binding memo lock poisoned")
            .get(collection)
        {
            return Ok(hit.clone());
        }

        let mut visited = BTreeSet::new();
        let entity = self.resolve_chain(collection, &mut visited)?;

        self.resolved
            .write()
            .expect("binding memo lock poisoned")
            .insert(collection.to_string(), entity.clone());
        Ok(entity)
    }

    /// Resolve an explicitly bound anonymous def without touching the memo.
    pub(crate) fn resolve_def(&self, def: &CollectionDef) -> Result<Arc<EntityDef>, RegistryError> {
        if let Some(entity) = &def.entity {
            return self
                .entity(entity)
                .ok_or_else(|| RegistryError::UnknownEntity {
                    entity: entity.clone(),
                });
        }
        self.resolve(&def.name)
    }

    fn resolve_chain(
        &self,
        collection: &str,
        visited: &mut BTreeSet<String>,
    ) -> Result<Arc<EntityDef>, RegistryError> {
        if !visited.insert(collection.to_string()) {
            return Err(RegistryError::UnresolvedEntityBinding {
                collection: collection.to_string(),
            });
        }

        let def = self.collections.get(collection);

        // (1) explicit binding
        if let Some(entity) = def.and_then(|d| d.entity.as_ref()) {
            return self
                .entity(entity)
                .ok_or_else(|| RegistryError::UnknownEntity {
                    entity: entity.clone(),
                });
        }

        // (2) a prior resolution for this name
        if let Some(hit) = self
            .resolved
            .read()
            .expect("binding memo lock poisoned")
            .get(collection)
        {
            return Ok(hit.clone());
        }

        // (3) naming-convention inference
        let singular = singularize(collection);
        if let Some(entity) = self.entities.get(&singular) {
            return Ok(entity.clone());
        }

        // (4) parent chain
        if let Some(parent) = def.and_then(|d| d.parent.as_ref()) {
            if let Ok(entity) = self.resolve_chain(parent, visited) {
                return Ok(entity);
            }
        }

        Err(RegistryError::UnresolvedEntityBinding {
            collection: collection.to_string(),
        })
    }
}

/// Naive english pluralization, enough for table-name defaults.
fn pluralize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix('y') {
        format!("{stem}ies")
    } else if name.ends_with('s') {
        format!("{name}es")
    } else {
        format!("{name}s")
    }
}

/// Inverse convention for binding inference: `Widgets` → `Widget`,
/// `Categories` → `Category`. Names ending in a double `s` are left alone.
fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        format!("{stem}y")
    } else if name.ends_with("ss") {
        name.to_string()
    } else if let Some(stem) = name.strip_suffix('s') {
        stem.to_string()
    } else {
        name.to_string()
    }
}
