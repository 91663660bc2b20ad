//! Entry point of the persistence layer.
//!
//! The [`PersistenceFacade`] owns the schema, one [`RdbMapper`] per type,
//! the connection registry and the [`Transaction`]. Mappers receive the
//! facade as context for everything that crosses type boundaries.

use crate::build_depth::BuildDepth;
use crate::config::MapperConfig;
use crate::flush::order_inserts;
use crate::mapper::{LoadOptions, RdbMapper};
use crate::object::{ObjectRef, PersistentObjectProxy, RelationValue, read_object, write_object};
use crate::object_id::ObjectId;
use crate::paging::PagingInfo;
use crate::registry::ConnectionRegistry;
use crate::transaction::Transaction;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use wcmf_core::{Error, Result, Value};
use wcmf_query::{Criteria, OrderBy};
use wcmf_schema::Schema;

/// Upper bound of save passes in one commit. Saving a parent can dirty its
/// children, which the next pass picks up.
const MAX_FLUSH_ROUNDS: usize = 8;

/// Releases an (object, role) pair from the loading set when dropped.
pub(crate) struct LoadingGuard<'a> {
    loading: &'a Mutex<HashSet<(ObjectId, String)>>,
    key: Option<(ObjectId, String)>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.loading
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

/// Type registry, mapper lookup and unit of work.
#[derive(Debug)]
pub struct PersistenceFacade {
    schema: Schema,
    config: MapperConfig,
    registry: Arc<ConnectionRegistry>,
    mappers: HashMap<String, RdbMapper>,
    transaction: Mutex<Transaction>,
    loading: Mutex<HashSet<(ObjectId, String)>>,
}

impl PersistenceFacade {
    /// Build a mapper for every type of `schema`.
    ///
    /// Fails with [`Error::Config`] if the configured sequence type is not
    /// part of the schema.
    pub fn new(schema: Schema, config: MapperConfig, registry: Arc<ConnectionRegistry>) -> Result<Self> {
        let sequence = config.sequence_table(&schema)?;
        let mappers = schema
            .types()
            .map(|ty| {
                let mapper =
                    RdbMapper::new(Arc::clone(ty), &config, sequence.clone(), Arc::clone(&registry));
                (ty.name.clone(), mapper)
            })
            .collect();
        tracing::debug!(
            types = schema.types().count(),
            db_type = %config.connection.db_type,
            "persistence facade ready"
        );
        Ok(Self {
            schema,
            config,
            registry,
            mappers,
            transaction: Mutex::new(Transaction::new()),
            loading: Mutex::new(HashSet::new()),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn is_known_type(&self, type_name: &str) -> bool {
        self.schema.is_known_type(type_name)
    }

    /// The mapper of `type_name` (full or simple name).
    pub fn mapper(&self, type_name: &str) -> Result<&RdbMapper> {
        self.schema
            .get(type_name)
            .and_then(|ty| self.mappers.get(&ty.name))
            .ok_or_else(|| Error::illegal_argument(format!("unknown type '{}'", type_name)))
    }

    /// The name of `type_name` without namespace.
    pub fn simple_type(&self, type_name: &str) -> Result<&str> {
        Ok(self.mapper(type_name)?.ptype().simple_name())
    }

    /// The namespaced name of `type_name`.
    pub fn fully_qualified_type(&self, type_name: &str) -> Result<&str> {
        Ok(self.mapper(type_name)?.type_name())
    }

    // -- loading --------------------------------------------------------

    /// Load the object `oid`.
    ///
    /// With [`BuildDepth::Single`] an object already registered in the
    /// transaction is returned without a query.
    pub fn load(&self, oid: &ObjectId, depth: BuildDepth) -> Result<Option<ObjectRef>> {
        self.load_with(oid, depth, &LoadOptions::default())
    }

    pub fn load_with(
        &self,
        oid: &ObjectId,
        depth: BuildDepth,
        opts: &LoadOptions,
    ) -> Result<Option<ObjectRef>> {
        let mapper = self.mapper(oid.type_name())?;
        let oid = self.qualified(oid);
        if depth == BuildDepth::Single {
            if let Some(object) = self.lock_transaction().get(&oid) {
                return Ok(Some(object));
            }
        }
        mapper.load(self, &oid, depth, opts)
    }

    /// Load the object a proxy stands for.
    pub fn resolve(&self, proxy: &PersistentObjectProxy, depth: BuildDepth) -> Result<Option<ObjectRef>> {
        self.load(proxy.oid(), depth)
    }

    /// Load the objects of `type_name` matching `criteria`.
    pub fn load_objects(
        &self,
        type_name: &str,
        depth: BuildDepth,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
    ) -> Result<Vec<ObjectRef>> {
        self.load_objects_with(type_name, depth, criteria, order, paging, &LoadOptions::default())
    }

    pub fn load_objects_with(
        &self,
        type_name: &str,
        depth: BuildDepth,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
        opts: &LoadOptions,
    ) -> Result<Vec<ObjectRef>> {
        self.mapper(type_name)?
            .load_objects(self, depth, criteria, order, paging, opts)
    }

    /// The first object of `type_name` matching `criteria`.
    pub fn load_first_object(
        &self,
        type_name: &str,
        depth: BuildDepth,
        criteria: &[Criteria],
        order: &[OrderBy],
    ) -> Result<Option<ObjectRef>> {
        let mut paging = PagingInfo::single();
        let objects = self.load_objects(type_name, depth, criteria, order, Some(&mut paging))?;
        Ok(objects.into_iter().next())
    }

    /// Ids of the objects of `type_name` matching `criteria`.
    pub fn get_oids(
        &self,
        type_name: &str,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
    ) -> Result<Vec<ObjectId>> {
        self.mapper(type_name)?.get_oids(self, criteria, order, paging)
    }

    /// Load the relation `role` of `object` and store it on the object.
    pub fn load_relation(
        &self,
        object: &ObjectRef,
        role: &str,
        depth: BuildDepth,
    ) -> Result<RelationValue> {
        let type_name = read_object(object).type_name().to_string();
        let value = self.mapper(&type_name)?.load_relation(
            self,
            object,
            role,
            depth,
            &[],
            &[],
            None,
            &LoadOptions::default(),
        )?;
        write_object(object).set_relation_silent(role, value.clone());
        Ok(value)
    }

    // -- writing --------------------------------------------------------

    /// Create a NEW object of `type_name`, see [`RdbMapper::create`].
    pub fn create(&self, type_name: &str, depth: BuildDepth) -> Result<ObjectRef> {
        self.mapper(type_name)?.create(self, depth)
    }

    /// Store `object` now.
    pub fn save(&self, object: &ObjectRef) -> Result<()> {
        let type_name = read_object(object).type_name().to_string();
        self.mapper(&type_name)?.save(self, object)
    }

    /// Delete `object` from storage now.
    pub fn delete(&self, object: &ObjectRef) -> Result<()> {
        let type_name = read_object(object).type_name().to_string();
        self.mapper(&type_name)?.delete(self, object)
    }

    /// Schedule `object` for update on [`commit`](Self::commit).
    pub fn mark_dirty(&self, object: &ObjectRef) {
        self.lock_transaction().register_dirty(Arc::clone(object));
    }

    /// Schedule `object` for deletion on [`commit`](Self::commit).
    pub fn mark_deleted(&self, object: &ObjectRef) {
        self.lock_transaction().register_deleted(Arc::clone(object));
    }

    // -- helpers --------------------------------------------------------

    /// Render `criteria` on the table of its type.
    ///
    /// Fails with [`Error::IllegalArgument`] if the type is unknown.
    pub fn render_criteria(
        &self,
        criteria: &Criteria,
        use_placeholder: bool,
        table: Option<&str>,
        column: Option<&str>,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        self.mapper(&criteria.type_name)?
            .render_criteria(criteria, use_placeholder, table, column, params)
    }

    /// Draw the next id from the sequence table.
    pub fn next_id(&self) -> Result<i64> {
        self.mapper(&self.config.sequence_type)?.get_next_id()
    }

    /// The registered instance for `oid`, if any.
    pub fn registered(&self, oid: &ObjectId) -> Option<ObjectRef> {
        self.lock_transaction().get(&self.qualified(oid))
    }

    /// `oid` under the namespaced name of its type. Ids of unknown types
    /// are returned unchanged.
    fn qualified<'a>(&self, oid: &'a ObjectId) -> Cow<'a, ObjectId> {
        match self.schema.get(oid.type_name()) {
            Some(ty) if ty.name != oid.type_name() => Cow::Owned(oid.with_type(ty.name.clone())),
            _ => Cow::Borrowed(oid),
        }
    }

    // -- transactions -----------------------------------------------------

    /// Begin a transaction on the shared connection (idempotent).
    pub fn begin_transaction(&self) -> Result<()> {
        self.registry.begin_transaction(&self.config.connection)
    }

    /// Commit the shared connection's transaction (idempotent).
    pub fn commit_transaction(&self) -> Result<()> {
        self.registry.commit_transaction(&self.config.connection)
    }

    /// Roll back the shared connection's transaction (idempotent).
    pub fn rollback_transaction(&self) -> Result<()> {
        self.registry.rollback_transaction(&self.config.connection)
    }

    /// Flush new, dirty and deleted objects inside one database
    /// transaction.
    ///
    /// New objects are inserted in dependency order. On error the database
    /// transaction is rolled back and the error returned. The identity map
    /// is cleared either way.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn commit(&self) -> Result<()> {
        let result = self.begin_transaction().and_then(|()| {
            match self.flush().and_then(|()| self.commit_transaction()) {
                Ok(()) => Ok(()),
                Err(err) => {
                    if let Err(rollback) = self.rollback_transaction() {
                        tracing::warn!(error = %rollback, "rollback after failed commit failed");
                    }
                    Err(err)
                }
            }
        });
        self.lock_transaction().clear();
        result
    }

    /// Discard tracked changes and roll back an open database transaction.
    pub fn rollback(&self) -> Result<()> {
        let result = if self.registry.in_transaction(&self.config.connection) {
            self.rollback_transaction()
        } else {
            Ok(())
        };
        self.lock_transaction().clear();
        result
    }

    fn flush(&self) -> Result<()> {
        for round in 0..MAX_FLUSH_ROUNDS {
            let work = self.lock_transaction().take_pending();
            if work.is_empty() {
                return Ok(());
            }
            tracing::debug!(
                round,
                new = work.new.len(),
                dirty = work.dirty.len(),
                deleted = work.deleted.len(),
                "flush"
            );
            for object in order_inserts(&self.schema, &work.new) {
                self.save(&object)?;
            }
            for object in &work.dirty {
                self.save(object)?;
            }
            for object in &work.deleted {
                self.delete(object)?;
            }
        }
        Err(Error::Custom(format!(
            "pending changes remain after {} flush rounds",
            MAX_FLUSH_ROUNDS
        )))
    }

    // -- crate internals --------------------------------------------------

    fn lock_transaction(&self) -> MutexGuard<'_, Transaction> {
        self.transaction.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register_loaded(&self, object: ObjectRef) -> ObjectRef {
        self.lock_transaction().register_loaded(object)
    }

    pub(crate) fn register_new(&self, object: ObjectRef) {
        self.lock_transaction().register_new(object);
    }

    pub(crate) fn rekey(&self, old: &ObjectId, object: &ObjectRef) {
        self.lock_transaction().rekey(old, object);
    }

    pub(crate) fn detach(&self, oid: &ObjectId) {
        self.lock_transaction().detach(oid);
    }

    /// Mark `role` of `oid` as being loaded, or `None` if it already is.
    pub(crate) fn enter_loading(&self, oid: &ObjectId, role: &str) -> Option<LoadingGuard<'_>> {
        let key = (oid.clone(), role.to_string());
        let inserted = self
            .loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        if !inserted {
            tracing::trace!(oid = %oid, role, "relation already loading");
            return None;
        }
        Some(LoadingGuard {
            loading: &self.loading,
            key: Some(key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectState;
    use crate::testing::{RecordingConnection, RecordingDriver};
    use wcmf_core::{Connection, ConnectionParams, SqlType};
    use wcmf_schema::{
        AggregationKind, AttributeDescription, CreateTable, PersistentType, RelationDescription,
        RelationEnd,
    };

    fn schema() -> Schema {
        let folder = PersistentType::new("app.Folder")
            .attribute(AttributeDescription::primary_key("id"))
            .attribute(AttributeDescription::new("name", SqlType::Text))
            .relation(RelationDescription::one_to_many(
                RelationEnd::new("Folder", "Folder").aggregation(AggregationKind::Composite),
                RelationEnd::new("Note", "Note").unbounded(),
                "id",
                "fk_folder_id",
            ))
            .default_order("name");
        let note = PersistentType::new("app.Note")
            .attribute(AttributeDescription::primary_key("id"))
            .attribute(AttributeDescription::new("fk_folder_id", SqlType::BigInt))
            .attribute(AttributeDescription::new("text", SqlType::Text))
            .relation(RelationDescription::many_to_one(
                RelationEnd::new("Note", "Note").unbounded(),
                RelationEnd::new("Folder", "Folder"),
                "id",
                "fk_folder_id",
            ));
        let seq = PersistentType::new("Adodbseq").attribute(AttributeDescription::primary_key("id"));
        Schema::new(vec![folder, note, seq]).unwrap()
    }

    fn facade() -> (PersistenceFacade, Arc<RecordingDriver>) {
        let driver = Arc::new(RecordingDriver::new(RecordingConnection::sqlite()));
        let registry = ConnectionRegistry::new().with_driver(driver.clone());
        let config = MapperConfig::new(ConnectionParams::sqlite_memory());
        let ctx = PersistenceFacade::new(schema(), config, Arc::new(registry)).unwrap();
        let conn = driver.connection();
        let dialect = ctx.mapper("Folder").unwrap().dialect();
        for ty in ctx.schema().types() {
            conn.execute(&CreateTable::new(ty).build(dialect), &[]).unwrap();
        }
        for sql in [
            "INSERT INTO \"folder\" (\"id\", \"name\") VALUES (1, 'Inbox')",
            "INSERT INTO \"note\" (\"id\", \"fk_folder_id\", \"text\") VALUES (1, 1, 'a')",
            "INSERT INTO \"note\" (\"id\", \"fk_folder_id\", \"text\") VALUES (2, 1, 'b')",
        ] {
            conn.execute(sql, &[]).unwrap();
        }
        conn.clear();
        (ctx, driver)
    }

    fn folder_oid() -> ObjectId {
        ObjectId::new("app.Folder", vec![Value::BigInt(1)])
    }

    #[test]
    fn type_lookup_by_simple_or_full_name() {
        let (ctx, _) = facade();
        assert!(ctx.is_known_type("Folder"));
        assert!(ctx.is_known_type("app.Folder"));
        assert_eq!(ctx.simple_type("app.Note").unwrap(), "Note");
        assert_eq!(ctx.fully_qualified_type("Note").unwrap(), "app.Note");
        assert!(matches!(ctx.mapper("Nope"), Err(Error::IllegalArgument(_))));
    }

    #[test]
    fn unmapped_sequence_type_is_a_config_error() {
        let config = MapperConfig::new(ConnectionParams::sqlite_memory()).sequence_type("Counter");
        let err = PersistenceFacade::new(schema(), config, Arc::new(ConnectionRegistry::new()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn single_depth_issues_no_relation_query() {
        let (ctx, driver) = facade();
        let folder = ctx.load(&folder_oid(), BuildDepth::Single).unwrap().unwrap();
        assert_eq!(driver.connection().count("SELECT"), 1);
        let folder = read_object(&folder);
        assert!(folder.has_relation("Note"));
        assert!(!folder.is_relation_initialized("Note"));
    }

    #[test]
    fn depth_one_loads_children() {
        let (ctx, driver) = facade();
        let folder = ctx.load(&folder_oid(), BuildDepth::Depth(1)).unwrap().unwrap();
        assert_eq!(driver.connection().count("SELECT"), 2);
        let notes = read_object(&folder).get_relation("Note").unwrap().objects();
        assert_eq!(notes.len(), 2);
        for note in &notes {
            let note = read_object(note);
            assert_eq!(note.state(), ObjectState::Clean);
            assert!(!note.is_relation_initialized("Folder"));
        }
    }

    #[test]
    fn registered_object_is_reused() {
        let (ctx, driver) = facade();
        let first = ctx.load(&folder_oid(), BuildDepth::Single).unwrap().unwrap();
        let again = ctx.load(&folder_oid(), BuildDepth::Single).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(driver.connection().count("SELECT"), 1);

        let deeper = ctx.load(&folder_oid(), BuildDepth::Depth(1)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &deeper));
        assert!(read_object(&first).is_relation_initialized("Note"));
    }

    #[test]
    fn simple_type_names_resolve_to_the_registered_object() {
        let (ctx, driver) = facade();
        let folder = ctx.load(&folder_oid(), BuildDepth::Single).unwrap().unwrap();
        let simple = ObjectId::new("Folder", vec![Value::Int(1)]);

        assert!(ctx.registered(&simple).is_some());
        let again = ctx.load(&simple, BuildDepth::Single).unwrap().unwrap();
        assert!(Arc::ptr_eq(&folder, &again));
        assert_eq!(driver.connection().count("SELECT"), 1);

        let deeper = ctx.load(&simple, BuildDepth::Depth(1)).unwrap().unwrap();
        assert_eq!(read_object(&deeper).oid(), &folder_oid());
    }

    #[test]
    fn proxies_only_relation() {
        let (ctx, _) = facade();
        let folder = ctx.load(&folder_oid(), BuildDepth::Single).unwrap().unwrap();
        let notes = ctx.load_relation(&folder, "Note", BuildDepth::ProxiesOnly).unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|r| r.is_proxy()));
        assert!(read_object(&folder).is_relation_initialized("Note"));

        let note = ctx
            .resolve(&PersistentObjectProxy::new(notes.oids()[0].clone()), BuildDepth::Single)
            .unwrap()
            .unwrap();
        let parent = ctx.load_relation(&note, "Folder", BuildDepth::Single).unwrap();
        assert!(matches!(parent, RelationValue::One(Some(_))));
        assert_eq!(parent.oids(), vec![folder_oid()]);
    }

    #[test]
    fn paging_counts_total() {
        let (ctx, driver) = facade();
        let mut paging = PagingInfo::new(Some(1), false).page(2);
        let notes = ctx
            .load_objects("Note", BuildDepth::Single, &[], &[OrderBy::asc("text")], Some(&mut paging))
            .unwrap();
        assert_eq!(paging.total_count(), 2);
        assert_eq!(notes.len(), 1);
        assert_eq!(read_object(&notes[0]).get_value("text"), Some(&Value::from("b")));
        assert_eq!(driver.connection().count("SELECT COUNT(*)"), 1);
    }

    #[test]
    fn begin_is_idempotent() {
        let (ctx, driver) = facade();
        ctx.begin_transaction().unwrap();
        ctx.begin_transaction().unwrap();
        ctx.commit_transaction().unwrap();
        ctx.commit_transaction().unwrap();
        assert_eq!(driver.connection().count("BEGIN"), 1);
        assert_eq!(driver.connection().count("COMMIT"), 1);
    }

    #[test]
    fn commit_flushes_new_and_dirty_objects() {
        let (ctx, driver) = facade();
        let folder = ctx.load(&folder_oid(), BuildDepth::Single).unwrap().unwrap();
        write_object(&folder).set_value("name", "Archive");
        let note = ctx.create("Note", BuildDepth::Single).unwrap();
        write_object(&note).set_value("text", "c");
        write_object(&folder).add_related("Note", Arc::clone(&note));

        ctx.commit().unwrap();
        assert_eq!(driver.connection().count("BEGIN"), 1);
        assert_eq!(driver.connection().count("COMMIT"), 1);
        assert_eq!(read_object(&note).state(), ObjectState::Clean);
        assert_eq!(read_object(&note).get_value("fk_folder_id"), Some(&Value::BigInt(1)));
        assert!(ctx.registered(&folder_oid()).is_none());

        let stored = ctx.load(&folder_oid(), BuildDepth::Depth(1)).unwrap().unwrap();
        let stored = read_object(&stored);
        assert_eq!(stored.get_value("name"), Some(&Value::from("Archive")));
        assert_eq!(stored.get_relation("Note").map(RelationValue::len), Some(3));
    }

    #[test]
    fn failed_commit_rolls_back() {
        let (ctx, driver) = facade();
        let stored_first = ctx.create("Note", BuildDepth::Single).unwrap();
        write_object(&stored_first).set_value("text", "c");
        let clashing = ctx.create("Note", BuildDepth::Single).unwrap();
        write_object(&clashing).set_value("id", 1);

        assert!(matches!(ctx.commit(), Err(Error::Persistence(_))));
        assert_eq!(driver.connection().count("ROLLBACK"), 1);
        assert_eq!(driver.connection().count("COMMIT"), 0);
        let notes = ctx
            .load_objects("Note", BuildDepth::Single, &[], &[], None)
            .unwrap();
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn loading_guard_is_released() {
        let (ctx, _) = facade();
        let oid = folder_oid();
        let guard = ctx.enter_loading(&oid, "Note");
        assert!(guard.is_some());
        assert!(ctx.enter_loading(&oid, "Note").is_none());
        drop(guard);
        assert!(ctx.enter_loading(&oid, "Note").is_some());
    }
}
