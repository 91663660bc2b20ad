//! Deleting objects and cascading to their children.

use super::{LoadOptions, RdbMapper};
use crate::build_depth::BuildDepth;
use crate::facade::PersistenceFacade;
use crate::object::{ObjectRef, ObjectState, PersistentObjectProxy, read_object, write_object};
use crate::object_id::ObjectId;
use wcmf_core::{Result, Value};
use wcmf_schema::{AggregationKind, RelationKind};

impl RdbMapper {
    /// Delete `object` from storage.
    ///
    /// If a row was removed, children of composite and many-to-many
    /// relations are deleted too while other children only lose their
    /// reference to the object. Objects that were never inserted are just
    /// marked deleted.
    pub fn delete(&self, ctx: &PersistenceFacade, object: &ObjectRef) -> Result<()> {
        let (oid, state) = {
            let o = read_object(object);
            (o.oid().clone(), o.state())
        };
        match state {
            ObjectState::Deleted => return Ok(()),
            ObjectState::New => {
                self.forget(ctx, object, &oid);
                return Ok(());
            }
            ObjectState::Dirty | ObjectState::Clean if oid.is_dummy() => {
                self.forget(ctx, object, &oid);
                return Ok(());
            }
            ObjectState::Dirty | ObjectState::Clean => {}
        }

        tracing::debug!(oid = %oid, "delete");
        let mut affected = 0;
        for (sql, params) in self.delete_sql(&oid)? {
            affected += self.execute(&sql, &params)?;
        }
        self.forget(ctx, object, &oid);
        if affected > 0 {
            self.delete_children(ctx, &oid)?;
        }
        Ok(())
    }

    fn forget(&self, ctx: &PersistenceFacade, object: &ObjectRef, oid: &ObjectId) {
        write_object(object).set_state(ObjectState::Deleted);
        ctx.detach(oid);
    }

    fn delete_children(&self, ctx: &PersistenceFacade, oid: &ObjectId) -> Result<()> {
        let proxy = PersistentObjectProxy::new(oid.clone());
        for rel in self.ty.relations.iter().filter(|r| r.is_child()) {
            if !rel.is_navigable() {
                continue;
            }
            let half = rel.this_end_relation();
            let other = ctx.mapper(half.other_type())?;
            let children = other.load_related_objects(
                ctx,
                &proxy,
                half.this_role(),
                BuildDepth::Single,
                &[],
                &[],
                None,
                &LoadOptions::default(),
            )?;
            let owned = rel.is_many_to_many() || rel.this_end.aggregation == AggregationKind::Composite;
            for child in &children {
                if owned {
                    other.delete(ctx, child)?;
                } else if let RelationKind::OneToMany { fk_name, .. } = &half.kind {
                    other.unlink(child, fk_name, half.this_role())?;
                }
            }
        }
        Ok(())
    }

    /// Clear the foreign key of a shared child without dirtying it.
    fn unlink(&self, child: &ObjectRef, fk_column: &str, parent_role: &str) -> Result<()> {
        let child_oid = read_object(child).oid().clone();
        tracing::debug!(oid = %child_oid, fk = fk_column, "unlink");
        let (sql, params) = self.unlink_sql(&child_oid, fk_column)?;
        self.execute(&sql, &params)?;
        let fk = self.attribute_for_column(fk_column)?;
        let mut child = write_object(child);
        child.set_value_silent(fk.name.clone(), Value::Null);
        child.clear_relation_silent(parent_role);
        Ok(())
    }
}
