//! Construction of NEW objects with their default children.

use super::RdbMapper;
use crate::build_depth::BuildDepth;
use crate::facade::PersistenceFacade;
use crate::object::{ObjectRef, Related, RelationValue, object_ref, write_object};
use wcmf_core::{Error, Result};
use wcmf_schema::{AggregationKind, RelationDescription};

impl RdbMapper {
    /// Create a NEW object with default values and register it.
    ///
    /// `depth` must be [`BuildDepth::Single`], [`BuildDepth::Required`] or
    /// [`BuildDepth::Depth`]. Children built along the way are registered
    /// too and attached to their role as a one-element list.
    pub fn create(&self, ctx: &PersistenceFacade, depth: BuildDepth) -> Result<ObjectRef> {
        match depth {
            BuildDepth::Single | BuildDepth::Required | BuildDepth::Depth(_) => {
                self.create_at_level(ctx, depth, 0)
            }
            other => Err(Error::illegal_argument(format!(
                "build depth {} is not supported by create",
                other
            ))),
        }
    }

    fn create_at_level(
        &self,
        ctx: &PersistenceFacade,
        depth: BuildDepth,
        level: u32,
    ) -> Result<ObjectRef> {
        let object = object_ref(self.create_object_from_data(None, None)?);
        for rel in &self.ty.relations {
            let role = rel.other_role();
            if level < BuildDepth::MAX && rel.is_child() && builds_child(rel, depth) {
                let other = ctx.mapper(rel.other_type())?;
                let child_depth = if rel.is_many_to_many() {
                    BuildDepth::Single
                } else {
                    depth.next()
                };
                let child = other.create_at_level(ctx, child_depth, level + 1)?;
                write_object(&object)
                    .set_relation_silent(role, RelationValue::Many(vec![Related::Object(child)]));
            } else {
                write_object(&object).add_relation(role);
            }
        }
        tracing::debug!(type_name = %self.ty.name, level, depth = %depth, "created object");
        ctx.register_new(object.clone());
        Ok(object)
    }
}

/// Whether a create at `depth` constructs a default child for `rel`.
fn builds_child(rel: &RelationDescription, depth: BuildDepth) -> bool {
    match depth {
        BuildDepth::Depth(n) => n > 0,
        BuildDepth::Required => {
            rel.other_end.min > 0 && rel.other_end.aggregation != AggregationKind::None
        }
        _ => false,
    }
}
