//! Loading objects and relations.

use super::{LoadOptions, RdbMapper};
use crate::build_depth::BuildDepth;
use crate::facade::PersistenceFacade;
use crate::object::{
    ObjectRef, ObjectState, PersistentObjectProxy, Related, RelationValue, object_ref,
    read_object, write_object,
};
use crate::object_id::ObjectId;
use crate::paging::PagingInfo;
use wcmf_core::{Error, Result, Value};
use wcmf_query::{Criteria, OrderBy, SelectStatement};
use wcmf_schema::RelationDescription;

impl RdbMapper {
    /// Load the object `oid`, following child relations to `depth`.
    #[tracing::instrument(level = "debug", skip_all, fields(oid = %oid, depth = %depth))]
    pub fn load(
        &self,
        ctx: &PersistenceFacade,
        oid: &ObjectId,
        depth: BuildDepth,
        opts: &LoadOptions,
    ) -> Result<Option<ObjectRef>> {
        let criteria = self.pk_criteria(oid)?;
        let mut paging = PagingInfo::single();
        let objects = self.load_objects(ctx, depth, &criteria, &[], Some(&mut paging), opts)?;
        Ok(objects.into_iter().next())
    }

    /// Load the objects matching `criteria`.
    pub fn load_objects(
        &self,
        ctx: &PersistenceFacade,
        depth: BuildDepth,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
        opts: &LoadOptions,
    ) -> Result<Vec<ObjectRef>> {
        if !opts.includes_type(&self.ty) {
            return Ok(Vec::new());
        }
        let select = self.select_sql(ctx, criteria, order, opts.attributes_for(&self.ty))?;
        self.load_objects_from_sql(ctx, select, depth, paging, opts)
    }

    /// Ids of the objects matching `criteria`.
    pub fn get_oids(
        &self,
        ctx: &PersistenceFacade,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
    ) -> Result<Vec<ObjectId>> {
        let select = self.select_sql(ctx, criteria, order, Some(&[]))?;
        self.load_oids_from_sql(select, paging)
    }

    /// Run `select` and materialize, link and register every row.
    pub fn load_objects_from_sql(
        &self,
        ctx: &PersistenceFacade,
        mut select: SelectStatement,
        depth: BuildDepth,
        paging: Option<&mut PagingInfo>,
        opts: &LoadOptions,
    ) -> Result<Vec<ObjectRef>> {
        self.apply_paging(&mut select, paging)?;
        let (sql, params) = select.build();
        let rows = self.query(&sql, &params)?;

        let attribs = opts.attributes_for(&self.ty);
        let mut objects = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut object = self.create_object_from_data(Some(row), attribs)?;
            object.set_state(ObjectState::Clean);
            let object = object_ref(object);
            self.add_related_objects(ctx, &object, depth, opts)?;
            objects.push(ctx.register_loaded(object));
        }
        Ok(objects)
    }

    fn load_oids_from_sql(
        &self,
        mut select: SelectStatement,
        paging: Option<&mut PagingInfo>,
    ) -> Result<Vec<ObjectId>> {
        self.apply_paging(&mut select, paging)?;
        let (sql, params) = select.build();
        self.query(&sql, &params)?
            .iter()
            .map(|row| self.construct_oid(row))
            .collect()
    }

    /// Count the total unless the caller opted out, then restrict `select`
    /// to the requested page.
    fn apply_paging(
        &self,
        select: &mut SelectStatement,
        paging: Option<&mut PagingInfo>,
    ) -> Result<()> {
        let Some(paging) = paging else {
            return Ok(());
        };
        if !paging.ignore_total() {
            let (sql, params) = select.build_count();
            let total = self
                .query(&sql, &params)?
                .first()
                .and_then(|row| row.get(0))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            paging.set_total_count(u64::try_from(total).unwrap_or(0));
        }
        select.set_limit(paging.page_size());
        select.set_offset(Some(paging.offset()));
        Ok(())
    }

    /// Resolve the child relations of a freshly loaded object when `depth`
    /// asks for it, or record them as not loaded.
    pub(crate) fn add_related_objects(
        &self,
        ctx: &PersistenceFacade,
        object: &ObjectRef,
        depth: BuildDepth,
        opts: &LoadOptions,
    ) -> Result<()> {
        let oid = read_object(object).oid().clone();
        for rel in &self.ty.relations {
            let role = rel.other_role();
            let guard = if depth.is_eager() && rel.is_child() {
                ctx.enter_loading(&oid, role)
            } else {
                None
            };
            match guard {
                Some(_guard) => {
                    let value =
                        self.load_relation_value(ctx, &oid, rel, depth.next(), &[], &[], None, opts)?;
                    write_object(object).set_relation_silent(role, value);
                }
                None => write_object(object).add_relation(role),
            }
        }
        Ok(())
    }

    /// Load the objects of this type related to `proxy`.
    ///
    /// `other_role` is the role under which this type sees the proxy's
    /// type. Returns nothing if that direction is not navigable.
    pub fn load_related_objects(
        &self,
        ctx: &PersistenceFacade,
        proxy: &PersistentObjectProxy,
        other_role: &str,
        depth: BuildDepth,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
        opts: &LoadOptions,
    ) -> Result<Vec<ObjectRef>> {
        let inverse = self.inverse_relation(other_role)?;
        if !inverse.this_end.navigable || !opts.includes_type(&self.ty) {
            return Ok(Vec::new());
        }
        let attribs = opts.attributes_for(&self.ty);
        let select = self.relation_select_sql(ctx, proxy, inverse, criteria, order, attribs)?;
        self.load_objects_from_sql(ctx, select, depth, paging, opts)
    }

    /// Ids of the objects of this type related to `proxy`.
    pub fn load_related_oids(
        &self,
        ctx: &PersistenceFacade,
        proxy: &PersistentObjectProxy,
        other_role: &str,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
    ) -> Result<Vec<ObjectId>> {
        let inverse = self.inverse_relation(other_role)?;
        if !inverse.this_end.navigable {
            return Ok(Vec::new());
        }
        let select = self.relation_select_sql(ctx, proxy, inverse, criteria, order, Some(&[]))?;
        self.load_oids_from_sql(select, paging)
    }

    /// Load the value of the relation `role` of `object`.
    ///
    /// With [`BuildDepth::ProxiesOnly`] only ids are loaded and wrapped in
    /// proxies. Single-valued roles yield [`RelationValue::One`].
    pub fn load_relation(
        &self,
        ctx: &PersistenceFacade,
        object: &ObjectRef,
        role: &str,
        depth: BuildDepth,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
        opts: &LoadOptions,
    ) -> Result<RelationValue> {
        let rel = self.ty.get_relation(role).ok_or_else(|| {
            Error::illegal_argument(format!("type '{}' has no relation '{}'", self.ty.name, role))
        })?;
        let oid = read_object(object).oid().clone();
        self.load_relation_value(ctx, &oid, rel, depth, criteria, order, paging, opts)
    }

    fn load_relation_value(
        &self,
        ctx: &PersistenceFacade,
        oid: &ObjectId,
        rel: &RelationDescription,
        depth: BuildDepth,
        criteria: &[Criteria],
        order: &[OrderBy],
        paging: Option<&mut PagingInfo>,
        opts: &LoadOptions,
    ) -> Result<RelationValue> {
        if !rel.is_navigable() || oid.is_dummy() {
            return Ok(RelationValue::empty(rel.is_multi_valued()));
        }
        let other = ctx.mapper(rel.other_type())?;
        let proxy = PersistentObjectProxy::new(oid.clone());
        let related: Vec<Related> = if depth == BuildDepth::ProxiesOnly {
            other
                .load_related_oids(ctx, &proxy, rel.this_role(), criteria, order, paging)?
                .into_iter()
                .map(|oid| Related::Proxy(oid.into()))
                .collect()
        } else {
            other
                .load_related_objects(ctx, &proxy, rel.this_role(), depth, criteria, order, paging, opts)?
                .into_iter()
                .map(Related::Object)
                .collect()
        };
        Ok(RelationValue::from_related(rel.is_multi_valued(), related))
    }

    fn inverse_relation(&self, other_role: &str) -> Result<&RelationDescription> {
        self.ty.get_relation(other_role).ok_or_else(|| {
            Error::illegal_argument(format!(
                "type '{}' has no relation '{}'",
                self.ty.name, other_role
            ))
        })
    }
}
