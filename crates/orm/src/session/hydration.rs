//! Moving values between entity instances and rows

use std::any::Any;

use crate::backends::{DatabaseRow, DatabaseValue};
use crate::error::{OrmError, OrmResult};
use crate::metadata::{AnyRef, ColumnMetadata, EntityMetadata, EntityRegistry, RelationshipMetadata};

/// Column values read from one instance, ready for INSERT or UPDATE
#[derive(Debug)]
pub(crate) struct EntityState {
    pub key: DatabaseValue,
    /// Non-key basic columns in mapping order
    pub columns: Vec<(String, DatabaseValue)>,
    /// Join columns of owning relationships
    pub joins: Vec<(String, DatabaseValue)>,
}

/// Snapshot the persistent state of an instance
pub(crate) fn read_state(
    meta: &EntityMetadata,
    registry: &EntityRegistry,
    instance: &AnyRef,
) -> OrmResult<EntityState> {
    let mut key = DatabaseValue::Null;
    let mut columns = Vec::new();
    let mut related: Vec<(&RelationshipMetadata, Option<AnyRef>)> = Vec::new();

    meta.ops().with_read(instance, &mut |any: &dyn Any| {
        key = meta.primary_key().get(any)?;
        for column in meta.non_key_columns() {
            columns.push((column.name().to_string(), column.get(any)?));
        }
        for relationship in meta.owning_relationships() {
            related.push((relationship, relationship.get(any)?));
        }
        Ok(())
    })?;

    // related instances are read after the owner's lock is released, so a
    // self-reference never locks the same instance twice
    let mut joins = Vec::with_capacity(related.len());
    for (relationship, target) in related {
        let Some(join_column) = relationship.join_column() else {
            continue;
        };
        let value = match target {
            Some(target) => related_key(registry, relationship, &target)?,
            None => DatabaseValue::Null,
        };
        joins.push((join_column.to_string(), value));
    }

    Ok(EntityState { key, columns, joins })
}

/// Value of the referenced column on a related instance
pub(crate) fn related_key(
    registry: &EntityRegistry,
    relationship: &RelationshipMetadata,
    target: &AnyRef,
) -> OrmResult<DatabaseValue> {
    let target_meta = registry.require(relationship.target(), relationship.target_name())?;
    let column = referenced_column(target_meta, relationship)?;
    let mut value = DatabaseValue::Null;
    target_meta.ops().with_read(target, &mut |any: &dyn Any| {
        value = column.get(any)?;
        Ok(())
    })?;
    Ok(value)
}

fn referenced_column<'m>(
    target: &'m EntityMetadata,
    relationship: &RelationshipMetadata,
) -> OrmResult<&'m ColumnMetadata> {
    let wanted = relationship.referenced_column();
    if target.primary_key().name().eq_ignore_ascii_case(wanted) {
        return Ok(target.primary_key());
    }
    target
        .columns()
        .iter()
        .find(|column| column.name().eq_ignore_ascii_case(wanted))
        .or_else(|| (wanted == "id").then(|| target.primary_key()))
        .ok_or_else(|| {
            OrmError::mapping(
                target.entity_name(),
                format!(
                    "relationship `{}` references unknown column `{}`",
                    relationship.field(),
                    wanted
                ),
            )
        })
}

pub(crate) fn read_key(meta: &EntityMetadata, instance: &AnyRef) -> OrmResult<DatabaseValue> {
    let mut key = DatabaseValue::Null;
    meta.ops().with_read(instance, &mut |any: &dyn Any| {
        key = meta.primary_key().get(any)?;
        Ok(())
    })?;
    Ok(key)
}

pub(crate) fn write_key(meta: &EntityMetadata, instance: &AnyRef, value: DatabaseValue) -> OrmResult<()> {
    let mut value = Some(value);
    meta.ops().with_write(instance, &mut |any: &mut dyn Any| {
        match value.take() {
            Some(value) => meta.primary_key().set(any, value),
            None => Ok(()),
        }
    })
}

/// Store a resolved relationship target into an instance
pub(crate) fn write_relationship(
    meta: &EntityMetadata,
    relationship: &RelationshipMetadata,
    instance: &AnyRef,
    target: AnyRef,
) -> OrmResult<()> {
    let mut target = Some(target);
    meta.ops().with_write(instance, &mut |any: &mut dyn Any| {
        relationship.set(any, target.take())
    })
}

/// Fresh instance populated from a row's basic columns
///
/// Columns absent from the row and NULL values leave the field at its
/// default; relationships are resolved by the caller.
pub(crate) fn instantiate(meta: &EntityMetadata, row: &DatabaseRow) -> OrmResult<AnyRef> {
    let mut instance = meta.ops().instantiate();
    for column in meta.columns() {
        match row.get_by_name(column.name()) {
            Some(value) if !value.is_null() => {
                column.set(instance.as_mut(), value.clone())?;
            }
            _ => {}
        }
    }
    meta.ops().share(instance)
}
