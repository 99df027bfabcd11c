//! Row-level triggers

use crate::catalog::{Catalog, TableDef, TriggerAction, TriggerDef, TriggerEvent, TriggerTiming};
use crate::error::{Error, Result};
use crate::storage::{Tuple, Value};

/// Value a trigger assigns when it fires at `now`
pub fn action_value(trigger: &TriggerDef, now: i64) -> Value {
    match &trigger.action {
        TriggerAction::Now => Value::Timestamp(now),
        TriggerAction::Literal(value) => value.clone(),
    }
}

/// Apply one trigger's assignment to a row image
pub fn apply(def: &TableDef, trigger: &TriggerDef, tuple: &mut Tuple, now: i64) -> Result<()> {
    let index = def
        .schema
        .get_column_index(&trigger.column)
        .ok_or_else(|| Error::UnknownColumn {
            column: trigger.column.clone(),
            table: def.name.clone(),
        })?;
    tuple.set(index, action_value(trigger, now));
    Ok(())
}

/// Run BEFORE triggers for `event` over the pending row, in declaration order
pub fn fire_before(
    catalog: &Catalog,
    def: &TableDef,
    event: TriggerEvent,
    tuple: &mut Tuple,
    now: i64,
) -> Result<()> {
    for trigger in catalog.triggers_for(&def.name, TriggerTiming::Before, event) {
        apply(def, &trigger, tuple, now)?;
    }
    Ok(())
}
