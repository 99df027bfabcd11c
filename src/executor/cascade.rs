//! Cascading deletes
//!
//! Deleting a row walks the tables that reference it depth-first. CASCADE
//! edges delete the children (and their children); a RESTRICT edge with any
//! surviving child aborts the whole statement. Cascaded rows do not fire
//! triggers.

use tracing::trace;

use crate::catalog::{Catalog, ReferentialAction, TableDef};
use crate::error::{Error, Result};
use crate::storage::{RowKey, Value};

use super::workspace::Workspace;

/// Delete a row and everything that cascades from it
///
/// Returns the number of rows removed. Rows already gone are skipped, so
/// a child reachable along two paths is deleted once.
pub fn delete_row(
    catalog: &Catalog,
    ws: &mut Workspace,
    def: &TableDef,
    key: &RowKey,
) -> Result<usize> {
    let mut path = Vec::new();
    delete_recursive(catalog, ws, def, key, &mut path)
}

fn delete_recursive(
    catalog: &Catalog,
    ws: &mut Workspace,
    def: &TableDef,
    key: &RowKey,
    path: &mut Vec<(String, RowKey)>,
) -> Result<usize> {
    let Some(row) = ws.get(&def.name, key).cloned() else {
        return Ok(0);
    };
    path.push((def.name.clone(), key.clone()));

    let mut removed = 0;
    for edge in catalog.referencing(&def.name) {
        let fk = edge.foreign_key();
        let parent_values = row.project(&def.column_indices(&fk.ref_columns)?).into_values();
        if parent_values.iter().any(Value::is_null) {
            continue;
        }
        let child_columns = edge.table.column_indices(&fk.columns)?;
        // a row pointing at itself goes with the row
        let children: Vec<RowKey> = ws
            .lookup_eq(&edge.table.name, &child_columns, &parent_values)
            .into_iter()
            .filter(|child| edge.table.name != def.name || child != key)
            .collect();
        if children.is_empty() {
            continue;
        }

        match fk.on_delete {
            ReferentialAction::Restrict => {
                return Err(Error::ForeignKeyViolation {
                    table: edge.table.name.clone(),
                    detail: format!(
                        "{} row(s) reference {} in '{}' through '{}'",
                        children.len(),
                        key,
                        def.name,
                        fk.name
                    ),
                });
            }
            ReferentialAction::Cascade => {
                for child in children {
                    if path.iter().any(|(t, k)| *t == edge.table.name && *k == child) {
                        return Err(Error::CascadeCycle {
                            table: edge.table.name.clone(),
                            key: child.to_string(),
                        });
                    }
                    trace!(table = %edge.table.name, key = %child, via = %fk.name, "cascading delete");
                    removed += delete_recursive(catalog, ws, &edge.table, &child, path)?;
                }
            }
        }
    }

    path.pop();
    ws.remove(&def.name, key);
    Ok(removed + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, ForeignKey, TableBuilder};
    use crate::storage::{DatabaseState, Tuple};
    use std::sync::Arc;

    fn int(v: i64) -> Value {
        Value::Integer(v)
    }

    fn setup(comment_action: ReferentialAction) -> (Catalog, Workspace) {
        let catalog = Catalog::new();
        catalog
            .define_table(
                TableBuilder::new("users")
                    .column(Column::new("id", DataType::Integer))
                    .primary_key(["id"])
                    .build(),
            )
            .unwrap();
        catalog
            .define_table(
                TableBuilder::new("posts")
                    .column(Column::new("id", DataType::Integer))
                    .column(Column::new("user_id", DataType::Integer))
                    .primary_key(["id"])
                    .foreign_key(ForeignKey::new("fk_posts_user", "user_id", "users", "id").on_delete_cascade())
                    .build(),
            )
            .unwrap();
        let mut fk = ForeignKey::new("fk_comments_post", "post_id", "posts", "id");
        fk.on_delete = comment_action;
        catalog
            .define_table(
                TableBuilder::new("comments")
                    .column(Column::new("id", DataType::Integer))
                    .column(Column::new("post_id", DataType::Integer))
                    .primary_key(["id"])
                    .foreign_key(fk)
                    .build(),
            )
            .unwrap();

        let mut state = DatabaseState::new();
        for t in ["users", "posts", "comments"] {
            state.add_table(t);
        }
        let mut ws = Workspace::new(Arc::new(state));
        ws.put("users", RowKey::single(1i64), Tuple::new(vec![int(1)]));
        ws.put("users", RowKey::single(2i64), Tuple::new(vec![int(2)]));
        ws.put("posts", RowKey::single(10i64), Tuple::new(vec![int(10), int(1)]));
        ws.put("posts", RowKey::single(11i64), Tuple::new(vec![int(11), int(1)]));
        ws.put("posts", RowKey::single(12i64), Tuple::new(vec![int(12), int(2)]));
        ws.put("comments", RowKey::single(100i64), Tuple::new(vec![int(100), int(10)]));
        (catalog, ws)
    }

    #[test]
    fn test_cascade_reaches_grandchildren() {
        let (catalog, mut ws) = setup(ReferentialAction::Cascade);
        let users = catalog.get_table("users").unwrap();

        let removed = delete_row(&catalog, &mut ws, &users, &RowKey::single(1i64)).unwrap();
        assert_eq!(removed, 4);
        assert_eq!(ws.row_count("posts"), 1);
        assert_eq!(ws.row_count("comments"), 0);
        assert!(ws.contains("users", &RowKey::single(2i64)));
    }

    #[test]
    fn test_restrict_blocks_and_leaves_rows() {
        let (catalog, ws) = setup(ReferentialAction::Restrict);
        let users = catalog.get_table("users").unwrap();

        let mut scratch = ws.clone();
        let err = delete_row(&catalog, &mut scratch, &users, &RowKey::single(1i64)).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation { ref table, .. } if table == "comments"));

        // an unreferenced parent still deletes
        let mut ws = ws;
        assert_eq!(
            delete_row(&catalog, &mut ws, &users, &RowKey::single(2i64)).unwrap(),
            2
        );
    }

    #[test]
    fn test_missing_row_is_noop() {
        let (catalog, mut ws) = setup(ReferentialAction::Cascade);
        let users = catalog.get_table("users").unwrap();
        assert_eq!(
            delete_row(&catalog, &mut ws, &users, &RowKey::single(99i64)).unwrap(),
            0
        );
    }

    #[test]
    fn test_self_reference_cycle() {
        let catalog = Catalog::new();
        let nodes = catalog
            .define_table(
                TableBuilder::new("nodes")
                    .column(Column::new("id", DataType::Integer))
                    .column(Column::new("parent", DataType::Integer))
                    .primary_key(["id"])
                    .foreign_key(ForeignKey::new("fk_parent", "parent", "nodes", "id").on_delete_cascade())
                    .build(),
            )
            .unwrap();
        let mut state = DatabaseState::new();
        state.add_table("nodes");
        let mut ws = Workspace::new(Arc::new(state));
        ws.put("nodes", RowKey::single(1i64), Tuple::new(vec![int(1), int(2)]));
        ws.put("nodes", RowKey::single(2i64), Tuple::new(vec![int(2), int(1)]));

        assert!(matches!(
            delete_row(&catalog, &mut ws, &nodes, &RowKey::single(1i64)),
            Err(Error::CascadeCycle { .. })
        ));
    }

    #[test]
    fn test_row_referencing_itself_deletes() {
        for action in [ReferentialAction::Cascade, ReferentialAction::Restrict] {
            let catalog = Catalog::new();
            let mut fk = ForeignKey::new("fk_parent", "parent", "nodes", "id");
            fk.on_delete = action;
            let nodes = catalog
                .define_table(
                    TableBuilder::new("nodes")
                        .column(Column::new("id", DataType::Integer))
                        .column(Column::new("parent", DataType::Integer))
                        .primary_key(["id"])
                        .foreign_key(fk)
                        .build(),
                )
                .unwrap();
            let mut state = DatabaseState::new();
            state.add_table("nodes");
            let mut ws = Workspace::new(Arc::new(state));
            ws.put("nodes", RowKey::single(1i64), Tuple::new(vec![int(1), int(1)]));
            ws.put("nodes", RowKey::single(2i64), Tuple::new(vec![int(2), Value::Null]));

            assert_eq!(
                delete_row(&catalog, &mut ws, &nodes, &RowKey::single(1i64)).unwrap(),
                1
            );
            assert_eq!(ws.row_count("nodes"), 1);
        }
    }
}
