//! Foreign-key relationship discovery and drop-order sorting.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dialect::DatabaseType;

use super::table::DiscoveredTable;
use super::DiscoveryError;

/// A foreign-key relationship between a primary-key table and the table
/// referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRelationship {
    pub name: String,
    pub pk_table: String,
    pub fk_table: String,
    /// Pairs of (primary-key column, foreign-key column).
    pub column_pairs: Vec<(String, String)>,
    pub cascade_delete: bool,
}

/// Relationships where `table` is the primary-key side (i.e. the tables
/// pointing at it).
pub(crate) fn discover_relationships_for(
    table: &DiscoveredTable,
) -> Result<Vec<DiscoveredRelationship>, DiscoveryError> {
    match table.database_type() {
        DatabaseType::Sqlite => discover_sqlite(table),
        DatabaseType::Oracle => discover_oracle(table),
        _ => discover_information_schema(table),
    }
}

/// MsSql, MySql and PostgreSql all expose REFERENTIAL_CONSTRAINTS +
/// KEY_COLUMN_USAGE; only the qualification differs.
fn discover_information_schema(
    table: &DiscoveredTable,
) -> Result<Vec<DiscoveredRelationship>, DiscoveryError> {
    let database = table.database_type();
    let dialect = crate::dialect::registry::get(database)?;
    let syntax = dialect.syntax_helper();
    let name_literal = syntax.quote_string(table.name());

    // prefix for engines that qualify information_schema per database
    let prefix = match database {
        DatabaseType::MsSql => format!("{}.", syntax.ensure_wrapped(table.database().name())),
        _ => String::new(),
    };
    let schema_filter = match database {
        DatabaseType::MySql => format!(
            " AND kcu2.TABLE_SCHEMA = {}",
            syntax.quote_string(table.database().name())
        ),
        _ => String::new(),
    };

    let sql = format!(
        "SELECT rc.CONSTRAINT_NAME, kcu2.TABLE_NAME, kcu1.TABLE_NAME, \
         kcu2.COLUMN_NAME, kcu1.COLUMN_NAME, rc.DELETE_RULE \
         FROM {prefix}INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
         JOIN {prefix}INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu1 \
         ON kcu1.CONSTRAINT_NAME = rc.CONSTRAINT_NAME \
         JOIN {prefix}INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu2 \
         ON kcu2.CONSTRAINT_NAME = rc.UNIQUE_CONSTRAINT_NAME \
         AND kcu2.ORDINAL_POSITION = kcu1.ORDINAL_POSITION \
         WHERE kcu2.TABLE_NAME = {name_literal}{schema_filter} \
         ORDER BY rc.CONSTRAINT_NAME, kcu1.ORDINAL_POSITION"
    );

    let mut connection = table.database().get_managed_connection(None)?;
    let result = connection.query(&sql)?;

    let mut by_constraint: HashMap<String, DiscoveredRelationship> = HashMap::new();
    for row in &result.rows {
        let text = |i: usize| {
            row.get(i)
                .filter(|v| !v.is_null())
                .map(|v| v.to_display_string())
        };
        let (Some(constraint), Some(pk_table), Some(fk_table), Some(pk_col), Some(fk_col)) =
            (text(0), text(1), text(2), text(3), text(4))
        else {
            continue;
        };
        let cascade = text(5)
            .map(|r| r.eq_ignore_ascii_case("CASCADE"))
            .unwrap_or(false);
        by_constraint
            .entry(constraint.clone())
            .or_insert_with(|| DiscoveredRelationship {
                name: constraint,
                pk_table,
                fk_table,
                column_pairs: Vec::new(),
                cascade_delete: cascade,
            })
            .column_pairs
            .push((pk_col, fk_col));
    }
    Ok(by_constraint.into_values().collect())
}

fn discover_oracle(
    table: &DiscoveredTable,
) -> Result<Vec<DiscoveredRelationship>, DiscoveryError> {
    let dialect = crate::dialect::registry::get(DatabaseType::Oracle)?;
    let syntax = dialect.syntax_helper();
    let owner_literal = syntax.quote_string(table.database().name());
    let name_literal = syntax.quote_string(table.name());

    let sql = format!(
        "SELECT child.constraint_name, parent.table_name, child.table_name, \
         pcol.column_name, ccol.column_name, child.delete_rule \
         FROM all_constraints child \
         JOIN all_constraints parent ON parent.constraint_name = child.r_constraint_name \
         AND parent.owner = child.r_owner \
         JOIN all_cons_columns ccol ON ccol.constraint_name = child.constraint_name \
         AND ccol.owner = child.owner \
         JOIN all_cons_columns pcol ON pcol.constraint_name = parent.constraint_name \
         AND pcol.owner = parent.owner AND pcol.position = ccol.position \
         WHERE child.constraint_type = 'R' \
         AND parent.owner = UPPER({owner_literal}) \
         AND parent.table_name = UPPER({name_literal}) \
         ORDER BY child.constraint_name, ccol.position"
    );

    let mut connection = table.database().get_managed_connection(None)?;
    let result = connection.query(&sql)?;

    let mut by_constraint: HashMap<String, DiscoveredRelationship> = HashMap::new();
    for row in &result.rows {
        let text = |i: usize| {
            row.get(i)
                .filter(|v| !v.is_null())
                .map(|v| v.to_display_string())
        };
        let (Some(constraint), Some(pk_table), Some(fk_table), Some(pk_col), Some(fk_col)) =
            (text(0), text(1), text(2), text(3), text(4))
        else {
            continue;
        };
        let cascade = text(5)
            .map(|r| r.eq_ignore_ascii_case("CASCADE"))
            .unwrap_or(false);
        by_constraint
            .entry(constraint.clone())
            .or_insert_with(|| DiscoveredRelationship {
                name: constraint,
                pk_table,
                fk_table,
                column_pairs: Vec::new(),
                cascade_delete: cascade,
            })
            .column_pairs
            .push((pk_col, fk_col));
    }
    Ok(by_constraint.into_values().collect())
}

/// Sqlite exposes foreign keys per child table only, so find the children by
/// walking every table's `PRAGMA foreign_key_list`.
fn discover_sqlite(
    table: &DiscoveredTable,
) -> Result<Vec<DiscoveredRelationship>, DiscoveryError> {
    let dialect = crate::dialect::registry::get(DatabaseType::Sqlite)?;
    let syntax = dialect.syntax_helper();
    let mut relationships = Vec::new();

    for child in table.database().discover_tables(false, None)? {
        if child.name().eq_ignore_ascii_case(table.name()) {
            continue;
        }
        let sql = format!(
            "PRAGMA foreign_key_list({})",
            syntax.ensure_wrapped(child.name())
        );
        let mut connection = table.database().get_managed_connection(None)?;
        let result = connection.query(&sql)?;
        let (Some(id_idx), Some(target_idx), Some(from_idx), Some(to_idx)) = (
            result.column_index("id"),
            result.column_index("table"),
            result.column_index("from"),
            result.column_index("to"),
        ) else {
            continue;
        };
        let delete_idx = result.column_index("on_delete");

        let mut by_id: HashMap<i64, DiscoveredRelationship> = HashMap::new();
        for row in &result.rows {
            let target = row
                .get(target_idx)
                .map(|v| v.to_display_string())
                .unwrap_or_default();
            if !target.eq_ignore_ascii_case(table.name()) {
                continue;
            }
            let id = row.get(id_idx).and_then(|v| v.as_i64()).unwrap_or(0);
            let from = row
                .get(from_idx)
                .map(|v| v.to_display_string())
                .unwrap_or_default();
            let to = row
                .get(to_idx)
                .map(|v| v.to_display_string())
                .unwrap_or_default();
            let cascade = delete_idx
                .and_then(|i| row.get(i))
                .map(|v| v.to_display_string().eq_ignore_ascii_case("CASCADE"))
                .unwrap_or(false);
            by_id
                .entry(id)
                .or_insert_with(|| DiscoveredRelationship {
                    name: format!("{}_{}_{}", child.name(), table.name(), id),
                    pk_table: table.name().to_string(),
                    fk_table: child.name().to_string(),
                    column_pairs: Vec::new(),
                    cascade_delete: cascade,
                })
                .column_pairs
                .push((to, from));
        }
        relationships.extend(by_id.into_values());
    }
    Ok(relationships)
}

/// Order tables so each can be dropped before anything it references:
/// children first, parents last. Fails with the offending table when the
/// foreign keys form a cycle.
pub fn relationship_topological_sort(
    tables: &[String],
    relationships: &[DiscoveredRelationship],
) -> Result<Vec<String>, DiscoveryError> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
    for table in tables {
        let key = table.to_lowercase();
        let index = graph.add_node(table.clone());
        nodes.insert(key, index);
    }
    for relationship in relationships {
        let (Some(&parent), Some(&child)) = (
            nodes.get(&relationship.pk_table.to_lowercase()),
            nodes.get(&relationship.fk_table.to_lowercase()),
        ) else {
            continue;
        };
        if parent != child {
            graph.add_edge(parent, child, ());
        }
    }
    match toposort(&graph, None) {
        Ok(order) => {
            // parents come first in the sort; dropping wants children first
            Ok(order
                .into_iter()
                .rev()
                .map(|index| graph[index].clone())
                .collect())
        }
        Err(cycle) => Err(DiscoveryError::CircularDependency(
            graph[cycle.node_id()].clone(),
        )),
    }
}
