use anyhow::{anyhow, Result};
use clap::Args;
use sdssdb::observatory::{definition, SchemaDefinition, TableDefinition, SCHEMAS};
use sdssdb::OutputFormat;
use serde::Serialize;
use tabled::Tabled;

use super::print_json;

/// Arguments for the Schema command
#[derive(Args)]
pub struct SchemaArgs {
    /// Schema name, e.g. "platedb"; lists all schemas when omitted
    pub name: Option<String>,

    /// Show the relationships of one table
    #[clap(short, long)]
    pub table: Option<String>,
}

#[derive(Serialize, Tabled)]
struct SchemaRow {
    schema: String,
    tables: usize,
}

#[derive(Serialize, Tabled)]
struct TableRow {
    table: String,
    primary_key: String,
    foreign_keys: usize,
    links: usize,
}

#[derive(Serialize, Tabled)]
struct RelationRow {
    kind: String,
    column: String,
    target: String,
}

pub fn run(args: SchemaArgs, output_format: OutputFormat) -> Result<()> {
    let SchemaArgs { name, table } = args;

    let Some(name) = name else {
        let rows: Vec<SchemaRow> = SCHEMAS
            .iter()
            .map(|s| SchemaRow {
                schema: s.name.to_string(),
                tables: s.tables.len(),
            })
            .collect();
        return render(rows, output_format);
    };

    let schema = definition(&name).ok_or_else(|| {
        let known: Vec<&str> = SCHEMAS.iter().map(|s| s.name).collect();
        anyhow!("Unknown schema '{}'. Known schemas: {}", name, known.join(", "))
    })?;

    match table {
        Some(table) => {
            let definition = schema
                .table(&table)
                .ok_or_else(|| anyhow!("Schema '{}' has no table '{}'", schema.name, table))?;
            render(relations(schema, definition), output_format)
        }
        None => {
            let rows: Vec<TableRow> = schema
                .tables
                .iter()
                .map(|t| TableRow {
                    table: t.name.to_string(),
                    primary_key: t.primary_key.join(", "),
                    foreign_keys: t.foreign_keys.len(),
                    links: t.links.len(),
                })
                .collect();
            render(rows, output_format)
        }
    }
}

fn relations(schema: &SchemaDefinition, table: &TableDefinition) -> Vec<RelationRow> {
    let mut rows: Vec<RelationRow> = table
        .foreign_keys
        .iter()
        .map(|fk| RelationRow {
            kind: "references".to_string(),
            column: fk.column.to_string(),
            target: fk.references.to_string(),
        })
        .collect();

    rows.extend(table.links.iter().map(|link| RelationRow {
        kind: "many-to-many".to_string(),
        column: link.name.to_string(),
        target: format!("{} via {}", link.target, link.through),
    }));

    let qualified = format!("{}.{}", schema.name, table.name);
    for other in SCHEMAS {
        rows.extend(
            other
                .references_to(&qualified)
                .into_iter()
                .map(|(source, fk)| RelationRow {
                    kind: "referenced by".to_string(),
                    column: fk.column.to_string(),
                    target: format!("{}.{}", other.name, source),
                }),
        );
    }

    rows
}

fn render<T: Serialize + Tabled>(rows: Vec<T>, output_format: OutputFormat) -> Result<()> {
    if output_format.is_table() {
        println!("{}", output_format.to_table(rows));
        Ok(())
    } else {
        print_json(&rows, output_format)
    }
}
