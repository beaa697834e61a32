use super::{non_empty, walk, Node};
use crate::error::TapResult;
use crate::model::{TapColumn, TapTable};

/// Parse a VOSI tableset into tables with their columns.
///
/// Works for both the full document (`tables`) and the reduced TAP+ variants
/// (`only_tables=true`, single table requests).
pub fn parse_tables(data: &[u8]) -> TapResult<Vec<TapTable>> {
    let mut tables = Vec::new();
    let mut schema = String::new();
    let mut table: Option<TapTable> = None;
    let mut column: Option<TapColumn> = None;

    walk(data, |node| {
        match node {
            Node::Open { name, attrs } => match name {
                "schema" => schema.clear(),
                "table" => {
                    table = Some(TapTable {
                        schema: schema.clone(),
                        size_bytes: attrs.get("size_bytes").and_then(|v| v.trim().parse().ok()),
                        ..Default::default()
                    });
                }
                "column" => {
                    column = Some(TapColumn {
                        flags: attrs.get("flags").and_then(|v| v.trim().parse().ok()),
                        ..Default::default()
                    });
                }
                "dataType" => {
                    if let Some(col) = column.as_mut() {
                        col.arraysize = attrs.owned("arraysize").or_else(|| attrs.owned("size"));
                    }
                }
                _ => {}
            },
            Node::Close { name, text } => {
                if let Some(col) = column.as_mut() {
                    match name {
                        "name" => col.name = text.to_string(),
                        "description" => col.description = non_empty(text),
                        "unit" => col.unit = non_empty(text),
                        "ucd" => col.ucd = non_empty(text),
                        "utype" => col.utype = non_empty(text),
                        "dataType" => col.data_type = non_empty(text),
                        "flag" => {
                            if let Some(flag) = non_empty(text) {
                                col.flag.push(flag);
                            }
                        }
                        "column" => {
                            if let (Some(done), Some(t)) = (column.take(), table.as_mut()) {
                                t.columns.push(done);
                            }
                        }
                        _ => {}
                    }
                } else if let Some(t) = table.as_mut() {
                    match name {
                        "name" => t.name = text.to_string(),
                        "description" => t.description = non_empty(text),
                        "table" => {
                            if let Some(done) = table.take() {
                                tables.push(done);
                            }
                        }
                        _ => {}
                    }
                } else if name == "name" {
                    schema = text.to_string();
                }
            }
        }
        Ok(())
    })?;

    Ok(tables)
}
