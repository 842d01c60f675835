//! Bulk export of raw hits

use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::{CsvField, SearchConfiguration};
use crate::template::scalar_to_string;

pub const KEY_NOT_FOUND: &str = "Key Not found";
pub const TYPE_ERROR: &str = "TypeError";

/// Value at the dotted `path` of `obj`, as text.
///
/// A list met on the way is mapped over: the next key is looked up in every
/// item and the results are joined with ", ".
pub fn nested_value(obj: &Value, path: &str) -> String {
    let mut current = obj.clone();
    for key in path.split('.') {
        current = match current {
            Value::Array(items) if !items.is_empty() => {
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    match item {
                        Value::Object(map) => match map.get(key) {
                            Some(v) => parts.push(scalar_to_string(v)),
                            None => return KEY_NOT_FOUND.to_string(),
                        },
                        _ => return TYPE_ERROR.to_string(),
                    }
                }
                Value::String(parts.join(", "))
            }
            Value::Object(mut map) => match map.remove(key) {
                Some(v) => v,
                None => return KEY_NOT_FOUND.to_string(),
            },
            Value::Array(_) => return KEY_NOT_FOUND.to_string(),
            _ => return TYPE_ERROR.to_string(),
        };
    }
    scalar_to_string(&current)
}

/// CSV columns of `search`: the record id first, then the configured fields
pub fn csv_columns(search: &SearchConfiguration) -> Vec<CsvField> {
    std::iter::once(CsvField {
        header: "ID".to_string(),
        field: search.search_id_field.clone(),
    })
    .chain(search.csv_fields.iter().cloned())
    .collect()
}

/// CSV document with one header row and one row per hit
pub fn csv_export(hits: &[Value], columns: &[CsvField]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(columns.iter().map(|c| c.header.as_str()))
        .context("Failed to write CSV header")?;
    for hit in hits {
        writer
            .write_record(columns.iter().map(|c| nested_value(hit, &c.field)))
            .context("Failed to write CSV row")?;
    }
    let bytes = writer.into_inner().context("Failed to finish CSV export")?;
    String::from_utf8(bytes).context("CSV export is not valid UTF-8")
}
