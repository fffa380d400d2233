//! LanceDB connection and table helpers.

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{connect, Connection};
use std::sync::Arc;

use ragkit_core::error::{Error, Result};

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(Error::store)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await.map_err(Error::store)?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await.map_err(Error::store)?;
    Ok(())
}

/// Quote ids for a SQL `IN (...)` predicate.
pub fn id_predicate(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect();
    format!("id IN ({})", quoted.join(", "))
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::store(format!("column '{name}' missing or not utf8")))
}

pub fn f32_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a Float32Array> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Float32Array>())
}

pub fn vector_at(batch: &RecordBatch, row: usize) -> Result<Option<Vec<f32>>> {
    let list = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| Error::store("column 'vector' missing"))?;
    if list.is_null(row) { return Ok(None); }
    let values = list.value(row);
    let floats = values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| Error::store("vector items are not float32"))?;
    Ok(Some(floats.values().to_vec()))
}
