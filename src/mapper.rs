use crate::backend::QueryRow;
use crate::codec::decode_field;
use crate::error::{QueryError, Result};
use crate::schema::{Entity, TableDescriptor};
use serde_json::Value;

/// Build a `T` from one result row.
///
/// Descriptor fields with a column of the same name (case-sensitive) are
/// decoded; all other fields keep their `T::default()` values.
pub fn map_row<T: Entity>(row: &QueryRow) -> Result<T> {
    let table = T::table()?;
    map_with(&table, row)
}

/// Map every row, failing on the first value that cannot be decoded
pub fn map_rows<T: Entity>(rows: &[QueryRow]) -> Result<Vec<T>> {
    let table = T::table()?;
    rows.iter().map(|row| map_with(&table, row)).collect()
}

fn map_with<T: Entity>(table: &TableDescriptor, row: &QueryRow) -> Result<T> {
    let mut object = match serde_json::to_value(T::default())? {
        Value::Object(map) => map,
        other => {
            return Err(QueryError::Schema(format!(
                "{} did not serialize to an object: {}",
                table.name, other
            )))
        }
    };

    for field in &table.fields {
        if let Some(value) = row.get(&field.name) {
            object.insert(field.name.clone(), decode_field(field, value)?);
        }
    }

    Ok(serde_json::from_value(Value::Object(object))?)
}
