//! Sampled content digest for evaluation datasets.
//!
//! Hashing every row of a large table is wasteful, so the digest mixes the row
//! count plus the first and last [`NUM_SAMPLE_ROWS_FOR_HASH`] rows. Tables
//! smaller than twice that are hashed in full.

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use sha2::{Digest, Sha256};

use super::labels::canonical_array;
use crate::Result;

/// Rows sampled from each end of a table when hashing.
pub const NUM_SAMPLE_ROWS_FOR_HASH: usize = 5;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_UINT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_OTHER: u8 = 6;

/// Row positions that take part in the digest.
fn sampled_rows(num_rows: usize) -> impl Iterator<Item = usize> {
    let (head, tail_start) = if num_rows < 2 * NUM_SAMPLE_ROWS_FOR_HASH {
        (num_rows, num_rows)
    } else {
        (
            NUM_SAMPLE_ROWS_FOR_HASH,
            num_rows - NUM_SAMPLE_ROWS_FOR_HASH,
        )
    };
    (0..head).chain(tail_start.max(head)..num_rows)
}

fn update_bytes(hasher: &mut Sha256, tag: u8, bytes: &[u8]) {
    hasher.update([tag]);
    hasher.update(bytes);
}

fn update_cell(hasher: &mut Sha256, array: &dyn Array, row: usize) -> Result<()> {
    if array.is_null(row) {
        hasher.update([TAG_NULL]);
        return Ok(());
    }
    match array.data_type() {
        DataType::Boolean => {
            update_bytes(hasher, TAG_BOOL, &[u8::from(array.as_boolean().value(row))]);
        }
        DataType::Int64 => update_bytes(
            hasher,
            TAG_INT,
            &array.as_primitive::<Int64Type>().value(row).to_le_bytes(),
        ),
        DataType::UInt64 => update_bytes(
            hasher,
            TAG_UINT,
            &array.as_primitive::<UInt64Type>().value(row).to_le_bytes(),
        ),
        DataType::Float64 => update_bytes(
            hasher,
            TAG_FLOAT,
            &array.as_primitive::<Float64Type>().value(row).to_le_bytes(),
        ),
        DataType::Utf8 => {
            let value = array.as_string::<i32>().value(row);
            hasher.update([TAG_STR]);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
            let value = formatter.value(row).to_string();
            hasher.update([TAG_OTHER]);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
    }
    Ok(())
}

/// Mix a table (given as equally long columns) into the digest.
///
/// # Errors
///
/// Returns an error if a column cannot be brought into canonical form.
pub fn update_with_columns(hasher: &mut Sha256, columns: &[ArrayRef]) -> Result<()> {
    let num_rows = columns.first().map_or(0, |c| c.len());
    hasher.update((num_rows as u64).to_le_bytes());
    let canonical = columns
        .iter()
        .map(canonical_array)
        .collect::<Result<Vec<_>>>()?;
    for row in sampled_rows(num_rows) {
        for column in &canonical {
            update_cell(hasher, column.as_ref(), row)?;
        }
    }
    Ok(())
}

/// Hex-encode a finished digest.
#[must_use]
pub fn finish_hex(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Digest of a single column.
///
/// # Errors
///
/// Returns an error if the column cannot be brought into canonical form.
pub fn digest_array(array: &ArrayRef) -> Result<String> {
    let mut hasher = Sha256::new();
    update_with_columns(&mut hasher, std::slice::from_ref(array))?;
    Ok(finish_hex(hasher))
}
