//! NPY (format version 1.0) codec for `f64` arrays.
//!
//! Writes little-endian `<f8` C-order arrays. Reads `<f8`, `<f4`, `<i8`,
//! `<i4` and `|b1` payloads in either memory order and widens to `f64`.

use std::io::{Read, Write};

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::{Error, Result};

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

fn header_dict(shape: &[usize]) -> String {
    let dims = match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        ),
    };
    format!("{{'descr': '<f8', 'fortran_order': False, 'shape': {dims}, }}")
}

/// Serialise an array in NPY format.
///
/// # Errors
///
/// Returns an IO error if writing fails.
pub fn write_npy<W: Write>(mut writer: W, array: &ArrayD<f64>) -> Result<()> {
    let mut header = header_dict(array.shape());
    // magic (6) + version (2) + header length (2) + header + '\n'
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');
    let header_len = u16::try_from(header.len())
        .map_err(|_| Error::InvalidInput("NPY header too long".to_string()))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    for value in array.as_standard_layout().iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let pattern = format!("'{key}':");
    let start = header
        .find(&pattern)
        .map(|i| i + pattern.len())
        .ok_or_else(|| Error::InvalidInput(format!("NPY header is missing '{key}'")))?;
    Ok(header[start..].trim_start())
}

fn parse_shape(header: &str) -> Result<Vec<usize>> {
    let rest = header_value(header, "shape")?;
    let end = rest
        .find(')')
        .ok_or_else(|| Error::InvalidInput("Malformed NPY shape".to_string()))?;
    rest[1..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("Malformed NPY dimension '{s}'")))
        })
        .collect()
}

fn parse_descr(header: &str) -> Result<String> {
    let rest = header_value(header, "descr")?;
    let quote = rest
        .chars()
        .next()
        .ok_or_else(|| Error::InvalidInput("Malformed NPY descr".to_string()))?;
    let body = &rest[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| Error::InvalidInput("Malformed NPY descr".to_string()))?;
    Ok(body[..end].to_string())
}

fn decode_values(descr: &str, payload: &[u8], count: usize) -> Result<Vec<f64>> {
    fn chunks<const N: usize>(payload: &[u8], count: usize) -> Result<Vec<[u8; N]>> {
        if payload.len() < count * N {
            return Err(Error::InvalidInput("Truncated NPY payload".to_string()));
        }
        Ok(payload
            .chunks_exact(N)
            .take(count)
            .map(|c| {
                let mut buf = [0u8; N];
                buf.copy_from_slice(c);
                buf
            })
            .collect())
    }
    #[allow(clippy::cast_precision_loss)]
    let values = match descr {
        "<f8" => chunks::<8>(payload, count)?.into_iter().map(f64::from_le_bytes).collect(),
        "<f4" => chunks::<4>(payload, count)?
            .into_iter()
            .map(|b| f64::from(f32::from_le_bytes(b)))
            .collect(),
        "<i8" => chunks::<8>(payload, count)?
            .into_iter()
            .map(|b| i64::from_le_bytes(b) as f64)
            .collect(),
        "<i4" => chunks::<4>(payload, count)?
            .into_iter()
            .map(|b| f64::from(i32::from_le_bytes(b)))
            .collect(),
        "|b1" => chunks::<1>(payload, count)?
            .into_iter()
            .map(|b| f64::from(b[0]))
            .collect(),
        other => {
            return Err(Error::UnsupportedArtifact(format!(
                "NPY dtype '{other}' is not supported"
            )))
        }
    };
    Ok(values)
}

/// Deserialise an NPY payload into an `f64` array.
///
/// # Errors
///
/// Returns `InvalidInput` for malformed headers or truncated payloads and
/// `UnsupportedArtifact` for dtypes other than the supported numeric ones.
pub fn read_npy<R: Read>(mut reader: R) -> Result<ArrayD<f64>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if !bytes.starts_with(MAGIC) || bytes.len() < MAGIC.len() + 4 {
        return Err(Error::InvalidInput("Not an NPY file".to_string()));
    }
    let major = bytes[MAGIC.len()];
    let (header_len, header_start) = if major == 1 {
        let len = u16::from_le_bytes([bytes[8], bytes[9]]);
        (usize::from(len), 10)
    } else {
        if bytes.len() < 12 {
            return Err(Error::InvalidInput("Truncated NPY header".to_string()));
        }
        let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        (
            usize::try_from(len)
                .map_err(|_| Error::InvalidInput("NPY header too long".to_string()))?,
            12,
        )
    };
    let header_end = header_start + header_len;
    let header = bytes
        .get(header_start..header_end)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| Error::InvalidInput("Malformed NPY header".to_string()))?;

    let shape = parse_shape(header)?;
    let descr = parse_descr(header)?;
    let fortran = header_value(header, "fortran_order")?.starts_with("True");
    let count = shape.iter().product();
    let values = decode_values(&descr, &bytes[header_end..], count)?;

    let dims = IxDyn(&shape);
    let array = if fortran {
        ArrayD::from_shape_vec(dims.f(), values)
    } else {
        ArrayD::from_shape_vec(dims, values)
    };
    array.map_err(|e| Error::InvalidInput(format!("NPY shape mismatch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_header_is_aligned() {
        let mut buf = Vec::new();
        write_npy(&mut buf, &array![[1.0, 2.0], [3.0, 4.0]].into_dyn()).unwrap();
        let header_len = usize::from(u16::from_le_bytes([buf[8], buf[9]]));
        assert_eq!((10 + header_len) % HEADER_ALIGN, 0);
        assert_eq!(buf.len(), 10 + header_len + 4 * 8);
    }

    #[test]
    fn test_round_trip_preserves_shape_and_values() {
        let original = array![[1.5, -2.0, 3.25], [0.0, f64::MAX, 7.0]].into_dyn();
        let mut buf = Vec::new();
        write_npy(&mut buf, &original).unwrap();
        assert_eq!(read_npy(buf.as_slice()).unwrap(), original);
    }

    #[test]
    fn test_one_dimensional_shape_syntax() {
        assert!(header_dict(&[3]).contains("'shape': (3,)"));
        assert!(header_dict(&[]).contains("'shape': ()"));
    }

    #[test]
    fn test_reads_int32_fortran_order() {
        let header = "{'descr': '<i4', 'fortran_order': True, 'shape': (2, 2), }\n";
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&u16::try_from(header.len()).unwrap().to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        for v in [1i32, 3, 2, 4] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let array = read_npy(bytes.as_slice()).unwrap();
        assert_eq!(array, array![[1.0, 2.0], [3.0, 4.0]].into_dyn());
    }

    #[test]
    fn test_rejects_non_npy() {
        assert!(read_npy(&b"hello world"[..]).is_err());
    }
}
