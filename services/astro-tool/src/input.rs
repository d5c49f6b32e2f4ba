//! Loading headers and raw cubes from disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use astro_common::{HeaderMap, ScalarBuffer, ScalarType, Volume, VolumeId};
use tracing::{debug, info};

/// Byte order of a raw data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Native,
    /// FITS on-disk order.
    BigEndian,
}

/// Read a header file.
///
/// `.json`, `.yaml` and `.yml` files hold a flat key/value map; any other
/// extension is read as FITS header cards (`KEY = value / comment`).
pub fn load_header(path: &Path) -> Result<HeaderMap> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading header {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let header = match ext.as_str() {
        "json" | "yaml" | "yml" => parse_header_map(&content)
            .with_context(|| format!("parsing header {}", path.display()))?,
        _ => parse_header_cards(&content),
    };
    debug!(path = %path.display(), keys = header.len(), "Loaded header");
    Ok(header)
}

/// Parse a flat JSON or YAML map. Numbers and booleans are accepted.
pub fn parse_header_map(content: &str) -> Result<HeaderMap> {
    let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(content)?;
    let mut header = HeaderMap::new();
    for (key, value) in raw {
        let text = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => String::from(if b { "T" } else { "F" }),
            serde_yaml::Value::Null => continue,
            other => bail!("header key {} has a non-scalar value: {:?}", key, other),
        };
        header.insert(key, text);
    }
    Ok(header)
}

/// Parse FITS header cards. Lines without `=` (COMMENT, HISTORY, END) are
/// skipped.
pub fn parse_header_cards(content: &str) -> HeaderMap {
    let mut header = HeaderMap::new();
    for line in content.lines() {
        let Some((key, rest)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(' ') {
            continue;
        }
        header.insert(key, card_value(rest));
    }
    header
}

fn card_value(rest: &str) -> &str {
    let rest = rest.trim_start();
    if let Some(quoted) = rest.strip_prefix('\'') {
        return quoted.split('\'').next().unwrap_or("").trim_end();
    }
    rest.split('/').next().unwrap_or("").trim()
}

/// Cube dimensions from `NAXISn`; missing axes count as 1.
pub fn header_dims(header: &HeaderMap) -> Result<[usize; 3]> {
    let mut dims = [1usize; 3];
    for (i, dim) in dims.iter_mut().enumerate() {
        if let Some(n) = header.get_i64(&format!("NAXIS{}", i + 1))? {
            if n <= 0 {
                bail!("NAXIS{} must be positive, got {}", i + 1, n);
            }
            *dim = n as usize;
        }
    }
    Ok(dims)
}

/// Scalar type from an explicit name or the header's `BITPIX`.
pub fn scalar_type(header: &HeaderMap, explicit: Option<&str>) -> Result<ScalarType> {
    if let Some(name) = explicit {
        return ScalarType::parse(name).with_context(|| format!("unknown data type {}", name));
    }
    let bitpix = header
        .get_i64("BITPIX")?
        .context("header has no BITPIX and no data type was given")?;
    ScalarType::from_bitpix(bitpix).with_context(|| format!("unsupported BITPIX {}", bitpix))
}

/// Load a cube from a header file and a raw data file.
pub fn load_volume(
    header_path: &Path,
    data_path: &Path,
    dtype: Option<&str>,
    order: ByteOrder,
) -> Result<Volume> {
    let header = load_header(header_path)?;
    let dims = header_dims(&header)?;
    let scalar_type = scalar_type(&header, dtype)?;

    let mut bytes =
        fs::read(data_path).with_context(|| format!("reading data {}", data_path.display()))?;
    if order == ByteOrder::BigEndian && cfg!(target_endian = "little") {
        for element in bytes.chunks_exact_mut(scalar_type.size_bytes()) {
            element.reverse();
        }
    }
    let buffer = ScalarBuffer::from_native_bytes(scalar_type, &bytes)?;

    let name = data_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cube")
        .to_string();
    let volume = Volume::new(VolumeId::new(name.clone()), name, dims, buffer, header)?;
    info!(
        volume = %volume.id,
        dims = ?dims,
        dtype = %scalar_type,
        "Loaded cube"
    );
    Ok(volume)
}
