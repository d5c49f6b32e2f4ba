//! Writing synthetic cubes to temporary files.

use std::fs;
use std::path::PathBuf;

use astro_common::HeaderMap;
use tempfile::TempDir;

/// A header JSON file and a raw native-endian data file in a temporary
/// directory. The directory is removed on drop.
pub struct CubeFiles {
    pub dir: TempDir,
    pub header: PathBuf,
    pub data: PathBuf,
}

/// Write `header` as JSON and `data` as raw f32 bytes.
pub fn write_cube_files(header: &HeaderMap, data: &[f32]) -> std::io::Result<CubeFiles> {
    let dir = tempfile::tempdir()?;
    let header_path = dir.path().join("cube.json");
    let data_path = dir.path().join("cube.raw");

    let json = serde_json::to_string_pretty(header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(&header_path, json)?;
    fs::write(&data_path, bytemuck::cast_slice::<f32, u8>(data))?;

    Ok(CubeFiles {
        dir,
        header: header_path,
        data: data_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_cube_files() {
        let header = HeaderMap::new().with("NAXIS", 3);
        let files = write_cube_files(&header, &[1.0, 2.0]).unwrap();
        assert_eq!(fs::read(&files.data).unwrap().len(), 8);
        let text = fs::read_to_string(&files.header).unwrap();
        assert!(text.contains("NAXIS"));
    }
}
