//! Tensor exchange with external engines: raw `.bin` files plus a JSON manifest
//!
//! A directory holding `input_0.bin`, `input_1.bin`, ... also holds
//! `manifest.json`:
//!
//! ```json
//! [{"shape": [1, 3, 28, 28], "dtype": "float32", "file": "input_0.bin"}]
//! ```

use nnparity_common::{DType, ExecutionError, Tensor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub shape: Vec<usize>,
    pub dtype: DType,
    /// Relative to the manifest's directory.
    pub file: String,
}

/// Write `<stem>_<i>.bin` for every tensor and the manifest describing them.
///
/// Goes through `tokio::fs`, so callers on the runtime's worker threads do not
/// block on the filesystem.
pub async fn write_tensors(dir: &Path, stem: &str, tensors: &[Tensor]) -> std::io::Result<Vec<ManifestEntry>> {
    tokio::fs::create_dir_all(dir).await?;

    let mut manifest = Vec::with_capacity(tensors.len());
    for (i, tensor) in tensors.iter().enumerate() {
        let file = format!("{stem}_{i}.bin");
        tokio::fs::write(dir.join(&file), tensor.to_le_bytes()).await?;
        manifest.push(ManifestEntry { shape: tensor.shape().to_vec(), dtype: tensor.dtype(), file });
    }

    let json = serde_json::to_vec_pretty(&manifest).map_err(std::io::Error::other)?;
    tokio::fs::write(dir.join(MANIFEST_FILE), json).await?;
    Ok(manifest)
}

/// [`read_tensors`] on the blocking pool.
pub async fn load_tensors(dir: PathBuf) -> Result<Vec<Tensor>, ExecutionError> {
    tokio::task::spawn_blocking(move || read_tensors(&dir))
        .await
        .map_err(|e| ExecutionError::decode(format!("tensor read task failed: {e}")))?
}

/// Read every tensor listed in `<dir>/manifest.json`, in manifest order.
pub fn read_tensors(dir: &Path) -> Result<Vec<Tensor>, ExecutionError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let raw = std::fs::read(&manifest_path)
        .map_err(|e| ExecutionError::decode(format!("cannot read {}: {e}", manifest_path.display())))?;
    let manifest: Vec<ManifestEntry> = serde_json::from_slice(&raw)
        .map_err(|e| ExecutionError::decode(format!("malformed {}: {e}", manifest_path.display())))?;

    manifest
        .into_iter()
        .map(|entry| {
            if Path::new(&entry.file).components().count() != 1 {
                return Err(ExecutionError::decode(format!("manifest entry `{}` leaves its directory", entry.file)));
            }
            let path = dir.join(&entry.file);
            let bytes = std::fs::read(&path)
                .map_err(|e| ExecutionError::decode(format!("cannot read {}: {e}", path.display())))?;
            Tensor::from_le_bytes(entry.shape, entry.dtype, &bytes)
                .map_err(|e| ExecutionError::decode(format!("{}: {e}", path.display())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_written_tensors_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let tensors = vec![
            Tensor::from_f32(vec![2, 2], vec![1.0, -2.0, 3.5, 0.0]).unwrap(),
            Tensor::new(vec![3], DType::Uint8, vec![0.0, 114.0, 255.0]).unwrap(),
        ];

        let manifest = write_tensors(dir.path(), "output", &tensors).await.unwrap();
        assert_eq!(manifest[1].file, "output_1.bin");
        assert_eq!(std::fs::metadata(dir.path().join("output_1.bin")).unwrap().len(), 3);

        assert_eq!(read_tensors(dir.path()).unwrap(), tensors);
        assert_eq!(load_tensors(dir.path().to_path_buf()).await.unwrap(), tensors);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_write_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("case").join("inputs");
        write_tensors(&nested, "input", &[Tensor::zeros(vec![1, 3], DType::Float32)]).await.unwrap();
        assert!(nested.join(MANIFEST_FILE).is_file());
        assert_eq!(read_tensors(&nested).unwrap()[0].shape(), &[1, 3][..]);
    }

    #[test]
    fn test_missing_manifest_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_tensors(dir.path()).unwrap_err();
        assert_eq!(err.category(), "decode");
    }

    #[tokio::test]
    async fn test_truncated_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        write_tensors(dir.path(), "output", &[Tensor::zeros(vec![4], DType::Float32)]).await.unwrap();
        std::fs::write(dir.path().join("output_0.bin"), [0u8; 7]).unwrap();
        assert!(matches!(read_tensors(dir.path()), Err(ExecutionError::OutputDecode { .. })));
    }

    #[test]
    fn test_manifest_paths_stay_inside_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"[{"shape": [1], "dtype": "float32", "file": "../secret.bin"}]"#,
        )
        .unwrap();
        assert!(read_tensors(dir.path()).is_err());
    }
}
