//! Whole-file atomic JSON persistence (write-temp-then-rename), shared by
//! the catalog and breakpoint store (§5: "writes are whole-file atomic").

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::KernelError;

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, KernelError> {
    let text = std::fs::read_to_string(path).map_err(|source| KernelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| KernelError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), KernelError> {
    let pretty = serde_json::to_string_pretty(value).map_err(|source| KernelError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, pretty).map_err(|source| KernelError::Io {
        path: tmp_path.display().to_string(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| KernelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn atomic_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        save_json_atomic(&path, &Sample { value: 42 }).unwrap();
        let loaded: Sample = load_json(&path).unwrap();
        assert_eq!(loaded, Sample { value: 42 });
        assert!(!path.with_extension("tmp").exists());
    }
}
