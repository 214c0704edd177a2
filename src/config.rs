/*
 * This file is part of Valvemon.
 *
 * Copyright (C) 2025 Valvemon contributors
 *
 * Valvemon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Valvemon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Valvemon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Configuration document loading
//!
//! Every configuration file is a JSON document. Files are size-checked before
//! they are read, and parse failures carry the offending path.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::constants::limits;
use crate::error::{Result, ValvemonError};

/// Refuse files that are missing, not regular files, or larger than `max_size`
pub fn check_file(path: &Path, max_size: u64) -> Result<u64> {
    let meta = fs::metadata(path).map_err(|_| ValvemonError::FileNotFound(path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(ValvemonError::FileNotFound(path.to_path_buf()));
    }
    if meta.len() > max_size {
        return Err(ValvemonError::FileTooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            max_size,
        });
    }
    Ok(meta.len())
}

/// Read and deserialize a configuration document
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    check_file(path, limits::MAX_CONFIG_FILE_SIZE)?;
    let data = fs::read_to_string(path).map_err(|source| ValvemonError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = serde_json::from_str(&data).map_err(|e| ValvemonError::Document {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!("Loaded {}", path.display());
    Ok(doc)
}
