// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Outfit image tree: one directory per outfit, images directly inside

use std::path::{Component, Path, PathBuf};

use crate::{ClassifierError, Result};

/// Extensions listed for an outfit (exact, case-sensitive match)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png"];

/// Read-only view over the images root
#[derive(Debug, Clone)]
pub struct ImageLibrary {
    root: PathBuf,
}

impl ImageLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an outfit directory
    pub fn outfit_dir(&self, outfit: &str) -> Result<PathBuf> {
        validate_name(outfit)?;
        Ok(self.root.join(outfit))
    }

    /// Path of a single image inside an outfit directory
    pub fn image_path(&self, outfit: &str, file: &str) -> Result<PathBuf> {
        validate_name(file)?;
        Ok(self.outfit_dir(outfit)?.join(file))
    }

    /// List the `.jpg`/`.png` files directly inside an outfit directory
    ///
    /// Order follows the directory read order.
    pub fn list_images(&self, outfit: &str) -> Result<Vec<String>> {
        let dir = self.outfit_dir(outfit)?;
        let entries = std::fs::read_dir(&dir).map_err(|source| ClassifierError::Scan {
            path: dir.clone(),
            source,
        })?;

        let mut images = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ClassifierError::Scan {
                path: dir.clone(),
                source,
            })?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_listed_image(&name) {
                images.push(name);
            }
        }

        Ok(images)
    }

    /// Names of the outfit directories under the root, sorted
    pub fn outfit_names(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| ClassifierError::Scan {
            path: self.root.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        Ok(names)
    }
}

/// Whether a file name carries one of the listed image extensions
///
/// The extension is the text after the last `.`, so a bare `.jpg` counts.
pub fn is_listed_image(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Accept only a single, plain path component
pub fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(()),
        _ => Err(ClassifierError::InvalidName(name.to_string())),
    }
}
