//! Avatar catalog (`avatars.dat`) parsing.
//!
//! The file is a flat list of blocks:
//! ```text
//! avatar
//!   name=Andy
//!   geometry=andy.rwx
//! avatar
//!   name=Tina
//!   geometry=tina.rwx
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::loader::AssetError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarEntry {
    pub name: String,
    pub geometry: String,
}

/// Avatars a world offers, in file order. The index in the catalog is the
/// avatar number users pick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarCatalog {
    entries: Vec<AvatarEntry>,
}

impl AvatarCatalog {
    /// Parse catalog text. Unknown keys are skipped, and so are `name=` or
    /// `geometry=` lines that appear before the first `avatar` line.
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<AvatarEntry> = Vec::new();
        for line in text.lines().map(str::trim) {
            if line == "avatar" {
                entries.push(AvatarEntry::default());
                continue;
            }
            let Some(current) = entries.last_mut() else {
                continue;
            };
            if let Some(name) = line.strip_prefix("name=") {
                current.name = name.to_string();
            } else if let Some(geometry) = line.strip_prefix("geometry=") {
                current.geometry = geometry.to_string();
            }
        }
        Self { entries }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn entries(&self) -> &[AvatarEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&AvatarEntry> {
        self.entries.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&AvatarEntry> {
        self.entries.iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
