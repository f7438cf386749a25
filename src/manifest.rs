//! YAML batch manifest: which brands to run, with which keywords, over which
//! platform exports.
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;

use crate::normalize::Layer;
use crate::pipeline::dataset::FileDatasetSource;
use crate::pipeline::orchestrator::{BrandRequest, PlatformSource};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub brands: Vec<BrandEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BrandEntry {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub validate_urls: bool,
    #[serde(default)]
    pub platforms: Vec<PlatformEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PlatformEntry {
    pub platform: String,
    pub dataset: PathBuf,
    /// `1` for posts (default), `2` for comments.
    #[serde(default)]
    pub layer: Layer,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Manifest {
    /// # Errors
    /// Fails when the file cannot be read or is not a valid manifest.
    pub fn load_from_path(path: &Path) -> Result<Self, ManifestError> {
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ManifestError::Deserialize {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds one request per brand; relative dataset paths are joined onto
    /// `base_dir`.
    #[must_use]
    pub fn into_requests(self, base_dir: &Path) -> Vec<BrandRequest> {
        self.brands
            .into_iter()
            .map(|brand| BrandRequest {
                brand: brand.name,
                keywords: brand.keywords,
                start_date: brand.start_date,
                end_date: brand.end_date,
                validate_urls: brand.validate_urls,
                platforms: brand
                    .platforms
                    .into_iter()
                    .map(|entry| {
                        let path = if entry.dataset.is_absolute() {
                            entry.dataset
                        } else {
                            base_dir.join(entry.dataset)
                        };
                        PlatformSource::new(entry.platform, Arc::new(FileDatasetSource::new(path)))
                            .with_layer(entry.layer)
                    })
                    .collect(),
            })
            .collect()
    }
}
