//! Configuration for stowage.
//!
//! Values are layered with [figment], later sources overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. An optional configuration file (TOML, YAML or JSON, chosen by extension).
//! 3. Environment variables prefixed with `STOWAGE_`, nested keys separated by
//!    a double underscore (`STOWAGE_MIGRATION__PAGE_SIZE=500`).
//!
//! ```toml
//! [storage]
//! root = "/srv/photos"
//!
//! [template]
//! template = "{{ y }}/{{ MMMM }}/{{ filename }}"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Template used when none is configured: one folder per year, one per day.
pub const DEFAULT_TEMPLATE: &str = "{{ y }}/{{ y }}-{{ MM }}-{{ dd }}/{{ filename }}";
/// Library-relative folder holding one sub-folder per owner.
pub const DEFAULT_LIBRARY_FOLDER: &str = "upload/library";
pub const DEFAULT_PAGE_SIZE: usize = 1000;
const ENV_PREFIX: &str = "STOWAGE_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub template: TemplateConfig,
    pub migration: MigrationConfig,
    pub catalog: CatalogConfig,
}

/// Where the media files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend name, for logging.
    pub name: String,
    /// Absolute path of the library root.
    pub root: PathBuf,
    /// Refuse every move (for read-only mounts).
    pub read_only: bool,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self { name: "local".to_string(), root: data_dir().join("library"), read_only: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// The active storage template; [`DEFAULT_TEMPLATE`] when unset or blank.
    pub template: Option<String>,
    pub library_folder: String,
}
impl Default for TemplateConfig {
    fn default() -> Self {
        Self { template: None, library_folder: DEFAULT_LIBRARY_FOLDER.to_string() }
    }
}
impl TemplateConfig {
    /// The template that should be rendered: the configured one, falling back
    /// to the default.
    pub fn active(&self) -> &str {
        match self.template.as_deref().map(str::trim) {
            Some(template) if !template.is_empty() => template,
            _ => DEFAULT_TEMPLATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Assets fetched from the catalog per page.
    pub page_size: usize,
}
impl Default for MigrationConfig {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path of the SQLite catalog database.
    pub database: PathBuf,
}
impl Default for CatalogConfig {
    fn default() -> Self {
        Self { database: data_dir().join("catalog.sqlite") }
    }
}

fn data_dir() -> PathBuf {
    ProjectDirs::from("", "", "stowage")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/var/lib/stowage"))
}

impl Config {
    /// Loads and validates the configuration from defaults, an optional file
    /// and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file_exact(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        let config: Config =
            figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(root = %config.storage.root.display(), template = config.template.active(), "Loaded configuration");
        Ok(config)
    }

    /// Checks values that deserialize fine but can't be used.
    pub fn validate(&self) -> Result<()> {
        if self.migration.page_size == 0 {
            exn::bail!(ErrorKind::Invalid("migration.page_size must be at least 1"));
        }
        if !self.storage.root.is_absolute() {
            exn::bail!(ErrorKind::Invalid("storage.root must be an absolute path"));
        }
        let folder = Path::new(self.template.library_folder.trim());
        if folder.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("template.library_folder must not be empty"));
        }
        if folder.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            exn::bail!(ErrorKind::Invalid("template.library_folder must stay inside the storage root"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.template.active(), DEFAULT_TEMPLATE);
        assert_eq!(config.migration.page_size, 1000);
    }

    #[rstest]
    #[case(None, DEFAULT_TEMPLATE)]
    #[case(Some(""), DEFAULT_TEMPLATE)]
    #[case(Some("   "), DEFAULT_TEMPLATE)]
    #[case(Some("{{ y }}/{{ filename }}"), "{{ y }}/{{ filename }}")]
    fn test_active_template_falls_back(#[case] configured: Option<&str>, #[case] expected: &str) {
        let config = TemplateConfig { template: configured.map(String::from), ..TemplateConfig::default() };
        assert_eq!(config.active(), expected);
    }

    #[rstest]
    #[case("/abs/library")]
    #[case("../outside")]
    #[case("upload/../../outside")]
    #[case("")]
    fn test_rejects_bad_library_folder(#[case] folder: &str) {
        let mut config = Config::default();
        config.template.library_folder = folder.to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_loads_toml_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "stowage.toml",
                r#"
                    [storage]
                    root = "/srv/photos"

                    [template]
                    template = "{{ y }}/{{ MMMM }}/{{ filename }}"

                    [migration]
                    page_size = 50
                "#,
            )?;
            jail.set_env("STOWAGE_MIGRATION__PAGE_SIZE", "25");
            let config = Config::load(Some(Path::new("stowage.toml"))).unwrap();
            assert_eq!(config.storage.root, PathBuf::from("/srv/photos"));
            assert_eq!(config.template.active(), "{{ y }}/{{ MMMM }}/{{ filename }}");
            assert_eq!(config.migration.page_size, 25);
            assert_eq!(config.template.library_folder, DEFAULT_LIBRARY_FOLDER);
            Ok(())
        });
    }

    #[test]
    fn test_loads_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file("stowage.yaml", "storage:\n  root: /srv/photos\n  read_only: true\n")?;
            let config = Config::load(Some(Path::new("stowage.yaml"))).unwrap();
            assert!(config.storage.read_only);
            Ok(())
        });
    }

    #[test]
    fn test_rejects_invalid_values_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("STOWAGE_MIGRATION__PAGE_SIZE", "0");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_and_unknown_files() {
        Jail::expect_with(|jail| {
            let err = Config::load(Some(Path::new("missing.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound(_)));
            jail.create_file("stowage.ini", "root = /srv")?;
            let err = Config::load(Some(Path::new("stowage.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
            Ok(())
        });
    }
}
