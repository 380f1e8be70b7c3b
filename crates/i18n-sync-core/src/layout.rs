//! Where resources live on disk.
//!
//! Translation resources follow `{locales_dir}/{locale}/{namespace}.json`,
//! their PO mirrors `{po_dir}/{locale}/{namespace}.po`.

use crate::fs::FileSystem;
use i18n_sync_toml::SyncConfig;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct ResourceLayout {
    pub locales_dir: PathBuf,
    pub po_dir: Option<PathBuf>,
    pub source_dirs: Vec<PathBuf>,
    pub extensions: Vec<String>,
}

impl ResourceLayout {
    /// Resolves every configured directory against the project root.
    pub fn from_config(config: &SyncConfig, root: &Path) -> Self {
        Self {
            locales_dir: config.locales_dir_from_base(root),
            po_dir: config.po_dir_from_base(root),
            source_dirs: config.source_dirs.iter().map(|dir| root.join(dir)).collect(),
            extensions: config.extensions.clone(),
        }
    }

    pub fn is_translation_resource(&self, path: &Path) -> bool {
        has_extension(path, "json") && grandparent(path) == Some(self.locales_dir.as_path())
    }

    pub fn is_po_file(&self, path: &Path) -> bool {
        match &self.po_dir {
            Some(po_dir) => has_extension(path, "po") && grandparent(path) == Some(po_dir.as_path()),
            None => false,
        }
    }

    pub fn is_code_file(&self, path: &Path) -> bool {
        self.source_dirs.iter().any(|dir| path.starts_with(dir))
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }

    /// The locale directory a resource or PO file sits in.
    pub fn locale_of(path: &Path) -> Option<String> {
        path.parent()?
            .file_name()?
            .to_str()
            .map(str::to_string)
    }

    /// The namespace a resource or PO file holds.
    pub fn namespace_of(path: &Path) -> Option<String> {
        path.file_stem()?.to_str().map(str::to_string)
    }

    pub fn resource_path(&self, locale: &str, namespace: &str) -> PathBuf {
        self.locales_dir
            .join(locale)
            .join(format!("{namespace}.json"))
    }

    /// The PO mirror of a JSON resource, when PO output is configured.
    pub fn po_path_for(&self, resource: &Path) -> Option<PathBuf> {
        let po_dir = self.po_dir.as_ref()?;
        let locale = Self::locale_of(resource)?;
        let namespace = Self::namespace_of(resource)?;
        Some(po_dir.join(locale).join(format!("{namespace}.po")))
    }

    /// The JSON resource a PO file mirrors.
    pub fn resource_for_po(&self, po_file: &Path) -> Option<PathBuf> {
        let locale = Self::locale_of(po_file)?;
        let namespace = Self::namespace_of(po_file)?;
        Some(self.resource_path(&locale, &namespace))
    }

    /// Every existing translation resource.
    pub async fn list_resources(&self, fs: &dyn FileSystem) -> io::Result<Vec<PathBuf>> {
        Ok(fs
            .list_files(&self.locales_dir)
            .await?
            .into_iter()
            .filter(|path| self.is_translation_resource(path))
            .collect())
    }

    /// Existing resources with the same namespace as `resource` in other
    /// locales, paired with their locale.
    pub async fn siblings(
        &self,
        fs: &dyn FileSystem,
        resource: &Path,
    ) -> io::Result<Vec<(String, PathBuf)>> {
        let Some(file_name) = resource.file_name() else {
            return Ok(Vec::new());
        };
        let own_locale = Self::locale_of(resource);

        Ok(self
            .list_resources(fs)
            .await?
            .into_iter()
            .filter(|path| path.file_name() == Some(file_name))
            .filter_map(|path| {
                let locale = Self::locale_of(&path)?;
                (Some(&locale) != own_locale.as_ref()).then_some((locale, path))
            })
            .collect())
    }

    /// Locales that have at least one resource.
    pub async fn locales(&self, fs: &dyn FileSystem) -> io::Result<Vec<String>> {
        let mut locales: Vec<String> = self
            .list_resources(fs)
            .await?
            .iter()
            .filter_map(|path| Self::locale_of(path))
            .collect();
        locales.sort();
        locales.dedup();
        Ok(locales)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

fn grandparent(path: &Path) -> Option<&Path> {
    path.parent()?.parent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn layout() -> ResourceLayout {
        let mut config = SyncConfig::new("en", "locales");
        config.po_dir = Some(PathBuf::from("po"));
        ResourceLayout::from_config(&config, Path::new("/project"))
    }

    #[test]
    fn test_classifies_paths() {
        let layout = layout();
        assert!(layout.is_translation_resource(Path::new("/project/locales/en/common.json")));
        assert!(!layout.is_translation_resource(Path::new("/project/locales/common.json")));
        assert!(layout.is_po_file(Path::new("/project/po/fr/common.po")));
        assert!(layout.is_code_file(Path::new("/project/src/pages/home.tsx")));
        assert!(!layout.is_code_file(Path::new("/project/src/styles.css")));
        assert!(!layout.is_code_file(Path::new("/project/locales/en/app.js")));
    }

    #[test]
    fn test_po_mapping_round_trips() {
        let layout = layout();
        let resource = Path::new("/project/locales/fr/common.json");
        let po = layout.po_path_for(resource).unwrap();
        assert_eq!(po, PathBuf::from("/project/po/fr/common.po"));
        assert_eq!(layout.resource_for_po(&po).unwrap(), resource);
    }

    #[tokio::test]
    async fn test_siblings_share_namespace() {
        let fs = MemoryFileSystem::new();
        fs.insert("/project/locales/en/common.json", "{}");
        fs.insert("/project/locales/en/other.json", "{}");
        fs.insert("/project/locales/fr/common.json", "{}");
        fs.insert("/project/locales/de/common.json", "{}");

        let siblings = layout()
            .siblings(&fs, Path::new("/project/locales/en/common.json"))
            .await
            .unwrap();
        let locales: Vec<&str> = siblings.iter().map(|(locale, _)| locale.as_str()).collect();
        assert_eq!(locales, vec!["de", "fr"]);
    }
}
