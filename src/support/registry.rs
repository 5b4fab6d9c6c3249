//! Реестр индексов поддержки по корневым каталогам конфигураций.
//!
//! Позволяет найти индекс по пути к любому файлу внутри конфигурации:
//! выбирается самый длинный зарегистрированный корень, являющийся
//! префиксом пути.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::SupportIndex;
use super::model::{ConfigurationObjectId, EffectiveSupportStatus};

#[derive(Debug, Clone, Default)]
pub struct SupportRegistry {
    indexes: HashMap<PathBuf, Arc<SupportIndex>>,
}

/// Корень конфигурации для файла поставки:
/// `<root>/Ext/ParentConfigurations.bin` -> `<root>`
pub fn root_for_support_file(path: &Path) -> Option<PathBuf> {
    path.parent()?.parent().map(Path::to_path_buf)
}

impl SupportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует индекс; ранее зарегистрированный для того же корня заменяется
    pub fn insert(&mut self, root: impl Into<PathBuf>, index: SupportIndex) -> Arc<SupportIndex> {
        let index = Arc::new(index);
        self.indexes.insert(root.into(), Arc::clone(&index));
        index
    }

    pub fn index_for(&self, path: &Path) -> Option<Arc<SupportIndex>> {
        if let Some(index) = self.indexes.get(path) {
            return Some(Arc::clone(index));
        }
        self.indexes
            .iter()
            .filter(|(root, _)| path.starts_with(root))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(_, index)| Arc::clone(index))
    }

    /// Статус объекта по пути к его файлу; вне известных конфигураций
    /// объект считается локальным
    pub fn status_for(
        &self,
        object: &ConfigurationObjectId,
        path: &Path,
    ) -> EffectiveSupportStatus {
        self.index_for(path)
            .map(|index| index.status(object))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
