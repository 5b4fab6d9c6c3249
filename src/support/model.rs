//! Типы данных поддержки: идентификаторы объектов и поставщиков,
//! варианты поддержки, записи дескрипторов и итоговый статус объекта.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор объекта метаданных (обычно UUID из выгрузки конфигурации)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigurationObjectId(pub String);

impl ConfigurationObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Является ли идентификатор корректным UUID
    pub fn is_uuid(&self) -> bool {
        uuid::Uuid::parse_str(&self.0).is_ok()
    }
}

impl fmt::Display for ConfigurationObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigurationObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConfigurationObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Идентификатор поставщика (конфигурации поставщика) в цепочке поддержки
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Описание конфигурации поставщика
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportProvider {
    pub id: ProviderId,
    pub name: String,
    pub vendor: String,
    pub version: String,
}

impl SupportProvider {
    /// Поставщик, известный только по идентификатору
    pub fn bare(id: impl Into<ProviderId>) -> Self {
        let id = id.into();
        Self {
            name: id.0.clone(),
            id,
            vendor: String::new(),
            version: String::new(),
        }
    }

    /// Конфигурация поставщика из файла поставки. Конфигурация
    /// определяется тройкой (имя, поставщик, версия): одноимённые
    /// конфигурации разных поставщиков или версий - разные звенья цепочки.
    pub fn configuration(
        name: impl Into<String>,
        vendor: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let (name, vendor, version) = (name.into(), vendor.into(), version.into());
        Self {
            id: ProviderId(format!("{} {} ({})", name, version, vendor)),
            name,
            vendor,
            version,
        }
    }

    /// Совпадает ли ключ с идентификатором или именем конфигурации
    pub fn matches(&self, key: &str) -> bool {
        self.id.as_str() == key || self.name == key
    }
}

/// Заявка одного поставщика о поддержке объекта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SupportVariant {
    /// Объект не на поддержке у этого поставщика
    NotSupported,
    /// Объект на поддержке; `editable` - разрешено ли изменение
    Supported { editable: bool },
    /// Поставщик удалил объект, локальная копия устарела
    Deleted,
}

impl SupportVariant {
    pub fn is_supported(&self) -> bool {
        matches!(self, SupportVariant::Supported { .. })
    }
}

impl fmt::Display for SupportVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupportVariant::NotSupported => write!(f, "not supported"),
            SupportVariant::Supported { editable: true } => write!(f, "supported (editable)"),
            SupportVariant::Supported { editable: false } => write!(f, "supported (locked)"),
            SupportVariant::Deleted => write!(f, "deleted"),
        }
    }
}

/// Запись дескриптора поддержки. Создаётся только декодером
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportRecord {
    pub object: ConfigurationObjectId,
    pub provider: ProviderId,
    pub variant: SupportVariant,
    pub revision: Option<String>,
}

impl SupportRecord {
    pub fn new(
        object: ConfigurationObjectId,
        provider: ProviderId,
        variant: SupportVariant,
    ) -> Self {
        Self {
            object,
            provider,
            variant,
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

/// Удалось ли вычислить статус объекта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Resolved,
    /// Данные объекта повреждены, статус не определён
    Unresolved,
}

/// Итоговый статус поддержки объекта после применения цепочки поставщиков
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveSupportStatus {
    pub provider: Option<ProviderId>,
    pub variant: SupportVariant,
    pub editable: bool,
    pub revision: Option<String>,
    #[serde(default)]
    pub resolution: Resolution,
}

impl EffectiveSupportStatus {
    /// Полностью локальный объект: не на поддержке, редактируется свободно
    pub fn local() -> Self {
        Self {
            provider: None,
            variant: SupportVariant::NotSupported,
            editable: true,
            revision: None,
            resolution: Resolution::Resolved,
        }
    }

    /// Статус объекта, данные которого не удалось разобрать.
    /// Редактирование запрещено, пока причина не устранена.
    pub fn unresolved() -> Self {
        Self {
            provider: None,
            variant: SupportVariant::NotSupported,
            editable: false,
            revision: None,
            resolution: Resolution::Unresolved,
        }
    }

    pub(crate) fn from_record(record: &SupportRecord) -> Self {
        let editable = match record.variant {
            SupportVariant::NotSupported => true,
            SupportVariant::Supported { editable } => editable,
            SupportVariant::Deleted => false,
        };
        Self {
            provider: Some(record.provider.clone()),
            variant: record.variant,
            editable,
            revision: record.revision.clone(),
            resolution: Resolution::Resolved,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.variant == SupportVariant::Deleted
    }

    pub fn is_unresolved(&self) -> bool {
        self.resolution == Resolution::Unresolved
    }
}

impl Default for EffectiveSupportStatus {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Display for EffectiveSupportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unresolved() {
            return write!(f, "unresolved");
        }
        write!(f, "{}", self.variant)?;
        if let Some(provider) = &self.provider {
            write!(f, " by {}", provider)?;
        }
        if let Some(revision) = &self.revision {
            write!(f, " @ {}", revision)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_default() {
        let status = EffectiveSupportStatus::default();
        assert_eq!(status.provider, None);
        assert_eq!(status.variant, SupportVariant::NotSupported);
        assert!(status.editable);
        assert!(!status.is_unresolved());
    }

    #[test]
    fn test_unresolved_is_not_editable() {
        let status = EffectiveSupportStatus::unresolved();
        assert!(status.is_unresolved());
        assert!(!status.editable);
        assert_eq!(status.to_string(), "unresolved");
    }

    #[test]
    fn test_deleted_record_is_not_editable() {
        let record = SupportRecord::new("OBJ".into(), "V1".into(), SupportVariant::Deleted);
        let status = EffectiveSupportStatus::from_record(&record);
        assert!(status.is_deleted());
        assert!(!status.editable);
    }

    #[test]
    fn test_configuration_identity() {
        let a = SupportProvider::configuration("БСП", "VendorA", "3.1");
        let b = SupportProvider::configuration("БСП", "VendorB", "3.1");
        let newer = SupportProvider::configuration("БСП", "VendorA", "3.2");

        assert_ne!(a.id, b.id);
        assert_ne!(a.id, newer.id);
        assert_eq!(a.id, SupportProvider::configuration("БСП", "VendorA", "3.1").id);
        assert!(a.matches("БСП"));
        assert!(a.matches(a.id.as_str()));
        assert!(!a.matches("VendorA"));
    }

    #[test]
    fn test_object_id_uuid_check() {
        assert!(ConfigurationObjectId::from("3c907782-1b24-440c-b0de-1d62cebde27b").is_uuid());
        assert!(!ConfigurationObjectId::from("OBJ-1").is_uuid());
    }

    #[test]
    fn test_variant_serde_shape() {
        let json = serde_json::to_value(SupportVariant::Supported { editable: true }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "supported", "editable": true}));
    }
}
