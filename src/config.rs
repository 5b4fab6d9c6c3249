/*!
# Support Index Configuration

Настройки построения индекса поддержки. Загружаются из TOML, YAML или
JSON по расширению файла, сохраняются в TOML.

```toml
strict = false
workers = 4
default_provider = "БСП"
provider_order = ["Доработка", "БСП"]
```
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportConfig {
    /// Прерывать построение на первом повреждённом объекте
    #[serde(default)]
    pub strict: bool,

    /// Размер пула потоков; не задано или 0 - по числу ядер
    #[serde(default)]
    pub workers: Option<usize>,

    /// Поставщик для устаревших кодировок без поставщика
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Явный порядок цепочки, ближайший первым
    #[serde(default)]
    pub provider_order: Vec<String>,
}

impl SupportConfig {
    /// Загружает настройки, формат определяется по расширению
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read support config from {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let config: Self = match extension.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config from {}", path.display()))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config from {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config from {}", path.display()))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Сохраняет настройки в TOML
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize support config to TOML")?;

        std::fs::write(&path, content).with_context(|| {
            format!(
                "Failed to write support config to {}",
                path.as_ref().display()
            )
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for provider in &self.provider_order {
            if !seen.insert(provider.as_str()) {
                bail!("Provider '{}' is listed twice in provider_order", provider);
            }
        }

        if let Some(default) = &self.default_provider {
            if !self.provider_order.is_empty() && !seen.contains(default.as_str()) {
                bail!(
                    "Default provider '{}' is not listed in provider_order",
                    default
                );
            }
        }

        Ok(())
    }
}
