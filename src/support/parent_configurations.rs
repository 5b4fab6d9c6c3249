/*!
# ParentConfigurations.bin

Чтение файла настроек поставки, который 1С хранит рядом с конфигурацией
(`Ext/ParentConfigurations.bin` в выгрузке конфигуратора,
`src/Configuration/ParentConfigurations.bin` в EDT).

Файл - список полей через запятую/перевод строки, строки в двойных
кавычках (`""` внутри строки - кавычка):

* поле 1 - признак блокировки всей конфигурации (0 - не заблокирована);
* поле 2 - количество конфигураций поставщиков;
* с поля 3 для каждой конфигурации: 3 служебных поля, версия, поставщик,
  имя, количество объектов, по 4 поля на объект (код поддержки, служебное,
  UUID объекта, служебное) и 2 завершающих поля.

Код поддержки объекта: 0 - не редактируется, 1 - редактируется с
сохранением поддержки, 2 - поддержка снята. При заблокированной
конфигурации все объекты считаются нередактируемыми. Неизвестный код
портит только свой объект: он попадает в снимок с ошибкой, остальные
объекты читаются как обычно.

Конфигурация поставщика определяется тройкой (имя, поставщик, версия);
повторное описание той же тройки дополняет уже прочитанную конфигурацию.
*/

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use super::chain::ProviderChain;
use super::model::{ConfigurationObjectId, SupportProvider, SupportRecord, SupportVariant};
use crate::core::errors::{ChainBuildError, SupportCodeError, SupportFailure, SupportFileError};
use crate::core::fs_utils::read_text_file;

const FIELD_LOCK_FLAG: usize = 1;
const FIELD_CONFIGURATION_COUNT: usize = 2;
const FIRST_CONFIGURATION: usize = 3;

const SHIFT_VERSION: usize = 3;
const SHIFT_VENDOR: usize = 4;
const SHIFT_NAME: usize = 5;
const SHIFT_OBJECT_COUNT: usize = 6;
const SHIFT_OBJECTS: usize = 7;
const SHIFT_OBJECT_UUID: usize = 2;
const FIELDS_PER_OBJECT: usize = 4;
const TRAILING_FIELDS: usize = 2;

/// Записи поддержки одного объекта из всех конфигураций поставщиков
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRecords {
    pub object: ConfigurationObjectId,
    pub records: Vec<SupportRecord>,
    /// Первая ошибка в данных объекта; такой объект не разрешается
    #[serde(skip)]
    pub failure: Option<SupportFailure>,
}

impl ObjectRecords {
    pub fn new(object: ConfigurationObjectId, records: Vec<SupportRecord>) -> Self {
        Self {
            object,
            records,
            failure: None,
        }
    }
}

/// Прочитанные настройки поставки
#[derive(Debug, Clone, Default, Serialize)]
pub struct SupportSnapshot {
    /// Конфигурация заблокирована целиком
    pub locked: bool,
    /// Конфигурации поставщиков в порядке файла
    pub providers: Vec<SupportProvider>,
    /// Объекты в порядке первого появления
    pub objects: Vec<ObjectRecords>,
}

impl SupportSnapshot {
    /// Цепочка поставщиков в порядке файла (первый - ближайший)
    pub fn chain(&self) -> Result<ProviderChain, ChainBuildError> {
        ProviderChain::from_providers(self.providers.iter().cloned())
    }

    pub fn record_count(&self) -> usize {
        self.objects.iter().map(|object| object.records.len()).sum()
    }
}

/// Читает файл настроек поставки с диска
pub fn read_support_file(path: &Path) -> Result<SupportSnapshot, SupportFileError> {
    debug!("Reading ParentConfigurations.bin from {}", path.display());
    let text = read_text_file(path)?;
    parse_support_data(&text)
}

/// Разбирает содержимое файла настроек поставки
pub fn parse_support_data(text: &str) -> Result<SupportSnapshot, SupportFileError> {
    let fields = split_fields(text);

    let locked = number(&fields, FIELD_LOCK_FLAG)? != 0;
    let configuration_count = count(&fields, FIELD_CONFIGURATION_COUNT)?;
    debug!("Configurations count: {}", configuration_count);

    let mut snapshot = SupportSnapshot {
        locked,
        ..SupportSnapshot::default()
    };
    let mut positions: HashMap<ConfigurationObjectId, usize> = HashMap::new();

    let mut start = FIRST_CONFIGURATION;
    for _ in 0..configuration_count {
        let version = string(&fields, start + SHIFT_VERSION)?;
        let vendor = string(&fields, start + SHIFT_VENDOR)?;
        let name = string(&fields, start + SHIFT_NAME)?;
        let object_count = count(&fields, start + SHIFT_OBJECT_COUNT)?;

        debug!(
            "Configuration name: {} Version: {} Vendor: {} Object count: {}",
            name, version, vendor, object_count
        );

        let provider = SupportProvider::configuration(name, vendor, version);
        let repeated = snapshot.providers.iter().any(|known| known.id == provider.id);
        if repeated {
            debug!("Configuration {} is described twice, merging", provider.id);
        }

        let objects_start = start + SHIFT_OBJECTS;
        for number_object in 0..object_count {
            let at = objects_start + number_object * FIELDS_PER_OBJECT;
            let code = number(&fields, at)?;
            let object = ConfigurationObjectId(string(&fields, at + SHIFT_OBJECT_UUID)?);
            if !object.is_uuid() {
                debug!("Object id '{}' in field {} is not a UUID", object, at + SHIFT_OBJECT_UUID);
            }

            let position = *positions.entry(object.clone()).or_insert_with(|| {
                snapshot.objects.push(ObjectRecords::new(object.clone(), Vec::new()));
                snapshot.objects.len() - 1
            });
            let entry = &mut snapshot.objects[position];

            let variant = if locked {
                Some(SupportVariant::Supported { editable: false })
            } else {
                variant_for_code(code)
            };

            match variant {
                Some(variant) => entry.records.push(
                    SupportRecord::new(object, provider.id.clone(), variant)
                        .with_revision(provider.version.clone()),
                ),
                None => {
                    warn!("Unknown support code {} of object {} in field {}", code, object, at);
                    entry.failure.get_or_insert_with(|| {
                        SupportCodeError {
                            object,
                            provider: provider.id.clone(),
                            index: at,
                            code,
                        }
                        .into()
                    });
                }
            }
        }

        if !repeated {
            snapshot.providers.push(provider);
        }
        start = objects_start + TRAILING_FIELDS + object_count * FIELDS_PER_OBJECT;
    }

    Ok(snapshot)
}

fn variant_for_code(code: i64) -> Option<SupportVariant> {
    match code {
        0 => Some(SupportVariant::Supported { editable: false }),
        1 => Some(SupportVariant::Supported { editable: true }),
        2 => Some(SupportVariant::NotSupported),
        _ => None,
    }
}

/// Делит текст на поля. Запятая или перевод строки вне кавычек
/// завершает поле; переводы строк сразу после запятой пропускаются.
fn split_fields(text: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
                while matches!(chars.peek(), Some('\r') | Some('\n')) {
                    chars.next();
                }
            }
            '\n' if !in_quotes => fields.push(std::mem::take(&mut current)),
            '\r' if !in_quotes => {}
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }

    fields
}

fn field(fields: &[String], index: usize) -> Result<&str, SupportFileError> {
    fields
        .get(index)
        .map(String::as_str)
        .ok_or(SupportFileError::MissingField {
            index,
            len: fields.len(),
        })
}

fn number(fields: &[String], index: usize) -> Result<i64, SupportFileError> {
    let raw = field(fields, index)?;
    raw.trim_matches(|c: char| c == '{' || c == '}' || c.is_whitespace())
        .parse()
        .map_err(|_| SupportFileError::NotANumber {
            index,
            value: raw.to_string(),
        })
}

fn count(fields: &[String], index: usize) -> Result<usize, SupportFileError> {
    let value = number(fields, index)?;
    usize::try_from(value).map_err(|_| SupportFileError::NotANumber {
        index,
        value: value.to_string(),
    })
}

fn string(fields: &[String], index: usize) -> Result<String, SupportFileError> {
    let raw = field(fields, index)?.trim();
    let inner = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(raw);
    Ok(inner.replace("\"\"", "\""))
}
