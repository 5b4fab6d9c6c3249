/*!
# Descriptor Decoder

Разбор сырого дескриптора поддержки одного объекта в последовательность
[`SupportRecord`]. Формат выбирается по первому байту (дискриминанту):

| Байт   | Кодировка | Содержимое                                              |
|--------|-----------|---------------------------------------------------------|
| `0x01` | flag      | `supported: u8`                                         |
| `0x02` | flags     | `supported: u8`, `editable: u8`                         |
| `0x03` | entries   | `count: u16 LE`, затем `count` записей поставщиков      |

Запись поставщика: `len: u8` + UTF-8 идентификатор, тег варианта `u8`
(`0x00` не на поддержке, `0x01` на поддержке без права изменения,
`0x02` на поддержке с правом изменения, `0x03` удалён), затем
`len: u8` + UTF-8 ревизия (пустая строка - ревизии нет).

Устаревшие кодировки `flag`/`flags` не содержат поставщика и относятся к
поставщику по умолчанию из [`KnownProviders`]. Пустой дескриптор означает,
что данных поддержки у объекта нет.
*/

use nom::bytes::complete::take;
use nom::error::{ErrorKind, ParseError};
use nom::multi::count;
use nom::number::complete::{le_u16, le_u8};
use nom::IResult;
use std::collections::HashSet;

use super::chain::ProviderChain;
use super::model::{ConfigurationObjectId, ProviderId, SupportRecord, SupportVariant};
use crate::core::errors::{DecodeError, DecodeErrorKind};

pub const ENCODING_FLAG: u8 = 0x01;
pub const ENCODING_FLAGS: u8 = 0x02;
pub const ENCODING_ENTRIES: u8 = 0x03;

pub const VARIANT_NOT_SUPPORTED: u8 = 0x00;
pub const VARIANT_LOCKED: u8 = 0x01;
pub const VARIANT_EDITABLE: u8 = 0x02;
pub const VARIANT_DELETED: u8 = 0x03;

/// Набор допустимых поставщиков для декодирования
#[derive(Debug, Clone, Default)]
pub struct KnownProviders {
    ids: HashSet<ProviderId>,
    default: Option<ProviderId>,
}

impl KnownProviders {
    /// Если поставщик ровно один, он же становится поставщиком по умолчанию
    pub fn new<I, P>(ids: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProviderId>,
    {
        let ids: HashSet<ProviderId> = ids.into_iter().map(Into::into).collect();
        let default = if ids.len() == 1 {
            ids.iter().next().cloned()
        } else {
            None
        };
        Self { ids, default }
    }

    pub fn with_default(mut self, id: impl Into<ProviderId>) -> Self {
        self.default = Some(id.into());
        self
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.ids.contains(id)
    }

    pub fn default_provider(&self) -> Option<&ProviderId> {
        self.default.as_ref()
    }
}

impl From<&ProviderChain> for KnownProviders {
    fn from(chain: &ProviderChain) -> Self {
        Self::new(chain.ids().cloned())
    }
}

/// Дескриптор в том виде, в каком он записан
#[derive(Debug)]
enum Descriptor {
    Flag { supported: bool },
    Flags { supported: bool, editable: bool },
    Entries(Vec<RawEntry>),
}

#[derive(Debug)]
struct RawEntry {
    provider: ProviderId,
    variant: SupportVariant,
    revision: Option<String>,
}

#[derive(Debug)]
enum RawError<'a> {
    Nom(&'a [u8]),
    Invalid(&'a [u8], DecodeErrorKind),
}

impl<'a> ParseError<&'a [u8]> for RawError<'a> {
    fn from_error_kind(input: &'a [u8], _kind: ErrorKind) -> Self {
        RawError::Nom(input)
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<&'a [u8], T, RawError<'a>>;

fn invalid(input: &[u8], kind: DecodeErrorKind) -> nom::Err<RawError<'_>> {
    nom::Err::Failure(RawError::Invalid(input, kind))
}

fn byte(input: &[u8]) -> PResult<'_, u8> {
    le_u8(input)
}

fn bytes(input: &[u8], len: u8) -> PResult<'_, &[u8]> {
    take(len)(input)
}

fn flag(input: &[u8]) -> PResult<'_, bool> {
    let (rest, value) = byte(input)?;
    match value {
        0 => Ok((rest, false)),
        1 => Ok((rest, true)),
        other => Err(invalid(input, DecodeErrorKind::InvalidFlag(other))),
    }
}

fn short_string(input: &[u8]) -> PResult<'_, String> {
    let (body, len) = byte(input)?;
    let (rest, raw) = bytes(body, len)?;
    match std::str::from_utf8(raw) {
        Ok(text) => Ok((rest, text.to_string())),
        Err(_) => Err(invalid(body, DecodeErrorKind::InvalidUtf8 { offset: 0 })),
    }
}

fn variant(input: &[u8]) -> PResult<'_, SupportVariant> {
    let (rest, tag) = byte(input)?;
    let variant = match tag {
        VARIANT_NOT_SUPPORTED => SupportVariant::NotSupported,
        VARIANT_LOCKED => SupportVariant::Supported { editable: false },
        VARIANT_EDITABLE => SupportVariant::Supported { editable: true },
        VARIANT_DELETED => SupportVariant::Deleted,
        other => return Err(invalid(input, DecodeErrorKind::UnknownVariantTag(other))),
    };
    Ok((rest, variant))
}

fn entry(input: &[u8]) -> PResult<'_, RawEntry> {
    let (input, provider) = short_string(input)?;
    let (input, variant) = variant(input)?;
    let (input, revision) = short_string(input)?;
    Ok((
        input,
        RawEntry {
            provider: ProviderId(provider),
            variant,
            revision: (!revision.is_empty()).then_some(revision),
        },
    ))
}

fn descriptor(input: &[u8]) -> PResult<'_, Descriptor> {
    let (rest, discriminant) = byte(input)?;
    match discriminant {
        ENCODING_FLAG => {
            let (rest, supported) = flag(rest)?;
            Ok((rest, Descriptor::Flag { supported }))
        }
        ENCODING_FLAGS => {
            let (rest, supported) = flag(rest)?;
            let (rest, editable) = flag(rest)?;
            Ok((rest, Descriptor::Flags { supported, editable }))
        }
        ENCODING_ENTRIES => {
            let (rest, entries_count) = le_u16::<_, RawError<'_>>(rest)?;
            let (rest, entries) = count(entry, usize::from(entries_count))(rest)?;
            Ok((rest, Descriptor::Entries(entries)))
        }
        other => Err(invalid(input, DecodeErrorKind::UnknownEncoding(other))),
    }
}

/// Декодирует дескриптор поддержки одного объекта.
///
/// Записи возвращаются в порядке хранения. Результат зависит только от
/// входных данных: повторный вызов с теми же байтами даёт те же записи.
pub fn decode(
    object: &ConfigurationObjectId,
    payload: &[u8],
    known: &KnownProviders,
) -> Result<Vec<SupportRecord>, DecodeError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let fail = |kind| DecodeError::new(object.clone(), kind);
    let offset_of = |rest: &[u8]| payload.len() - rest.len();

    let (rest, parsed) = match descriptor(payload) {
        Ok(done) => done,
        Err(nom::Err::Error(error)) | Err(nom::Err::Failure(error)) => {
            return Err(fail(match error {
                RawError::Nom(rest) => DecodeErrorKind::Truncated {
                    offset: offset_of(rest),
                },
                RawError::Invalid(rest, DecodeErrorKind::InvalidUtf8 { .. }) => {
                    DecodeErrorKind::InvalidUtf8 {
                        offset: offset_of(rest),
                    }
                }
                RawError::Invalid(_, kind) => kind,
            }))
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(fail(DecodeErrorKind::Truncated {
                offset: payload.len(),
            }))
        }
    };

    if !rest.is_empty() {
        return Err(fail(DecodeErrorKind::TrailingBytes(rest.len())));
    }

    match parsed {
        Descriptor::Flag { supported } => {
            let provider = legacy_provider(known).map_err(fail)?;
            let variant = if supported {
                SupportVariant::Supported { editable: false }
            } else {
                SupportVariant::NotSupported
            };
            Ok(vec![SupportRecord::new(object.clone(), provider, variant)])
        }
        Descriptor::Flags { supported, editable } => {
            let provider = legacy_provider(known).map_err(fail)?;
            let variant = if supported {
                SupportVariant::Supported { editable }
            } else {
                SupportVariant::NotSupported
            };
            Ok(vec![SupportRecord::new(object.clone(), provider, variant)])
        }
        Descriptor::Entries(entries) => entries
            .into_iter()
            .map(|entry| {
                if !known.contains(&entry.provider) {
                    return Err(fail(DecodeErrorKind::UnknownProvider(entry.provider)));
                }
                Ok(SupportRecord {
                    object: object.clone(),
                    provider: entry.provider,
                    variant: entry.variant,
                    revision: entry.revision,
                })
            })
            .collect(),
    }
}

/// Поставщик для кодировок без поставщика; он тоже обязан входить в
/// набор допустимых
fn legacy_provider(known: &KnownProviders) -> Result<ProviderId, DecodeErrorKind> {
    match known.default_provider() {
        None => Err(DecodeErrorKind::NoDefaultProvider),
        Some(provider) if !known.contains(provider) => {
            Err(DecodeErrorKind::UnknownProvider(provider.clone()))
        }
        Some(provider) => Ok(provider.clone()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Собирает дескриптор в кодировке `entries`
    pub(crate) fn entries_payload(entries: &[(&str, u8, &str)]) -> Vec<u8> {
        let mut bytes = vec![ENCODING_ENTRIES];
        bytes.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (provider, tag, revision) in entries {
            bytes.push(provider.len() as u8);
            bytes.extend_from_slice(provider.as_bytes());
            bytes.push(*tag);
            bytes.push(revision.len() as u8);
            bytes.extend_from_slice(revision.as_bytes());
        }
        bytes
    }

    fn obj(id: &str) -> ConfigurationObjectId {
        ConfigurationObjectId::from(id)
    }

    #[test]
    fn test_entries_encoding() {
        let known = KnownProviders::new(["V1", "V2"]);
        let payload =
            entries_payload(&[("V1", VARIANT_LOCKED, "1.0.0.1"), ("V2", VARIANT_DELETED, "")]);

        let records = decode(&obj("OBJ-1"), &payload, &known).unwrap();

        assert_eq!(
            records,
            vec![
                SupportRecord::new(
                    obj("OBJ-1"),
                    "V1".into(),
                    SupportVariant::Supported { editable: false },
                )
                .with_revision("1.0.0.1"),
                SupportRecord::new(obj("OBJ-1"), "V2".into(), SupportVariant::Deleted),
            ]
        );
    }

    #[test]
    fn test_legacy_flag_uses_single_provider() {
        let known = KnownProviders::new(["Vendor"]);

        let records = decode(&obj("OBJ"), &[ENCODING_FLAG, 1], &known).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provider.as_str(), "Vendor");
        assert_eq!(records[0].variant, SupportVariant::Supported { editable: false });

        let records = decode(&obj("OBJ"), &[ENCODING_FLAG, 0], &known).unwrap();
        assert_eq!(records[0].variant, SupportVariant::NotSupported);
    }

    #[test]
    fn test_legacy_flags_carry_editable() {
        let known = KnownProviders::new(["Local", "Vendor"]).with_default("Vendor");

        let records = decode(&obj("OBJ"), &[ENCODING_FLAGS, 1, 1], &known).unwrap();
        assert_eq!(records[0].provider.as_str(), "Vendor");
        assert_eq!(records[0].variant, SupportVariant::Supported { editable: true });

        let records = decode(&obj("OBJ"), &[ENCODING_FLAGS, 0, 1], &known).unwrap();
        assert_eq!(records[0].variant, SupportVariant::NotSupported);
    }

    #[test]
    fn test_legacy_default_outside_known_set() {
        let known = KnownProviders::new(["Local", "Vendor"]).with_default("Elsewhere");

        let error = decode(&obj("OBJ"), &[ENCODING_FLAG, 1], &known).unwrap_err();

        assert_eq!(error.object, obj("OBJ"));
        assert_eq!(error.kind, DecodeErrorKind::UnknownProvider("Elsewhere".into()));
    }

    #[test]
    fn test_legacy_without_default_provider() {
        let known = KnownProviders::new(["Local", "Vendor"]);
        let error = decode(&obj("OBJ"), &[ENCODING_FLAG, 1], &known).unwrap_err();
        assert_eq!(error.kind, DecodeErrorKind::NoDefaultProvider);
    }

    #[test]
    fn test_empty_payload_has_no_records() {
        let known = KnownProviders::new(["V1"]);
        assert!(decode(&obj("OBJ"), &[], &known).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_variant_tag() {
        let known = KnownProviders::new(["V1"]);
        let payload = entries_payload(&[("V1", 0x7f, "")]);

        let error = decode(&obj("OBJ-3"), &payload, &known).unwrap_err();

        assert_eq!(error.object, obj("OBJ-3"));
        assert_eq!(error.kind, DecodeErrorKind::UnknownVariantTag(0x7f));
    }

    #[test]
    fn test_unknown_encoding() {
        let known = KnownProviders::new(["V1"]);
        let error = decode(&obj("OBJ"), &[0x09, 1], &known).unwrap_err();
        assert_eq!(error.kind, DecodeErrorKind::UnknownEncoding(0x09));
    }

    #[test]
    fn test_invalid_flag() {
        let known = KnownProviders::new(["V1"]);
        let error = decode(&obj("OBJ"), &[ENCODING_FLAGS, 1, 5], &known).unwrap_err();
        assert_eq!(error.kind, DecodeErrorKind::InvalidFlag(5));
    }

    #[test]
    fn test_truncated_payload() {
        let known = KnownProviders::new(["V1"]);
        let mut payload = entries_payload(&[("V1", VARIANT_EDITABLE, "")]);
        payload.truncate(4);

        let error = decode(&obj("OBJ"), &payload, &known).unwrap_err();
        assert_eq!(error.kind, DecodeErrorKind::Truncated { offset: 4 });

        let error = decode(&obj("OBJ"), &[ENCODING_FLAGS, 1], &known).unwrap_err();
        assert_eq!(error.kind, DecodeErrorKind::Truncated { offset: 2 });
    }

    #[test]
    fn test_declared_count_exceeds_entries() {
        let known = KnownProviders::new(["V1"]);
        let mut payload = entries_payload(&[("V1", VARIANT_EDITABLE, "")]);
        payload[1] = 2;

        let error = decode(&obj("OBJ"), &payload, &known).unwrap_err();
        assert!(matches!(error.kind, DecodeErrorKind::Truncated { .. }));
    }

    #[test]
    fn test_trailing_bytes() {
        let known = KnownProviders::new(["V1"]);
        let error = decode(&obj("OBJ"), &[ENCODING_FLAG, 1, 0, 0], &known).unwrap_err();
        assert_eq!(error.kind, DecodeErrorKind::TrailingBytes(2));
    }

    #[test]
    fn test_invalid_utf8_provider() {
        let known = KnownProviders::new(["V1"]);
        let payload = vec![ENCODING_ENTRIES, 1, 0, 2, 0xff, 0xfe, VARIANT_LOCKED, 0];
        let error = decode(&obj("OBJ"), &payload, &known).unwrap_err();
        assert_eq!(error.kind, DecodeErrorKind::InvalidUtf8 { offset: 4 });
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let known = KnownProviders::new(["V1"]);
        let payload = entries_payload(&[("Ghost", VARIANT_LOCKED, "")]);
        let error = decode(&obj("OBJ"), &payload, &known).unwrap_err();
        assert_eq!(error.kind, DecodeErrorKind::UnknownProvider("Ghost".into()));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let known = KnownProviders::new(["V1", "V2"]);
        let payload =
            entries_payload(&[("V2", VARIANT_EDITABLE, "2"), ("V1", VARIANT_LOCKED, "1")]);
        let first = decode(&obj("OBJ"), &payload, &known).unwrap();
        let second = decode(&obj("OBJ"), &payload, &known).unwrap();
        assert_eq!(first, second);
    }
}
