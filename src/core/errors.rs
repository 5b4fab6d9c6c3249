/*!
# Error System

Ошибки разбора и разрешения данных поддержки. Каждая ошибка несёт
идентификатор объекта и/или поставщика, к которому относится, чтобы
вызывающая сторона могла показать точную диагностику.
*/

use thiserror::Error;

use crate::support::model::{ConfigurationObjectId, ProviderId};

/// Причина, по которой не удалось декодировать дескриптор объекта
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("payload truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("unknown encoding discriminant 0x{0:02x}")]
    UnknownEncoding(u8),

    #[error("unknown variant tag 0x{0:02x}")]
    UnknownVariantTag(u8),

    #[error("invalid flag value 0x{0:02x}")]
    InvalidFlag(u8),

    #[error("reference to unknown provider '{0}'")]
    UnknownProvider(ProviderId),

    #[error("legacy encoding without provider and no default provider is known")]
    NoDefaultProvider,

    #[error("invalid UTF-8 in string field at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

/// Дескриптор одного объекта повреждён
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot decode support data of object {object}: {kind}")]
pub struct DecodeError {
    pub object: ConfigurationObjectId,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(object: ConfigurationObjectId, kind: DecodeErrorKind) -> Self {
        Self { object, kind }
    }
}

/// Ошибка построения цепочки поставщиков
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainBuildError {
    #[error("provider '{provider}' appears twice in the support chain (positions {first} and {second})")]
    DuplicateProvider {
        provider: ProviderId,
        first: usize,
        second: usize,
    },
}

/// Ошибка вычисления статуса одного объекта
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("object {object} references provider '{provider}' absent from the support chain")]
    UnknownProvider {
        object: ConfigurationObjectId,
        provider: ProviderId,
    },

    #[error("records of objects {expected} and {found} were passed to one resolution")]
    MixedObjects {
        expected: ConfigurationObjectId,
        found: ConfigurationObjectId,
    },
}

/// Код поддержки объекта в ParentConfigurations.bin не распознан
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("object {object}: unknown support code {code} from provider '{provider}' in field {index}")]
pub struct SupportCodeError {
    pub object: ConfigurationObjectId,
    pub provider: ProviderId,
    pub index: usize,
    pub code: i64,
}

/// Причина, по которой объект получил статус "не определён"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupportFailure {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Code(#[from] SupportCodeError),
}

impl SupportFailure {
    pub fn object(&self) -> &ConfigurationObjectId {
        match self {
            SupportFailure::Decode(error) => &error.object,
            SupportFailure::Resolution(ResolutionError::UnknownProvider { object, .. }) => object,
            SupportFailure::Resolution(ResolutionError::MixedObjects { expected, .. }) => expected,
            SupportFailure::Code(error) => &error.object,
        }
    }
}

/// Ошибка построения индекса поддержки
#[derive(Error, Debug)]
pub enum IndexBuildError {
    #[error("strict build aborted: {0}")]
    Strict(SupportFailure),

    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Ошибка чтения файла настроек поставки (ParentConfigurations.bin)
#[derive(Error, Debug)]
pub enum SupportFileError {
    #[error("cannot read support file: {0}")]
    Io(#[from] std::io::Error),

    #[error("field {index} is missing, file ends after {len} fields")]
    MissingField { index: usize, len: usize },

    #[error("field {index} is not a number: '{value}'")]
    NotANumber { index: usize, value: String },
}

/// Любая ошибка построения индекса по файлу поставки
#[derive(Error, Debug)]
pub enum SupportError {
    #[error(transparent)]
    File(#[from] SupportFileError),

    #[error(transparent)]
    Chain(#[from] ChainBuildError),

    #[error(transparent)]
    Build(#[from] IndexBuildError),
}
