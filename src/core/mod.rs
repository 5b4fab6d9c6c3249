/*!
# Core Module

Error types shared by the decoder, chain, resolver and index,
plus BOM-aware file reading.
*/

pub mod errors;
pub mod fs_utils;

pub use errors::{
    ChainBuildError, DecodeError, DecodeErrorKind, IndexBuildError, ResolutionError,
    SupportCodeError, SupportError, SupportFailure, SupportFileError,
};
pub use fs_utils::{decode_text, discover_support_files, read_text_file, SUPPORT_FILE_NAME};
