/*!
# BSL Support

Reader and resolver for the support settings of 1C:Enterprise (BSL)
configurations: which vendor configuration governs each metadata object,
whether the object may be edited locally, and whether a vendor deleted it.

## Architecture

```text
BSL Support
├── Core      - error types, BOM-aware file reading
├── Support
│   ├── decoder                - per-object support descriptors (3 encodings)
│   ├── chain                  - ordered provider chain, nearest first
│   ├── resolver               - effective status from all provider claims
│   ├── index                  - immutable object -> status map, parallel build
│   ├── parent_configurations  - ParentConfigurations.bin reader
│   └── registry               - indexes by configuration root
└── Config    - build settings (TOML/YAML/JSON)
```

## Resolution rules

- No provider records: the object is local (`NotSupported`, editable).
- Walking from the nearest provider, the first `Deleted` or `Supported`
  claim decides the status; nearer customizations shadow upstream grants.
- Only `NotSupported` claims: the object is editable, the nearest
  provider is cited.
- Duplicate records of one provider: the last one in decode order wins.

## Usage

```rust,ignore
use bsl_support::{load_support_index, ConfigurationObjectId, SupportConfig};

let index = load_support_index("./src/Ext/ParentConfigurations.bin", &SupportConfig::default())?;
let object = ConfigurationObjectId::from("3c907782-1b24-440c-b0de-1d62cebde27b");
if !index.is_editable(&object) {
    println!("{} is locked: {}", object, index.status(&object));
}
```
*/

pub mod config;
pub mod core;
pub mod support;

pub use config::SupportConfig;
pub use crate::core::{
    ChainBuildError, DecodeError, DecodeErrorKind, IndexBuildError, ResolutionError,
    SupportCodeError, SupportError, SupportFailure, SupportFileError,
};
pub use support::{
    decode, parse_support_data, read_support_file, resolve, ConfigurationObjectId,
    EffectiveSupportStatus, KnownProviders, ObjectPayload, ProviderChain, ProviderId,
    Resolution, SupportIndex, SupportIndexBuilder, SupportProvider, SupportRecord,
    SupportRegistry, SupportSnapshot, SupportStatistics, SupportVariant,
};

use std::path::Path;

/// Read a ParentConfigurations.bin file and build its support index
pub fn load_support_index<P: AsRef<Path>>(
    path: P,
    config: &SupportConfig,
) -> Result<SupportIndex, SupportError> {
    let snapshot = read_support_file(path.as_ref())?;
    SupportIndex::from_snapshot_with(&snapshot, config)
}

/// Load every support file found under `root` into a registry keyed by
/// configuration root. Files that fail to load are logged and skipped.
pub fn load_registry<P: AsRef<Path>>(root: P, config: &SupportConfig) -> SupportRegistry {
    let mut registry = SupportRegistry::new();

    for file in crate::core::discover_support_files(root.as_ref()) {
        let Some(config_root) = support::root_for_support_file(&file) else {
            continue;
        };
        match load_support_index(&file, config) {
            Ok(index) => {
                registry.insert(config_root, index);
            }
            Err(e) => {
                tracing::error!("Failed to load support data from {}: {}", file.display(), e);
            }
        }
    }

    registry
}
