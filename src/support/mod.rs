/*!
# Support Data

Данные поддержки конфигурации 1С: от сырого дескриптора объекта до
итогового статуса в индексе.

```text
bytes -> decoder -> SupportRecord* -> resolver (+ ProviderChain) -> SupportIndex
ParentConfigurations.bin -> SupportSnapshot ---^
```
*/

pub mod chain;
pub mod decoder;
pub mod index;
pub mod model;
pub mod parent_configurations;
pub mod registry;
pub mod resolver;

pub use chain::ProviderChain;
pub use decoder::{decode, KnownProviders};
pub use index::{IndexEntry, ObjectPayload, SupportIndex, SupportIndexBuilder, SupportStatistics};
pub use model::{
    ConfigurationObjectId, EffectiveSupportStatus, ProviderId, Resolution, SupportProvider,
    SupportRecord, SupportVariant,
};
pub use parent_configurations::{
    parse_support_data, read_support_file, ObjectRecords, SupportSnapshot,
};
pub use registry::{root_for_support_file, SupportRegistry};
pub use resolver::resolve;
