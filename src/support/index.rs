/*!
# Support Index

Неизменяемое отображение "объект -> итоговый статус поддержки" для одного
снимка конфигурации. Строится целиком: каждый объект декодируется и
разрешается независимо, поэтому построение распараллеливается пулом
`rayon` без блокировок. Новый снимок - новый индекс.

По умолчанию построение "максимально полное": объект с повреждёнными
данными получает статус [`Resolution::Unresolved`], остальные объекты
строятся как обычно. В строгом режиме построение прерывается на первом
повреждённом объекте (в порядке входных данных).
*/

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};

use super::chain::ProviderChain;
use super::decoder::{decode, KnownProviders};
use super::model::{
    ConfigurationObjectId, EffectiveSupportStatus, ProviderId, SupportRecord, SupportVariant,
};
use super::parent_configurations::{ObjectRecords, SupportSnapshot};
use super::resolver::resolve;
use crate::config::SupportConfig;
use crate::core::errors::{IndexBuildError, SupportError, SupportFailure};

/// Сырой дескриптор поддержки одного объекта
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPayload {
    pub object: ConfigurationObjectId,
    pub payload: Vec<u8>,
}

impl ObjectPayload {
    pub fn new(object: impl Into<ConfigurationObjectId>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            object: object.into(),
            payload: payload.into(),
        }
    }
}

/// Данные одного объекта в индексе
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub status: EffectiveSupportStatus,
    /// Заявки поставщиков в порядке декодирования
    pub records: Vec<SupportRecord>,
    pub failure: Option<SupportFailure>,
}

/// Сводка по индексу
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportStatistics {
    pub total_objects: usize,
    pub supported_editable: usize,
    pub supported_read_only: usize,
    pub deleted: usize,
    pub not_supported: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SupportIndex {
    chain: ProviderChain,
    entries: HashMap<ConfigurationObjectId, IndexEntry>,
}

impl SupportIndex {
    /// Индекс снимка ParentConfigurations.bin с параметрами по умолчанию
    pub fn from_snapshot(snapshot: &SupportSnapshot) -> Result<Self, SupportError> {
        Self::from_snapshot_with(snapshot, &SupportConfig::default())
    }

    /// Индекс снимка с учётом настроек: явный порядок цепочки, строгий
    /// режим, размер пула
    pub fn from_snapshot_with(
        snapshot: &SupportSnapshot,
        config: &SupportConfig,
    ) -> Result<Self, SupportError> {
        let mut chain = snapshot.chain()?;
        if !config.provider_order.is_empty() {
            chain = chain.reordered(&config.provider_order)?;
        }
        Ok(SupportIndexBuilder::from_config(chain, config).build_from_records(&snapshot.objects)?)
    }

    /// Статус объекта. Объект, не встречавшийся при построении, ведёт себя
    /// как полностью локальный: так же, как объект без записей поставщиков.
    pub fn status(&self, object: &ConfigurationObjectId) -> EffectiveSupportStatus {
        self.entries
            .get(object)
            .map(|entry| entry.status.clone())
            .unwrap_or_default()
    }

    pub fn is_editable(&self, object: &ConfigurationObjectId) -> bool {
        self.status(object).editable
    }

    pub fn entry(&self, object: &ConfigurationObjectId) -> Option<&IndexEntry> {
        self.entries.get(object)
    }

    /// Все заявки поставщиков по объекту
    pub fn records(&self, object: &ConfigurationObjectId) -> &[SupportRecord] {
        self.entries
            .get(object)
            .map(|entry| entry.records.as_slice())
            .unwrap_or(&[])
    }

    /// Заявка конкретного поставщика; `NotSupported`, если заявки нет
    pub fn variant_for(
        &self,
        object: &ConfigurationObjectId,
        provider: &ProviderId,
    ) -> SupportVariant {
        self.records(object)
            .iter()
            .rev()
            .find(|record| &record.provider == provider)
            .map(|record| record.variant)
            .unwrap_or(SupportVariant::NotSupported)
    }

    pub fn failure(&self, object: &ConfigurationObjectId) -> Option<&SupportFailure> {
        self.entries.get(object).and_then(|entry| entry.failure.as_ref())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SupportFailure> {
        self.entries.values().filter_map(|entry| entry.failure.as_ref())
    }

    /// Объекты, статус которых определяет данный поставщик
    pub fn objects_governed_by(&self, provider: &ProviderId) -> Vec<&ConfigurationObjectId> {
        let mut objects: Vec<&ConfigurationObjectId> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.status.provider.as_ref() == Some(provider)
                    && entry.status.variant != SupportVariant::NotSupported
            })
            .map(|(object, _)| object)
            .collect();
        objects.sort();
        objects
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConfigurationObjectId, &EffectiveSupportStatus)> {
        self.entries.iter().map(|(object, entry)| (object, &entry.status))
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statistics(&self) -> SupportStatistics {
        let mut stats = SupportStatistics {
            total_objects: self.entries.len(),
            ..SupportStatistics::default()
        };
        for entry in self.entries.values() {
            if entry.status.is_unresolved() {
                stats.unresolved += 1;
                continue;
            }
            match entry.status.variant {
                SupportVariant::Supported { editable: true } => stats.supported_editable += 1,
                SupportVariant::Supported { editable: false } => stats.supported_read_only += 1,
                SupportVariant::Deleted => stats.deleted += 1,
                SupportVariant::NotSupported => stats.not_supported += 1,
            }
        }
        stats
    }
}

type Outcome = Result<(Vec<SupportRecord>, EffectiveSupportStatus), SupportFailure>;

/// Построитель индекса поддержки
#[derive(Debug, Clone)]
pub struct SupportIndexBuilder {
    chain: ProviderChain,
    known: KnownProviders,
    strict: bool,
    workers: Option<usize>,
}

impl SupportIndexBuilder {
    pub fn new(chain: ProviderChain) -> Self {
        let known = KnownProviders::from(&chain);
        Self {
            chain,
            known,
            strict: false,
            workers: None,
        }
    }

    pub fn from_config(chain: ProviderChain, config: &SupportConfig) -> Self {
        let mut builder = Self::new(chain).strict(config.strict);
        if let Some(workers) = config.workers {
            builder = builder.workers(workers);
        }
        if let Some(key) = &config.default_provider {
            let provider = builder
                .chain
                .find(key)
                .map(|provider| provider.id.clone())
                .unwrap_or_else(|| ProviderId::from(key.as_str()));
            builder = builder.default_provider(provider);
        }
        builder
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// 0 - по числу ядер
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Поставщик для устаревших кодировок без поставщика
    pub fn default_provider(mut self, provider: impl Into<ProviderId>) -> Self {
        self.known = self.known.with_default(provider);
        self
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Строит индекс из сырых дескрипторов. Несколько дескрипторов одного
    /// объекта объединяются в порядке следования.
    pub fn build(&self, payloads: &[ObjectPayload]) -> Result<SupportIndex, IndexBuildError> {
        let started = Instant::now();

        let mut positions: HashMap<&ConfigurationObjectId, usize> = HashMap::new();
        let mut groups: Vec<(&ConfigurationObjectId, Vec<&[u8]>)> = Vec::new();
        for payload in payloads {
            match positions.get(&payload.object) {
                Some(&position) => groups[position].1.push(payload.payload.as_slice()),
                None => {
                    positions.insert(&payload.object, groups.len());
                    groups.push((&payload.object, vec![payload.payload.as_slice()]));
                }
            }
        }

        let outcomes: Vec<(ConfigurationObjectId, Outcome)> = self.run(|| {
            groups
                .par_iter()
                .map(|(object, chunks)| {
                    ((*object).clone(), self.decode_and_resolve(object, chunks))
                })
                .collect()
        })?;

        self.assemble(outcomes, started)
    }

    /// Строит индекс из уже декодированных записей. Объект, прочитанный с
    /// ошибкой, не разрешается и подчиняется тому же режиму, что и
    /// повреждённый дескриптор.
    pub fn build_from_records(
        &self,
        objects: &[ObjectRecords],
    ) -> Result<SupportIndex, IndexBuildError> {
        let started = Instant::now();

        let outcomes: Vec<(ConfigurationObjectId, Outcome)> = self.run(|| {
            objects
                .par_iter()
                .map(|object| {
                    let outcome = match &object.failure {
                        Some(failure) => Err(failure.clone()),
                        None => resolve(&object.records, &self.chain)
                            .map(|status| (object.records.clone(), status))
                            .map_err(SupportFailure::from),
                    };
                    (object.object.clone(), outcome)
                })
                .collect()
        })?;

        self.assemble(outcomes, started)
    }

    fn decode_and_resolve(&self, object: &ConfigurationObjectId, chunks: &[&[u8]]) -> Outcome {
        let mut records = Vec::new();
        for chunk in chunks {
            records.extend(decode(object, chunk, &self.known)?);
        }
        let status = resolve(&records, &self.chain)?;
        Ok((records, status))
    }

    fn run<T, F>(&self, job: F) -> Result<T, IndexBuildError>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        let workers = match self.workers {
            Some(workers) if workers > 0 => workers,
            _ => num_cpus::get(),
        };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
        Ok(pool.install(job))
    }

    fn assemble(
        &self,
        outcomes: Vec<(ConfigurationObjectId, Outcome)>,
        started: Instant,
    ) -> Result<SupportIndex, IndexBuildError> {
        let mut entries = HashMap::with_capacity(outcomes.len());
        let mut failed = 0usize;

        for (object, outcome) in outcomes {
            let entry = match outcome {
                Ok((records, status)) => IndexEntry {
                    status,
                    records,
                    failure: None,
                },
                Err(failure) if self.strict => return Err(IndexBuildError::Strict(failure)),
                Err(failure) => {
                    warn!("Object {} marked unresolved: {}", object, failure);
                    failed += 1;
                    IndexEntry {
                        status: EffectiveSupportStatus::unresolved(),
                        records: Vec::new(),
                        failure: Some(failure),
                    }
                }
            };
            entries.insert(object, entry);
        }

        info!(
            "Support index built: {} objects, {} unresolved, {} providers (in {:?})",
            entries.len(),
            failed,
            self.chain.len(),
            started.elapsed()
        );

        Ok(SupportIndex {
            chain: self.chain.clone(),
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{DecodeErrorKind, ResolutionError, SupportCodeError};
    use crate::support::model::SupportProvider;
    use crate::support::decoder::tests::entries_payload;
    use crate::support::decoder::{ENCODING_FLAG, VARIANT_DELETED, VARIANT_EDITABLE, VARIANT_LOCKED};
    use pretty_assertions::assert_eq;

    fn id(value: &str) -> ConfigurationObjectId {
        ConfigurationObjectId::from(value)
    }

    fn local_vendor() -> ProviderChain {
        ProviderChain::new(["Local", "Vendor"]).unwrap()
    }

    #[test]
    fn test_unseen_object_defaults_to_local() {
        let index = SupportIndexBuilder::new(local_vendor()).build(&[]).unwrap();

        assert!(index.is_empty());
        assert_eq!(index.status(&id("never-seen")), EffectiveSupportStatus::local());
        assert!(index.is_editable(&id("never-seen")));
    }

    #[test]
    fn test_observed_without_records_matches_unseen() {
        let index = SupportIndexBuilder::new(local_vendor())
            .build(&[ObjectPayload::new("EMPTY", Vec::new())])
            .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.status(&id("EMPTY")), index.status(&id("never-seen")));
    }

    #[test]
    fn test_best_effort_marks_unresolved() {
        let payloads = vec![
            ObjectPayload::new("OBJ-1", entries_payload(&[("Vendor", VARIANT_LOCKED, "")])),
            ObjectPayload::new("OBJ-3", entries_payload(&[("Vendor", 0x42, "")])),
            ObjectPayload::new("OBJ-4", entries_payload(&[("Local", VARIANT_EDITABLE, "")])),
        ];

        let index = SupportIndexBuilder::new(local_vendor()).workers(2).build(&payloads).unwrap();

        assert_eq!(index.len(), 3);
        assert!(!index.is_editable(&id("OBJ-1")));
        assert!(index.is_editable(&id("OBJ-4")));

        let broken = index.status(&id("OBJ-3"));
        assert!(broken.is_unresolved());
        assert!(!broken.editable);
        match index.failure(&id("OBJ-3")) {
            Some(SupportFailure::Decode(error)) => {
                assert_eq!(error.object, id("OBJ-3"));
                assert_eq!(error.kind, DecodeErrorKind::UnknownVariantTag(0x42));
            }
            other => panic!("unexpected failure: {:?}", other),
        }
        assert_eq!(index.failures().count(), 1);
    }

    #[test]
    fn test_strict_mode_aborts() {
        let payloads = vec![
            ObjectPayload::new("OBJ-1", entries_payload(&[("Vendor", VARIANT_LOCKED, "")])),
            ObjectPayload::new("OBJ-3", vec![0x09]),
        ];

        let error = SupportIndexBuilder::new(local_vendor())
            .strict(true)
            .build(&payloads)
            .unwrap_err();

        match error {
            IndexBuildError::Strict(failure) => assert_eq!(failure.object(), &id("OBJ-3")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_payloads_of_one_object_are_merged() {
        let payloads = vec![
            ObjectPayload::new("OBJ", entries_payload(&[("Vendor", VARIANT_EDITABLE, "")])),
            ObjectPayload::new("OBJ", entries_payload(&[("Local", VARIANT_DELETED, "")])),
        ];

        let index = SupportIndexBuilder::new(local_vendor()).build(&payloads).unwrap();

        assert_eq!(index.records(&id("OBJ")).len(), 2);
        assert!(index.status(&id("OBJ")).is_deleted());
        assert_eq!(
            index.variant_for(&id("OBJ"), &"Vendor".into()),
            SupportVariant::Supported { editable: true }
        );
        assert_eq!(
            index.variant_for(&id("OBJ"), &"Nobody".into()),
            SupportVariant::NotSupported
        );
    }

    #[test]
    fn test_legacy_payload_with_configured_default() {
        let config = SupportConfig {
            default_provider: Some("Vendor".to_string()),
            ..SupportConfig::default()
        };
        let index = SupportIndexBuilder::from_config(local_vendor(), &config)
            .build(&[ObjectPayload::new("OLD", vec![ENCODING_FLAG, 1])])
            .unwrap();

        let status = index.status(&id("OLD"));
        assert_eq!(status.provider, Some(ProviderId::from("Vendor")));
        assert!(!status.editable);
    }

    #[test]
    fn test_build_from_records_reports_unknown_provider() {
        let objects = vec![ObjectRecords::new(
            id("OBJ"),
            vec![SupportRecord::new(id("OBJ"), "Ghost".into(), SupportVariant::Deleted)],
        )];

        let index = SupportIndexBuilder::new(local_vendor())
            .build_from_records(&objects)
            .unwrap();

        assert!(matches!(
            index.failure(&id("OBJ")),
            Some(SupportFailure::Resolution(ResolutionError::UnknownProvider { .. }))
        ));
    }

    #[test]
    fn test_statistics_and_governed_objects() {
        let payloads = vec![
            ObjectPayload::new("A", entries_payload(&[("Vendor", VARIANT_LOCKED, "")])),
            ObjectPayload::new("B", entries_payload(&[("Vendor", VARIANT_EDITABLE, "")])),
            ObjectPayload::new("C", entries_payload(&[("Local", VARIANT_DELETED, "")])),
            ObjectPayload::new("D", entries_payload(&[("Vendor", 0x00, "")])),
            ObjectPayload::new("E", vec![0xff]),
        ];

        let index = SupportIndexBuilder::new(local_vendor()).build(&payloads).unwrap();

        assert_eq!(
            index.statistics(),
            SupportStatistics {
                total_objects: 5,
                supported_editable: 1,
                supported_read_only: 1,
                deleted: 1,
                not_supported: 1,
                unresolved: 1,
            }
        );
        assert_eq!(index.objects_governed_by(&"Vendor".into()), vec![&id("A"), &id("B")]);
    }

    fn objects_with_bad_code() -> Vec<ObjectRecords> {
        let good = ObjectRecords::new(
            id("G1"),
            vec![SupportRecord::new(
                id("G1"),
                "Vendor".into(),
                SupportVariant::Supported { editable: false },
            )],
        );
        let mut bad = ObjectRecords::new(id("G2"), Vec::new());
        bad.failure = Some(
            SupportCodeError {
                object: id("G2"),
                provider: "Vendor".into(),
                index: 14,
                code: 9,
            }
            .into(),
        );
        vec![good, bad]
    }

    #[test]
    fn test_bad_support_code_marks_only_its_object() {
        let index = SupportIndexBuilder::new(local_vendor())
            .build_from_records(&objects_with_bad_code())
            .unwrap();

        assert_eq!(
            index.status(&id("G1")).variant,
            SupportVariant::Supported { editable: false }
        );
        assert!(index.status(&id("G2")).is_unresolved());
        assert!(matches!(
            index.failure(&id("G2")),
            Some(SupportFailure::Code(error)) if error.code == 9
        ));
        assert_eq!(index.statistics().unresolved, 1);
    }

    #[test]
    fn test_bad_support_code_aborts_strict_build() {
        let error = SupportIndexBuilder::new(local_vendor())
            .strict(true)
            .build_from_records(&objects_with_bad_code())
            .unwrap_err();

        match error {
            IndexBuildError::Strict(failure) => assert_eq!(failure.object(), &id("G2")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_default_provider_by_configuration_name() {
        let chain = ProviderChain::from_providers([
            SupportProvider::configuration("Доработка", "Local", "1.0"),
            SupportProvider::configuration("БСП", "Vendor", "3.1"),
        ])
        .unwrap();
        let bsp = chain.providers()[1].id.clone();
        let config = SupportConfig {
            default_provider: Some("БСП".to_string()),
            ..SupportConfig::default()
        };

        let index = SupportIndexBuilder::from_config(chain, &config)
            .build(&[ObjectPayload::new("OLD", vec![ENCODING_FLAG, 1])])
            .unwrap();

        assert_eq!(index.status(&id("OLD")).provider, Some(bsp));
    }

    #[test]
    fn test_default_provider_outside_chain_is_unresolved() {
        let config = SupportConfig {
            default_provider: Some("Elsewhere".to_string()),
            ..SupportConfig::default()
        };

        let index = SupportIndexBuilder::from_config(local_vendor(), &config)
            .build(&[ObjectPayload::new("OLD", vec![ENCODING_FLAG, 1])])
            .unwrap();

        assert!(matches!(
            index.failure(&id("OLD")),
            Some(SupportFailure::Decode(error))
                if error.kind == DecodeErrorKind::UnknownProvider("Elsewhere".into())
        ));
    }
}
