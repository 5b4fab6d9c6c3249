//! Цепочка поставщиков: упорядоченный список от ближайшего к локальной
//! конфигурации (позиция 0) до самого удалённого поставщика.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::model::{ProviderId, SupportProvider};
use crate::core::errors::ChainBuildError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderChain {
    providers: Vec<SupportProvider>,
    #[serde(skip)]
    positions: HashMap<ProviderId, usize>,
}

impl ProviderChain {
    /// Строит цепочку по идентификаторам, первый - ближайший
    pub fn new<I, P>(ids: I) -> Result<Self, ChainBuildError>
    where
        I: IntoIterator<Item = P>,
        P: Into<ProviderId>,
    {
        Self::from_providers(ids.into_iter().map(SupportProvider::bare))
    }

    /// Строит цепочку по полным описаниям поставщиков
    pub fn from_providers<I>(providers: I) -> Result<Self, ChainBuildError>
    where
        I: IntoIterator<Item = SupportProvider>,
    {
        let providers: Vec<SupportProvider> = providers.into_iter().collect();
        let mut positions = HashMap::with_capacity(providers.len());

        for (position, provider) in providers.iter().enumerate() {
            if let Some(first) = positions.insert(provider.id.clone(), position) {
                return Err(ChainBuildError::DuplicateProvider {
                    provider: provider.id.clone(),
                    first,
                    second: position,
                });
            }
        }

        tracing::debug!("Support chain built: {} providers", providers.len());

        Ok(Self {
            providers,
            positions,
        })
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn position(&self, id: &ProviderId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn provider(&self, id: &ProviderId) -> Option<&SupportProvider> {
        self.position(id).map(|position| &self.providers[position])
    }

    /// `Less` - `a` ближе к локальной конфигурации, чем `b`.
    /// `None`, если хотя бы один из поставщиков не входит в цепочку.
    pub fn compare(&self, a: &ProviderId, b: &ProviderId) -> Option<Ordering> {
        Some(self.position(a)?.cmp(&self.position(b)?))
    }

    /// Поставщики от ближайшего к самому удалённому
    pub fn providers(&self) -> &[SupportProvider] {
        &self.providers
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProviderId> {
        self.providers.iter().map(|provider| &provider.id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Поставщик по идентификатору, а если такого нет, первый по имени
    pub fn find(&self, key: &str) -> Option<&SupportProvider> {
        self.providers
            .iter()
            .find(|provider| provider.id.as_str() == key)
            .or_else(|| self.providers.iter().find(|provider| provider.name == key))
    }

    /// Переупорядочивает цепочку по явному списку идентификаторов или имён.
    /// Имя выводит вперёд все одноимённые конфигурации в исходном порядке.
    /// Поставщики, не упомянутые в списке, сохраняют исходный порядок
    /// и идут после перечисленных.
    pub fn reordered<S: AsRef<str>>(&self, order: &[S]) -> Result<Self, ChainBuildError> {
        let mut listed: Vec<SupportProvider> = Vec::with_capacity(self.providers.len());
        for key in order {
            let key = key.as_ref();
            let matched: Vec<&SupportProvider> = self
                .providers
                .iter()
                .filter(|provider| provider.matches(key))
                .collect();
            if matched.is_empty() {
                listed.push(SupportProvider::bare(key));
            } else {
                listed.extend(matched.into_iter().cloned());
            }
        }
        let rest = self
            .providers
            .iter()
            .filter(|provider| !order.iter().any(|key| provider.matches(key.as_ref())))
            .cloned();
        Self::from_providers(listed.into_iter().chain(rest))
    }
}
