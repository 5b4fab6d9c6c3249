/*!
# Status Resolver

Вычисляет итоговый статус поддержки объекта по всем записям поставщиков.

Правила:
1. Нет записей - объект локальный (`NotSupported`, редактируется).
2. Записи упорядочиваются по близости поставщика (ближайший первым).
   Несколько записей одного поставщика - действует последняя по порядку
   декодирования.
3. Обход от ближайшего поставщика: первая встреченная запись `Deleted`
   или `Supported` определяет результат. Удаление, заявленное не дальше
   ближайшей поставки, помечает объект удалённым.
4. Если ни один поставщик не заявил поддержку или удаление, объект
   `NotSupported` (редактируется), в статусе указывается ближайший
   поставщик, оставивший запись.
*/

use std::collections::BTreeMap;

use super::chain::ProviderChain;
use super::model::{EffectiveSupportStatus, SupportRecord, SupportVariant};
use crate::core::errors::ResolutionError;

/// Разрешает статус одного объекта. Чистая функция от записей и цепочки.
pub fn resolve(
    records: &[SupportRecord],
    chain: &ProviderChain,
) -> Result<EffectiveSupportStatus, ResolutionError> {
    let Some(first) = records.first() else {
        return Ok(EffectiveSupportStatus::local());
    };

    // позиция в цепочке -> последняя запись этого поставщика
    let mut by_position: BTreeMap<usize, &SupportRecord> = BTreeMap::new();
    for record in records {
        if record.object != first.object {
            return Err(ResolutionError::MixedObjects {
                expected: first.object.clone(),
                found: record.object.clone(),
            });
        }
        let position = chain
            .position(&record.provider)
            .ok_or_else(|| ResolutionError::UnknownProvider {
                object: record.object.clone(),
                provider: record.provider.clone(),
            })?;
        by_position.insert(position, record);
    }

    let decisive = by_position
        .values()
        .find(|record| record.variant != SupportVariant::NotSupported);

    let status = match decisive {
        Some(record) => EffectiveSupportStatus::from_record(record),
        None => {
            // by_position не пуст: в нём есть хотя бы запись `first`
            let nearest = by_position.values().next().copied().unwrap_or(first);
            EffectiveSupportStatus::from_record(nearest)
        }
    };

    Ok(status)
}
