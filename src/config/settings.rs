use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Политика интерпретации 24-битного поля доступа объектов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxmemoryPolicy {
    Lru,
    Lfu,
}

/// Настройки движка.
///
/// Все поля имеют значения по умолчанию; загрузка из окружения
/// переопределяет их переменными с префиксом `LAVKA_`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Максимальная длина intset-кодирования множества до перехода в
    /// хеш-таблицу.
    pub set_max_intset_entries: usize,
    /// LRU или LFU.
    pub maxmemory_policy: MaxmemoryPolicy,
    /// Крутизна логарифмического LFU-счётчика.
    pub lfu_log_factor: u32,
    /// Период распада LFU-счётчика в минутах.
    pub lfu_decay_time: u32,
    /// Фоновое освобождение при серверных удалениях (DEL по пустому
    /// множеству, RENAME поверх существующего ключа и т.п.).
    pub lazyfree_lazy_server_del: bool,
    /// Фоновое освобождение при истечении ключей.
    pub lazyfree_lazy_expire: bool,
    /// Количество логических баз данных.
    pub dbnum: usize,
    /// Кластерный режим: включает slot-индекс и запрещает
    /// SELECT/MOVE/SWAPDB.
    pub cluster_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            set_max_intset_entries: 512,
            maxmemory_policy: MaxmemoryPolicy::Lru,
            lfu_log_factor: 10,
            lfu_decay_time: 1,
            lazyfree_lazy_server_del: false,
            lazyfree_lazy_expire: false,
            dbnum: 16,
            cluster_enabled: false,
        }
    }
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, поверх — переменные
    /// окружения с префиксом `LAVKA_`.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(Environment::with_prefix("LAVKA").try_parsing(true))
            .build()?;

        cfg.try_deserialize()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет значения по умолчанию.
    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.set_max_intset_entries, 512);
        assert_eq!(s.maxmemory_policy, MaxmemoryPolicy::Lru);
        assert_eq!(s.dbnum, 16);
        assert!(!s.cluster_enabled);
        assert!(!s.lazyfree_lazy_expire);
    }

    /// Тест проверяет загрузку без переменных окружения.
    #[test]
    fn load_without_env_gives_defaults() {
        let s = Settings::load().expect("load settings");
        assert_eq!(s.dbnum, Settings::default().dbnum);
    }
}
