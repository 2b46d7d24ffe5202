//! Процессное состояние движка.
//!
//! Всё, что в однопоточном ядре было бы глобалями (счётчик изменений,
//! статистика, флаги репликации, коллабораторы), собрано в один контекст
//! и явно протаскивается через API кейспейса.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    config::{MaxmemoryPolicy, Settings},
    database::{
        object::{lfu_time_minutes, lru_clock, LFU_INIT_VAL},
        Dict, ObjRef, Object, Sds, Value,
    },
    keyspace::db::Db,
};

use super::{hooks::Hooks, hooks::SlotIndex, lazyfree::LazyFree};

/// Кто исполняет текущую команду. Нужен ровно в одном месте: реплика
/// маскирует логически истёкшие ключи от обычных read-only клиентов, но
/// не от канала репликации с мастера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Канал репликации с мастера.
    MasterLink,
    /// Обычный клиент; `readonly_command` — флаг текущей команды.
    Client { readonly_command: bool },
}

/// Контекст сервера: логические базы, настройки, счётчики и коллабораторы.
pub struct Server {
    pub config: Settings,
    pub dbs: Vec<Db>,

    /// Монотонный счётчик изменивших данные эффектов; по нему коллаборатор
    /// персистентности решает, когда снимать снапшот.
    pub dirty: u64,
    pub stat_keyspace_hits: u64,
    pub stat_keyspace_misses: u64,
    pub stat_expired_keys: u64,
    /// Момент последнего успешного снапшота, unix-секунды.
    pub lastsave: i64,

    /// Сервер загружает датасет: истечение ключей отложено.
    pub loading: bool,
    /// Адрес мастера; `Some` означает, что мы реплика.
    pub master_host: Option<String>,
    /// Реплика в read-only режиме.
    pub repl_slave_ro: bool,
    /// Активен фоновый потомок персистентности: обновления поля доступа
    /// подавляются, чтобы не пачкать copy-on-write страницы.
    pub has_saving_child: bool,
    /// Замороженные часы скриптового хоста: ключ не истекает посреди
    /// скрипта.
    pub script_time_ms: Option<i64>,
    /// Включённые классы событий кейспейса.
    pub notify_flags: u32,
    /// Исполнитель текущей команды.
    pub current_caller: Caller,

    /// Slot-индекс кластера; `None` вне кластерного режима.
    pub cluster: Option<SlotIndex>,
    /// Ключи с истечением, выставленным записываемой репликой: бит на
    /// базу, максимум 64 базы.
    pub slave_keys_with_expire: Dict<Sds, u64>,

    pub hooks: Hooks,
    pub lazyfree: LazyFree,

    /// Фиксированные часы для детерминированных тестов.
    pub fixed_time_ms: Option<i64>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Server {
    /// Создаёт контекст с пустыми базами по настройкам.
    pub fn new(config: Settings) -> Self {
        let dbs = (0..config.dbnum).map(Db::new).collect();
        let cluster = config.cluster_enabled.then(SlotIndex::new);

        Server {
            config,
            dbs,
            dirty: 0,
            stat_keyspace_hits: 0,
            stat_keyspace_misses: 0,
            stat_expired_keys: 0,
            lastsave: 0,
            loading: false,
            master_host: None,
            repl_slave_ro: true,
            has_saving_child: false,
            script_time_ms: None,
            notify_flags: 0,
            current_caller: Caller::Client {
                readonly_command: false,
            },
            cluster,
            slave_keys_with_expire: Dict::new(),
            hooks: Hooks::default(),
            lazyfree: LazyFree::spawn(),
            fixed_time_ms: None,
        }
    }

    /// Текущее время в миллисекундах unix.
    pub fn mstime(&self) -> i64 {
        if let Some(fixed) = self.fixed_time_ms {
            return fixed;
        }

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Время для проверок истечения: внутри скрипта оно заморожено на
    /// момент его старта.
    pub fn logical_now_ms(&self) -> i64 {
        self.script_time_ms.unwrap_or_else(|| self.mstime())
    }

    /// Возвращает `true`, если сервер — реплика.
    #[inline]
    pub fn is_replica(&self) -> bool {
        self.master_host.is_some()
    }

    /// Создаёт объект с корректным начальным полем доступа под текущую
    /// политику вытеснения.
    pub fn new_object(
        &self,
        value: Value,
    ) -> ObjRef {
        let obj = Object::new(value);
        match self.config.maxmemory_policy {
            MaxmemoryPolicy::Lfu => {
                obj.set_lfu(lfu_time_minutes(self.mstime()), LFU_INIT_VAL);
            }
            MaxmemoryPolicy::Lru => {
                obj.set_lru(lru_clock(self.mstime()));
            }
        }
        Arc::new(obj)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
