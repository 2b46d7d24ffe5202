//! Lavka — ядро in-memory хранилища ключ-значение.
//!
//! Основные модули:
//! - `command` — разбор и выполнение команд (SADD, SINTERSTORE, SCAN и др.)
//! - `config` — настройки движка
//! - `database` — встроенные структуры данных (Dict, IntSet, Sds, Object)
//! - `engine` — процессный контекст, коллабораторы, фоновое освобождение
//! - `error` — типы ошибок
//! - `keyspace` — логические базы: поиск, истечение, сканирование
//! - `logging` — инициализация логов

/// Разбор и выполнение команд: множества, пространство ключей, строки.
pub mod command;
/// Настройки движка.
pub mod config;
/// Встроенные структуры данных (Dict, IntSet, Sds, Object).
pub mod database;
/// Процессный контекст, коллабораторы и фоновое освобождение.
pub mod engine;
/// Типы ошибок.
pub mod error;
/// Логические базы данных: поиск, истечение, сканирование, ключи команд.
pub mod keyspace;
/// Инициализация логирования.
pub mod logging;

// -----------------------------------------------------------------------------
//  Часто используемые публичные типы
// -----------------------------------------------------------------------------

/// Реэкспорт диспетчера и основных команд.
pub use command::{
    dispatch, CallerOrigin, Command, CommandExecute, DbSizeCommand, DelCommand, ExistsCommand,
    FlushAllCommand, FlushDbCommand, GetCommand, KeysCommand, MoveCommand, RandomKeyCommand,
    RenameCommand, RenameNxCommand, Reply, SAddCommand, SCardCommand, SDiffCommand,
    SDiffStoreCommand, SInterCommand, SInterStoreCommand, SIsMemberCommand, SMembersCommand,
    SMoveCommand, SPopCommand, SRandMemberCommand, SRemCommand, SScanCommand, SUnionCommand,
    SUnionStoreCommand, ScanCommand, SelectCommand, Session, SetCommand, SwapDbCommand,
    TypeCommand, UnlinkCommand,
};

/// Реэкспорт встроенных структур данных.
pub use database::{Dict, DictIter, IntSet, ObjRef, Object, Sds, SetMember, SetValue, StrValue, Value};

/// Реэкспорт процессного контекста и контрактов коллабораторов.
pub use engine::{Caller, Hooks, LazyFree, RecordingHooks, Server, SlotIndex};

/// Реэкспорт основных типов ошибок.
pub use error::{StoreError, StoreResult};

/// Реэкспорт настроек.
pub use config::{MaxmemoryPolicy, Settings};
