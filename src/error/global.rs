use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Ошибки, которые команда возвращает клиенту синхронным ответом.
///
/// Текст `Display` — это каноническая строка ошибки протокола. Доменные
/// сигналы (отсутствующий ключ при чтении, дубликат при вставке) ошибками
/// не являются и сюда не попадают.
#[derive(Error, Debug)]
pub enum StoreError {
    // ==== Client protocol errors ====
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR invalid cursor")]
    InvalidCursor,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is out of range")]
    OutOfRange,

    #[error("ERR {0}")]
    InvalidDbIndex(String),

    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    // ==== Command errors ====
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR source and destination objects are the same")]
    SameObject,

    #[error("ERR {0} is not allowed in cluster mode")]
    NotAllowedInCluster(&'static str),

    #[error("ERR invalid expire time in {0}")]
    InvalidExpireTime(&'static str),

    // ==== Lifecycle ====
    /// Команда SHUTDOWN согласована с коллаборатором персистентности;
    /// завершение процесса — дело внешнего связующего кода.
    #[error("ERR server scheduled to shut down")]
    Shutdown,

    #[error("ERR Errors trying to SHUTDOWN. Check logs.")]
    ShutdownFailed,
}
