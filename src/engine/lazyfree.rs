//! Фоновое освобождение значений.
//!
//! Дорогие деструкторы (большие множества, целые таблицы после FLUSH
//! ASYNC) уезжают в выделенный поток, чтобы командный цикл не вставал.
//! Передача владения синхронная; поток-приёмник никогда не трогает
//! структуры кейспейса, он только даёт деструкторам отработать.

use std::sync::mpsc::{self, SyncSender, TrySendError};

use crate::database::{Dict, ObjRef, Sds};

/// Ёмкость канала. Достаточно для всплесков, при переполнении падаем на
/// освобождение на месте.
const DROP_CHANNEL_CAPACITY: usize = 4096;

/// Единицы работы фонового потока. Поля никогда не читаются: смысл в том,
/// чтобы деструкторы отработали на принимающей стороне.
#[allow(dead_code)]
enum Droppable {
    /// Значение, выбывшее из кейспейса (UNLINK, ленивое истечение).
    Object(ObjRef),
    /// Таблицы целой базы после FLUSHDB/FLUSHALL ASYNC.
    Tables(Dict<Sds, ObjRef>, Dict<Sds, i64>),
}

/// Клонируемый хэндл фонового освобождения.
///
/// Когда все хэндлы сброшены, канал закрывается и поток завершается сам.
#[derive(Clone)]
pub struct LazyFree {
    tx: SyncSender<Droppable>,
}

impl LazyFree {
    /// Запускает фоновый поток и возвращает хэндл.
    ///
    /// Если поток не поднялся, канал сразу отключён и все передачи
    /// молча откатываются к освобождению на месте.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::sync_channel::<Droppable>(DROP_CHANNEL_CAPACITY);

        if let Err(e) = std::thread::Builder::new()
            .name("lavka-lazyfree".into())
            .spawn(move || {
                // Просто выгребаем канал: каждый recv освобождает память.
                while rx.recv().is_ok() {}
                tracing::debug!("lazyfree thread exits");
            })
        {
            tracing::warn!("failed to spawn lazyfree thread, values will be freed inline: {e}");
        }

        Self { tx }
    }

    /// Передаёт объект фоновому потоку. Никогда не блокирует: при полном
    /// канале объект освобождается на месте.
    pub fn defer_object(
        &self,
        obj: ObjRef,
    ) {
        match self.tx.try_send(Droppable::Object(obj)) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) | Err(TrySendError::Disconnected(item)) => drop(item),
        }
    }

    /// Передаёт таблицы целой базы фоновому потоку.
    pub fn defer_tables(
        &self,
        main: Dict<Sds, ObjRef>,
        expires: Dict<Sds, i64>,
    ) {
        match self.tx.try_send(Droppable::Tables(main, expires)) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) | Err(TrySendError::Disconnected(item)) => drop(item),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
