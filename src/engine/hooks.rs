//! Контракты внешних коллабораторов движка.
//!
//! Ядро не знает ни о сети, ни о формате AOF, ни о клиентах MULTI/WATCH:
//! оно лишь дергает эти трейты в документированных точках. Все контракты
//! имеют no-op реализацию по умолчанию и записывающие дублёры для тестов.

use std::{
    collections::BTreeMap,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};

use crate::database::Sds;

/// Количество слотов кластера.
pub const CLUSTER_SLOTS: u16 = 16_384;

/// Команда, переданная в AOF и поток репликации.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagatedCommand {
    pub db_id: usize,
    pub argv: Vec<Sds>,
}

/// Событие кейспейса, дошедшее до коллаборатора уведомлений.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceEvent {
    pub class: u32,
    pub event: String,
    pub key: Sds,
    pub db_id: usize,
}

/// Приёмник исходящего потока изменений (AOF + реплики).
pub trait PropagationSink {
    fn feed(
        &mut self,
        db_id: usize,
        argv: &[Sds],
    );
}

/// Приёмник типизированных событий кейспейса.
pub trait NotificationSink {
    fn notify(
        &mut self,
        class: u32,
        event: &str,
        key: &Sds,
        db_id: usize,
    );
}

/// Коллаборатор WATCH: извещается о каждом изменённом ключе и о сбросе
/// базы (`db_id == -1` означает все базы).
pub trait WatchHooks {
    fn touch_watched_key(
        &mut self,
        db_id: usize,
        key: &Sds,
    );

    fn touch_on_flush(
        &mut self,
        db_id: i64,
    );
}

/// Коллаборатор блокирующих списочных команд.
pub trait ListBlockingHooks {
    fn signal_ready(
        &mut self,
        db_id: usize,
        key: &Sds,
    );
}

/// Коллаборатор персистентности.
pub trait PersistenceHooks {
    /// Согласование SHUTDOWN. `save` — просили ли финальный снапшот.
    /// `false` означает, что останавливаться нельзя.
    fn prepare_for_shutdown(
        &mut self,
        save: bool,
    ) -> bool;

    /// FLUSHALL: убить фонового снапшотирующего потомка и, если настроены
    /// точки сохранения, снять свежий снапшот.
    fn on_flushall(&mut self);
}

/// No-op реализация всех контрактов; используется по умолчанию.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl PropagationSink for NullHooks {
    fn feed(
        &mut self,
        _db_id: usize,
        _argv: &[Sds],
    ) {
    }
}

impl NotificationSink for NullHooks {
    fn notify(
        &mut self,
        _class: u32,
        _event: &str,
        _key: &Sds,
        _db_id: usize,
    ) {
    }
}

impl WatchHooks for NullHooks {
    fn touch_watched_key(
        &mut self,
        _db_id: usize,
        _key: &Sds,
    ) {
    }

    fn touch_on_flush(
        &mut self,
        _db_id: i64,
    ) {
    }
}

impl ListBlockingHooks for NullHooks {
    fn signal_ready(
        &mut self,
        _db_id: usize,
        _key: &Sds,
    ) {
    }
}

impl PersistenceHooks for NullHooks {
    fn prepare_for_shutdown(
        &mut self,
        _save: bool,
    ) -> bool {
        true
    }

    fn on_flushall(&mut self) {}
}

/// Набор коллабораторов, которым движок отдаёт исходящие сигналы.
pub struct Hooks {
    pub propagation: Box<dyn PropagationSink + Send>,
    pub notify: Box<dyn NotificationSink + Send>,
    pub watch: Box<dyn WatchHooks + Send>,
    pub blocking: Box<dyn ListBlockingHooks + Send>,
    pub persistence: Box<dyn PersistenceHooks + Send>,
}

impl Default for Hooks {
    fn default() -> Self {
        Hooks {
            propagation: Box::new(NullHooks),
            notify: Box::new(NullHooks),
            watch: Box::new(NullHooks),
            blocking: Box::new(NullHooks),
            persistence: Box::new(NullHooks),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Записывающие дублёры
////////////////////////////////////////////////////////////////////////////////

/// Общий журнал записывающего дублёра: хэндл остаётся у теста, сам дублёр
/// уходит в `Hooks` боксом.
pub type RecordedLog<T> = Arc<Mutex<Vec<T>>>;

/// Записывает всё, что в него сигналят. Один тип покрывает все контракты.
#[derive(Debug, Default, Clone)]
pub struct RecordingHooks {
    pub propagated: RecordedLog<PropagatedCommand>,
    pub events: RecordedLog<KeyspaceEvent>,
    pub touched: RecordedLog<(usize, Sds)>,
    pub flushed: RecordedLog<i64>,
    pub ready: RecordedLog<(usize, Sds)>,
}

impl PropagationSink for RecordingHooks {
    fn feed(
        &mut self,
        db_id: usize,
        argv: &[Sds],
    ) {
        self.propagated.lock().unwrap().push(PropagatedCommand {
            db_id,
            argv: argv.to_vec(),
        });
    }
}

impl NotificationSink for RecordingHooks {
    fn notify(
        &mut self,
        class: u32,
        event: &str,
        key: &Sds,
        db_id: usize,
    ) {
        self.events.lock().unwrap().push(KeyspaceEvent {
            class,
            event: event.to_string(),
            key: key.clone(),
            db_id,
        });
    }
}

impl WatchHooks for RecordingHooks {
    fn touch_watched_key(
        &mut self,
        db_id: usize,
        key: &Sds,
    ) {
        self.touched.lock().unwrap().push((db_id, key.clone()));
    }

    fn touch_on_flush(
        &mut self,
        db_id: i64,
    ) {
        self.flushed.lock().unwrap().push(db_id);
    }
}

impl ListBlockingHooks for RecordingHooks {
    fn signal_ready(
        &mut self,
        db_id: usize,
        key: &Sds,
    ) {
        self.ready.lock().unwrap().push((db_id, key.clone()));
    }
}

impl PersistenceHooks for RecordingHooks {
    fn prepare_for_shutdown(
        &mut self,
        _save: bool,
    ) -> bool {
        true
    }

    fn on_flushall(&mut self) {}
}

////////////////////////////////////////////////////////////////////////////////
// Slot-индекс кластера
////////////////////////////////////////////////////////////////////////////////

/// Индекс "слот -> ключи" кластерного режима.
///
/// Контракт повторяет radix-индекс оригинала: упорядоченные пары
/// `(16-битный слот, байты ключа)` плюс счётчики ключей по слотам.
#[derive(Debug, Default)]
pub struct SlotIndex {
    keys: BTreeMap<(u16, Sds), ()>,
    counts: BTreeMap<u16, u64>,
}

impl SlotIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует ключ в своём слоте.
    pub fn add(
        &mut self,
        key: &Sds,
    ) {
        let slot = key_hash_slot(key);
        if self.keys.insert((slot, key.clone()), ()).is_none() {
            *self.counts.entry(slot).or_insert(0) += 1;
        }
    }

    /// Убирает ключ из индекса.
    pub fn del(
        &mut self,
        key: &Sds,
    ) {
        let slot = key_hash_slot(key);
        if self.keys.remove(&(slot, key.clone())).is_some() {
            let cnt = self.counts.entry(slot).or_insert(0);
            *cnt = cnt.saturating_sub(1);
            if *cnt == 0 {
                self.counts.remove(&slot);
            }
        }
    }

    /// Полный сброс индекса.
    pub fn flush(&mut self) {
        self.keys.clear();
        self.counts.clear();
    }

    /// До `count` ключей указанного слота.
    pub fn keys_in_slot(
        &self,
        slot: u16,
        count: usize,
    ) -> Vec<Sds> {
        self.keys
            .range((slot, Sds::from_bytes(b""))..)
            .take_while(|((s, _), _)| *s == slot)
            .take(count)
            .map(|((_, k), _)| k.clone())
            .collect()
    }

    /// Количество ключей в слоте.
    pub fn count_keys_in_slot(
        &self,
        slot: u16,
    ) -> u64 {
        self.counts.get(&slot).copied().unwrap_or(0)
    }
}

/// Слот ключа. Хештег в фигурных скобках ограничивает хешируемую часть,
/// чтобы родственные ключи попадали в один слот.
pub fn key_hash_slot(key: &Sds) -> u16 {
    let bytes = key.as_slice();

    let hashed: &[u8] = match bytes.iter().position(|&b| b == b'{') {
        Some(open) => match bytes[open + 1..].iter().position(|&b| b == b'}') {
            // Пустой хештег "{}" не ограничивает ничего.
            Some(0) | None => bytes,
            Some(close) => &bytes[open + 1..open + 1 + close],
        },
        None => bytes,
    };

    let mut h = DefaultHasher::new();
    hashed.hash(&mut h);
    (h.finish() % CLUSTER_SLOTS as u64) as u16
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
