//! Логическая база данных и низкоуровневый API кейспейса.
//!
//! Функции этого модуля — единственная дорога к `main`/`expires`: они
//! поддерживают связку двух таблиц, обновляют поле доступа объектов,
//! сигналят коллабораторам и кормят slot-индекс кластера.

use std::sync::Arc;

use rand::thread_rng;
use tracing::debug;

use crate::{
    config::MaxmemoryPolicy,
    database::{
        object::{lfu_log_incr, lfu_time_minutes, lru_clock},
        Dict, ObjRef, Object, Sds, StrValue, Value,
    },
    engine::{Caller, Server},
    error::{StoreError, StoreResult},
};

use super::expire::{expire_if_needed, flush_slave_keys_with_expire, remove_expire};

pub const LOOKUP_NONE: u32 = 0;
/// Не обновлять поле времени доступа при чтении.
pub const LOOKUP_NOTOUCH: u32 = 1 << 0;

/// Логическая база: основная таблица плюс таблица истечений.
///
/// `blocking_keys`, `ready_keys` и `watched_keys` принадлежат
/// коллабораторам; при SWAPDB они остаются на месте, меняются только
/// `main`, `expires` и `avg_ttl`.
pub struct Db {
    pub id: usize,
    pub main: Dict<Sds, ObjRef>,
    pub expires: Dict<Sds, i64>,
    /// Ключи, на которых заблокированы клиенты списочных команд;
    /// значение — число ожидающих.
    pub blocking_keys: Dict<Sds, u64>,
    /// Ключи, готовые разбудить заблокированных клиентов.
    pub ready_keys: Vec<Sds>,
    /// Ключи под WATCH; значение — число наблюдателей.
    pub watched_keys: Dict<Sds, u64>,
    /// Скользящая оценка среднего TTL, информационная.
    pub avg_ttl: u64,
}

impl Db {
    pub fn new(id: usize) -> Self {
        Db {
            id,
            main: Dict::new(),
            expires: Dict::new(),
            blocking_keys: Dict::new(),
            ready_keys: Vec::new(),
            watched_keys: Dict::new(),
            avg_ttl: 0,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Поиск ключей
////////////////////////////////////////////////////////////////////////////////

/// Обновляет поле доступа объекта согласно политике вытеснения.
fn object_touch(
    obj: &Object,
    policy: MaxmemoryPolicy,
    now_ms: i64,
    lfu_decay_time: u32,
    lfu_log_factor: u32,
) {
    match policy {
        MaxmemoryPolicy::Lfu => {
            let now_min = lfu_time_minutes(now_ms);
            let counter = obj.lfu_decr_and_return(now_min, lfu_decay_time);
            let counter = lfu_log_incr(counter, lfu_log_factor, &mut thread_rng());
            obj.set_lfu(now_min, counter);
        }
        MaxmemoryPolicy::Lru => obj.set_lru(lru_clock(now_ms)),
    }
}

/// Низкоуровневый поиск значения. Команды пользуются обёртками
/// [`lookup_key_read`] / [`lookup_key_write`].
///
/// Побочный эффект: обновляет поле доступа, кроме случаев `NOTOUCH` и
/// активного фонового потомка персистентности (не раздуваем copy-on-write).
pub fn lookup_key(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
    flags: u32,
) -> Option<ObjRef> {
    let obj = srv.dbs[db_id].main.get(key)?.clone();

    if !srv.has_saving_child && flags & LOOKUP_NOTOUCH == 0 {
        object_touch(
            &obj,
            srv.config.maxmemory_policy,
            srv.mstime(),
            srv.config.lfu_decay_time,
            srv.config.lfu_log_factor,
        );
    }

    Some(obj)
}

/// Поиск для чтения с флагами.
///
/// Побочные эффекты: ленивое истечение ключа, обновление поля доступа и
/// счётчиков hit/miss. На реплике логически истёкший ключ скрывается от
/// обычных read-only клиентов — но не от канала репликации: удалять его
/// имеет право только DEL мастера.
pub fn lookup_key_read_with_flags(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
    flags: u32,
) -> Option<ObjRef> {
    if expire_if_needed(srv, db_id, key) {
        // На мастере истёкший ключ уже удалён.
        if srv.master_host.is_none() {
            return None;
        }

        if let Caller::Client {
            readonly_command: true,
        } = srv.current_caller
        {
            return None;
        }
    }

    let val = lookup_key(srv, db_id, key, flags);
    match &val {
        Some(_) => srv.stat_keyspace_hits += 1,
        None => srv.stat_keyspace_misses += 1,
    }
    val
}

/// Поиск для чтения без флагов — обычный случай.
pub fn lookup_key_read(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) -> Option<ObjRef> {
    lookup_key_read_with_flags(srv, db_id, key, LOOKUP_NONE)
}

/// Поиск для записи: ленивое истечение без реплика-маскировки.
pub fn lookup_key_write(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) -> Option<ObjRef> {
    expire_if_needed(srv, db_id, key);
    lookup_key(srv, db_id, key, LOOKUP_NONE)
}

////////////////////////////////////////////////////////////////////////////////
// Установка и удаление ключей
////////////////////////////////////////////////////////////////////////////////

/// Добавляет ключ в базу. Ключ обязан отсутствовать.
pub fn db_add(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
    val: ObjRef,
) {
    let is_list = matches!(val.value, Value::List(_));

    let added = srv.dbs[db_id].main.add(key.clone(), val);
    assert!(added, "db_add against an existing key");

    if is_list {
        signal_list_as_ready(srv, db_id, key);
    }
    if let Some(cluster) = srv.cluster.as_mut() {
        cluster.add(key);
    }
}

/// Перезаписывает существующий ключ новым значением, не трогая истечение.
///
/// Новое значение наследует поле доступа старого; при LFU-политике
/// счётчик после наследования ещё и обновляется.
pub fn db_overwrite(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
    val: ObjRef,
) {
    let policy = srv.config.maxmemory_policy;
    let now_ms = srv.mstime();
    let decay = srv.config.lfu_decay_time;
    let factor = srv.config.lfu_log_factor;

    let slot = srv.dbs[db_id]
        .main
        .get_mut(key)
        .expect("db_overwrite against a missing key");

    val.set_lru(slot.lru());
    let old = std::mem::replace(slot, val);

    if policy == MaxmemoryPolicy::Lfu {
        object_touch(slot, policy, now_ms, decay, factor);
    }

    drop(old);
}

/// Высокоуровневая установка ключа, какой пользуются SET и его родня:
/// перезапись либо добавление, сброс истечения, сигнал наблюдателям.
pub fn set_key(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
    val: ObjRef,
) {
    if lookup_key_write(srv, db_id, key).is_none() {
        db_add(srv, db_id, key, val);
    } else {
        db_overwrite(srv, db_id, key, val);
    }
    remove_expire(srv, db_id, key);
    signal_modified_key(srv, db_id, key);
}

/// Присутствует ли ключ в основной таблице (без проверки истечения).
pub fn db_exists(
    srv: &Server,
    db_id: usize,
    key: &Sds,
) -> bool {
    srv.dbs[db_id].main.contains_key(key)
}

/// Случайный неистёкший ключ базы, копией.
pub fn db_random_key(
    srv: &mut Server,
    db_id: usize,
) -> Option<Sds> {
    loop {
        let key = srv.dbs[db_id]
            .main
            .random_entry(&mut thread_rng())
            .map(|(k, _)| k.clone())?;

        if srv.dbs[db_id].expires.contains_key(&key) && expire_if_needed(srv, db_id, &key) {
            // Ключ истёк, ищем другой.
            continue;
        }
        return Some(key);
    }
}

/// Синхронное удаление ключа из обеих таблиц.
pub fn db_sync_delete(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) -> bool {
    // Удаление из expires не освобождает байты ключа: идентичность ключа
    // живёт в основной таблице.
    if srv.dbs[db_id].expires.len() > 0 {
        srv.dbs[db_id].expires.remove(key);
    }

    match srv.dbs[db_id].main.take(key) {
        Some(_) => {
            if let Some(cluster) = srv.cluster.as_mut() {
                cluster.del(key);
            }
            true
        }
        None => false,
    }
}

/// Ленивое удаление: значение уезжает в фоновый поток освобождения.
pub fn db_async_delete(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) -> bool {
    if srv.dbs[db_id].expires.len() > 0 {
        srv.dbs[db_id].expires.remove(key);
    }

    match srv.dbs[db_id].main.take(key) {
        Some(obj) => {
            srv.lazyfree.defer_object(obj);
            if let Some(cluster) = srv.cluster.as_mut() {
                cluster.del(key);
            }
            true
        }
        None => false,
    }
}

/// Удаление с выбором пути по `lazyfree_lazy_server_del`.
pub fn db_delete(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) -> bool {
    if srv.config.lazyfree_lazy_server_del {
        db_async_delete(srv, db_id, key)
    } else {
        db_sync_delete(srv, db_id, key)
    }
}

/// Готовит строковое значение ключа к разрушающей записи.
///
/// Если объект разделяемый либо не в raw-кодировании, в слот
/// устанавливается свежая raw-копия. Возвращает значение слота.
pub fn db_unshare_string_value(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) -> ObjRef {
    let (needs_copy, raw, saved_lru) = {
        let slot = srv.dbs[db_id]
            .main
            .get(key)
            .expect("unsharing a missing key");

        let raw = match &slot.value {
            Value::Str(StrValue::Raw(s)) => s.clone(),
            Value::Str(StrValue::Int(v)) => Sds::from_i64(*v),
            _ => panic!("unsharing a non-string value"),
        };
        let shared = Object::is_shared(slot);
        let encoded = !matches!(slot.value, Value::Str(StrValue::Raw(_)));

        (shared || encoded, raw, slot.lru())
    };

    if needs_copy {
        let fresh = Arc::new(Object::with_lru(Value::Str(StrValue::Raw(raw)), saved_lru));
        db_overwrite(srv, db_id, key, fresh);
    }

    srv.dbs[db_id].main.get(key).expect("slot just written").clone()
}

////////////////////////////////////////////////////////////////////////////////
// Массовые операции
////////////////////////////////////////////////////////////////////////////////

/// Очищает одну базу (`dbnum = id`) или все (`dbnum = -1`).
///
/// `async_flag` передаёт таблицы фоновому потоку освобождения целиком.
/// Возвращает число удалённых ключей.
pub fn empty_db(
    srv: &mut Server,
    dbnum: i64,
    async_flag: bool,
    mut callback: Option<&mut dyn FnMut(usize)>,
) -> StoreResult<u64> {
    if dbnum < -1 || dbnum >= srv.dbs.len() as i64 {
        return Err(StoreError::DbIndexOutOfRange);
    }

    let mut removed = 0u64;
    for j in 0..srv.dbs.len() {
        if dbnum != -1 && dbnum as usize != j {
            continue;
        }

        removed += srv.dbs[j].main.len() as u64;

        if async_flag {
            let main = std::mem::take(&mut srv.dbs[j].main);
            let expires = std::mem::take(&mut srv.dbs[j].expires);
            srv.lazyfree.defer_tables(main, expires);
        } else {
            let cb = &mut callback;
            srv.dbs[j].main.empty_with(|n| {
                if let Some(f) = cb {
                    f(n);
                }
            });
            let cb = &mut callback;
            srv.dbs[j].expires.empty_with(|n| {
                if let Some(f) = cb {
                    f(n);
                }
            });
        }
    }

    if let Some(cluster) = srv.cluster.as_mut() {
        cluster.flush();
    }
    if dbnum == -1 {
        flush_slave_keys_with_expire(srv);
    }

    debug!(removed, dbnum, "database flush");
    Ok(removed)
}

/// Атомарно обменивает содержимое двух баз.
///
/// `blocking_keys`, `ready_keys` и `watched_keys` остаются у своих баз:
/// клиенты продолжают смотреть в ту же логическую базу. После обмена обе
/// базы пересканируются на готовые списки.
pub fn swap_databases(
    srv: &mut Server,
    id1: usize,
    id2: usize,
) -> bool {
    if id1 >= srv.dbs.len() || id2 >= srv.dbs.len() {
        return false;
    }
    if id1 == id2 {
        return true;
    }

    let (lo, hi) = if id1 < id2 { (id1, id2) } else { (id2, id1) };
    let (head, tail) = srv.dbs.split_at_mut(hi);
    let a = &mut head[lo];
    let b = &mut tail[0];

    std::mem::swap(&mut a.main, &mut b.main);
    std::mem::swap(&mut a.expires, &mut b.expires);
    std::mem::swap(&mut a.avg_ttl, &mut b.avg_ttl);

    // Клиент, ждавший список X, после обмена может оказаться
    // удовлетворённым: X существует в новом содержимом его базы. Обычно
    // эта проверка делается в db_add при создании списка, поэтому здесь
    // нужен явный перескан.
    scan_database_for_ready_lists(srv, id1);
    scan_database_for_ready_lists(srv, id2);

    true
}

/// Удаляет все ключи указанного слота кластера. В кластерном режиме
/// существует только база 0. Возвращает число удалённых ключей.
pub fn del_keys_in_slot(
    srv: &mut Server,
    slot: u16,
) -> u64 {
    let mut removed = 0u64;

    loop {
        let keys = match srv.cluster.as_ref() {
            Some(cluster) => cluster.keys_in_slot(slot, 32),
            None => return 0,
        };
        if keys.is_empty() {
            return removed;
        }

        for key in keys {
            db_delete(srv, 0, &key);
            removed += 1;
        }
    }
}

/// Ищет в заблокированных ключах базы те, что уже существуют как списки,
/// и сигналит их готовность.
pub fn scan_database_for_ready_lists(
    srv: &mut Server,
    db_id: usize,
) {
    let blocked: Vec<Sds> = srv.dbs[db_id]
        .blocking_keys
        .iter()
        .map(|(k, _)| k.clone())
        .collect();

    for key in blocked {
        let value = lookup_key(srv, db_id, &key, LOOKUP_NOTOUCH);
        if let Some(v) = value {
            if matches!(v.value, Value::List(_)) {
                signal_list_as_ready(srv, db_id, &key);
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Сигналы коллабораторам
////////////////////////////////////////////////////////////////////////////////

/// Извещает коллаборатора WATCH об изменении ключа. Зовётся каждой
/// мутацией кейспейса.
pub fn signal_modified_key(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) {
    srv.hooks.watch.touch_watched_key(db_id, key);
}

/// Извещает коллаборатора WATCH о сбросе базы (`-1` — всех).
pub fn signal_flushed_db(
    srv: &mut Server,
    db_id: i64,
) {
    srv.hooks.watch.touch_on_flush(db_id);
}

/// Отмечает список готовым для заблокированных клиентов.
pub fn signal_list_as_ready(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) {
    if !srv.dbs[db_id].blocking_keys.contains_key(key) {
        return;
    }
    if srv.dbs[db_id].ready_keys.iter().any(|k| k == key) {
        return;
    }

    srv.dbs[db_id].ready_keys.push(key.clone());
    srv.hooks.blocking.signal_ready(db_id, key);
}

/// Отправляет типизированное событие кейспейса, если его класс включён.
pub fn notify_keyspace_event(
    srv: &mut Server,
    class: u32,
    event: &str,
    key: &Sds,
    db_id: usize,
) {
    if srv.notify_flags & class == 0 {
        return;
    }
    srv.hooks.notify.notify(class, event, key, db_id);
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SetValue;

    fn key(s: &str) -> Sds {
        Sds::from_str(s)
    }

    fn str_obj(srv: &Server, s: &str) -> ObjRef {
        srv.new_object(Value::Str(StrValue::Raw(Sds::from_str(s))))
    }

    /// Тест проверяет добавление, поиск и удаление ключа.
    #[test]
    fn add_lookup_delete() {
        let mut srv = Server::default();
        let k = key("a");
        let v = str_obj(&srv, "v");

        db_add(&mut srv, 0, &k, v);
        assert!(db_exists(&srv, 0, &k));
        assert!(lookup_key_read(&mut srv, 0, &k).is_some());
        assert_eq!(srv.stat_keyspace_hits, 1);

        assert!(db_sync_delete(&mut srv, 0, &k));
        assert!(!db_exists(&srv, 0, &k));
        assert!(lookup_key_read(&mut srv, 0, &k).is_none());
        assert_eq!(srv.stat_keyspace_misses, 1);
    }

    /// Тест проверяет, что перезапись наследует поле доступа старого
    /// значения.
    #[test]
    fn overwrite_inherits_access_field() {
        let mut srv = Server::default();
        let k = key("a");

        let old = str_obj(&srv, "old");
        old.set_lru(777);
        db_add(&mut srv, 0, &k, old);

        let new = str_obj(&srv, "new");
        db_overwrite(&mut srv, 0, &k, new);

        let got = lookup_key(&mut srv, 0, &k, LOOKUP_NOTOUCH).unwrap();
        assert_eq!(got.lru(), 777);
    }

    /// Тест проверяет, что set_key снимает истечение с ключа.
    #[test]
    fn set_key_makes_persistent() {
        use crate::keyspace::expire::{get_expire, set_expire};

        let mut srv = Server::default();
        let k = key("a");
        let v1 = str_obj(&srv, "v");
        db_add(&mut srv, 0, &k, v1);
        let expire_at = srv.mstime() + 100_000;
        set_expire(&mut srv, 0, &k, expire_at);
        assert!(get_expire(&srv, 0, &k) != -1);

        let v2 = str_obj(&srv, "w");
        set_key(&mut srv, 0, &k, v2);
        assert_eq!(get_expire(&srv, 0, &k), -1);
    }

    /// Тест проверяет copy-on-write разделяемой строки.
    #[test]
    fn unshare_string_value() {
        let mut srv = Server::default();
        let k = key("a");

        // Упакованное число всегда копируется в raw.
        let packed = srv.new_object(Value::Str(StrValue::Int(42)));
        db_add(&mut srv, 0, &k, packed);

        let fresh = db_unshare_string_value(&mut srv, 0, &k);
        assert!(matches!(fresh.value, Value::Str(StrValue::Raw(_))));

        // Уникальная raw-строка возвращается как есть.
        let before = srv.dbs[0].main.get(&k).unwrap().clone();
        drop(before); // ссылка снаружи снята, объект снова уникален
        let again = db_unshare_string_value(&mut srv, 0, &k);
        assert!(matches!(again.value, Value::Str(StrValue::Raw(_))));
    }

    /// Тест проверяет случайный ключ.
    #[test]
    fn random_key() {
        let mut srv = Server::default();
        assert!(db_random_key(&mut srv, 0).is_none());

        for i in 0..10 {
            let k = Sds::from_i64(i);
            let v = str_obj(&srv, "v");
            db_add(&mut srv, 0, &k, v);
        }

        let k = db_random_key(&mut srv, 0).unwrap();
        assert!(db_exists(&srv, 0, &k));
    }

    /// Тест проверяет очистку одной и всех баз.
    #[test]
    fn empty_db_one_and_all() {
        let mut srv = Server::default();
        for db in 0..2 {
            for i in 0..5 {
                let k = Sds::from_i64(i);
                let v = str_obj(&srv, "v");
                db_add(&mut srv, db, &k, v);
            }
        }

        assert_eq!(empty_db(&mut srv, 0, false, None).unwrap(), 5);
        assert_eq!(srv.dbs[0].main.len(), 0);
        assert_eq!(srv.dbs[1].main.len(), 5);

        assert_eq!(empty_db(&mut srv, -1, false, None).unwrap(), 5);
        assert_eq!(srv.dbs[1].main.len(), 0);

        assert!(empty_db(&mut srv, 99, false, None).is_err());
    }

    /// Тест проверяет асинхронную очистку: таблицы уезжают в lazyfree.
    #[test]
    fn empty_db_async() {
        let mut srv = Server::default();
        for i in 0..100 {
            let k = Sds::from_i64(i);
            let v = str_obj(&srv, "v");
            db_add(&mut srv, 0, &k, v);
        }

        assert_eq!(empty_db(&mut srv, 0, true, None).unwrap(), 100);
        assert_eq!(srv.dbs[0].main.len(), 0);
        let v = str_obj(&srv, "v");
        assert!(srv.dbs[0].main.add(key("x"), v));
    }

    /// Тест проверяет обмен баз: данные меняются местами, вспомогательные
    /// индексы остаются, готовые списки пересканируются.
    #[test]
    fn swap_databases_keeps_auxiliary_indexes() {
        let mut srv = Server::default();

        let q = key("q");
        let list = srv.new_object(Value::List(vec![Sds::from_str("x")]));
        db_add(&mut srv, 1, &q, list);

        // Клиент в базе 0 заблокирован на ключе q.
        srv.dbs[0].blocking_keys.add(q.clone(), 1);

        assert!(swap_databases(&mut srv, 0, 1));

        // Данные переехали.
        assert!(db_exists(&srv, 0, &q));
        assert!(!db_exists(&srv, 1, &q));

        // Индекс блокировок остался в базе 0, и ключ отмечен готовым.
        assert!(srv.dbs[0].blocking_keys.contains_key(&q));
        assert_eq!(srv.dbs[0].ready_keys, vec![q.clone()]);

        assert!(!swap_databases(&mut srv, 0, 99));
        assert!(swap_databases(&mut srv, 1, 1));
    }

    /// Тест проверяет, что db_add списка будит заблокированный ключ.
    #[test]
    fn adding_list_signals_ready() {
        let mut srv = Server::default();
        let q = key("q");
        srv.dbs[0].blocking_keys.add(q.clone(), 2);

        let list = srv.new_object(Value::List(vec![]));
        db_add(&mut srv, 0, &q, list);

        assert_eq!(srv.dbs[0].ready_keys, vec![q.clone()]);

        // Повторный сигнал не дублируется.
        signal_list_as_ready(&mut srv, 0, &q);
        assert_eq!(srv.dbs[0].ready_keys.len(), 1);
    }

    /// Тест проверяет наполнение slot-индекса в кластерном режиме.
    #[test]
    fn cluster_slot_index_follows_keys() {
        use crate::config::Settings;
        use crate::engine::hooks::key_hash_slot;

        let mut srv = Server::new(Settings {
            cluster_enabled: true,
            ..Settings::default()
        });

        let k = key("user:1");
        let slot = key_hash_slot(&k);
        let v = srv.new_object(Value::Set(SetValue::default()));
        db_add(&mut srv, 0, &k, v);
        assert_eq!(srv.cluster.as_ref().unwrap().count_keys_in_slot(slot), 1);

        db_sync_delete(&mut srv, 0, &k);
        assert_eq!(srv.cluster.as_ref().unwrap().count_keys_in_slot(slot), 0);
    }

    /// Тест проверяет массовое удаление ключей слота.
    #[test]
    fn del_keys_in_slot_drains_slot() {
        use crate::config::Settings;
        use crate::engine::hooks::key_hash_slot;

        let mut srv = Server::new(Settings {
            cluster_enabled: true,
            ..Settings::default()
        });

        // Хештег кладёт родственные ключи в один слот.
        let keys: Vec<Sds> = (0..5).map(|i| key(&format!("{{grp}}:{i}"))).collect();
        let slot = key_hash_slot(&keys[0]);
        for k in &keys {
            let v = str_obj(&srv, "v");
            db_add(&mut srv, 0, k, v);
        }

        assert_eq!(del_keys_in_slot(&mut srv, slot), 5);
        for k in &keys {
            assert!(!db_exists(&srv, 0, k));
        }
        assert_eq!(srv.cluster.as_ref().unwrap().count_keys_in_slot(slot), 0);
    }
}
