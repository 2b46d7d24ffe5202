//! API истечения ключей.
//!
//! Дедлайны — абсолютные unix-миллисекунды в таблице `expires`; ключ
//! имеет истечение тогда и только тогда, когда он там присутствует.
//! Реактивная проверка (`expire_if_needed`) зовётся на каждом доступе;
//! проактивный семплер — внешний коллаборатор поверх того же API.

use tracing::debug;

use crate::{
    database::Sds,
    engine::{notify::NOTIFY_EXPIRED, Caller, Server},
};

use super::db::{db_async_delete, db_sync_delete, notify_keyspace_event};

/// Устанавливает ключу абсолютный дедлайн в unix-миллисекундах.
///
/// Ключ обязан существовать в основной таблице, иначе запись в `expires`
/// никогда не была бы освобождена.
pub fn set_expire(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
    when_ms: i64,
) {
    assert!(
        srv.dbs[db_id].main.contains_key(key),
        "setting expire on a key missing from the main table"
    );
    srv.dbs[db_id].expires.replace(key.clone(), when_ms);

    // Записываемая реплика сама назначила истечение: мастер про него не
    // знает, и чистить такой ключ придётся самим.
    let writable_slave = srv.master_host.is_some() && !srv.repl_slave_ro;
    if writable_slave && srv.current_caller != Caller::MasterLink {
        remember_slave_key_with_expire(srv, db_id, key);
    }
}

/// Дедлайн ключа или -1, если истечения нет.
pub fn get_expire(
    srv: &Server,
    db_id: usize,
    key: &Sds,
) -> i64 {
    if srv.dbs[db_id].expires.len() == 0 {
        return -1;
    }

    match srv.dbs[db_id].expires.get(key) {
        None => -1,
        Some(&when) => {
            // Запись в expires обязана сопровождаться записью в main.
            assert!(
                srv.dbs[db_id].main.contains_key(key),
                "expires entry without a main table entry"
            );
            when
        }
    }
}

/// Снимает истечение. Возвращает `true`, если оно было.
pub fn remove_expire(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) -> bool {
    assert!(
        srv.dbs[db_id].main.contains_key(key),
        "removing expire of a key missing from the main table"
    );
    srv.dbs[db_id].expires.remove(key)
}

/// Транслирует истечение ключа в DEL либо UNLINK для AOF и реплик.
///
/// Вызывается строго до локального удаления: поток изменений должен
/// увидеть истечение как команду, предшествующую любой последующей
/// мутации этого ключа.
pub fn propagate_expire(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
    lazy: bool,
) {
    let op = if lazy { "UNLINK" } else { "DEL" };
    let argv = [Sds::from_str(op), key.clone()];
    srv.hooks.propagation.feed(db_id, &argv);
}

/// Ленивое истечение ключа при доступе.
///
/// Возвращает `true`, если ключ истёк. На мастере истёкший ключ при этом
/// удаляется (синхронно или лениво по `lazyfree_lazy_expire`) с
/// трансляцией DEL/UNLINK и событием "expired". Реплика ничего не
/// удаляет — истечением управляет мастер — но честно сообщает логический
/// статус ключа. Во время загрузки датасета истечение выключено.
pub fn expire_if_needed(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) -> bool {
    let when = get_expire(srv, db_id, key);
    if when < 0 {
        return false;
    }

    if srv.loading {
        return false;
    }

    let now = srv.logical_now_ms();

    if srv.master_host.is_some() {
        return now > when;
    }

    if now <= when {
        return false;
    }

    srv.stat_expired_keys += 1;
    let lazy = srv.config.lazyfree_lazy_expire;
    propagate_expire(srv, db_id, key, lazy);
    notify_keyspace_event(srv, NOTIFY_EXPIRED, "expired", key, db_id);
    debug!(key = %key, db_id, "key expired");

    if lazy {
        db_async_delete(srv, db_id, key)
    } else {
        db_sync_delete(srv, db_id, key)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Учёт ключей с истечением на записываемых репликах
////////////////////////////////////////////////////////////////////////////////

/// Запоминает ключ, которому истечение назначила сама реплика. Бит на
/// базу; базы дальше 64-й не отслеживаются.
pub fn remember_slave_key_with_expire(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
) {
    if db_id >= 64 {
        return;
    }

    let bit = 1u64 << db_id;
    match srv.slave_keys_with_expire.get_mut(key) {
        Some(dbs) => *dbs |= bit,
        None => {
            srv.slave_keys_with_expire.add(key.clone(), bit);
        }
    }
}

/// Сбрасывает учёт реплика-истечений; зовётся при FLUSHALL.
pub fn flush_slave_keys_with_expire(srv: &mut Server) {
    srv.slave_keys_with_expire.clear();
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
