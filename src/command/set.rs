//! Команды множеств.
//!
//! Вся алгоритмика (выбор стратегии SPOP/SRANDMEMBER, порядок проб в
//! пересечении и разности) живёт здесь; кодирование множества — дело
//! `SetValue`.

use std::sync::Arc;

use rand::thread_rng;

use crate::{
    command::execute::{CommandExecute, Session},
    command::reply::Reply,
    database::{ObjRef, Sds, SetMember, SetValue, Value},
    engine::{
        notify::{NOTIFY_GENERIC, NOTIFY_SET},
        Server,
    },
    error::{StoreError, StoreResult},
    keyspace::{
        db_add, db_delete, lookup_key_read, lookup_key_write, notify_keyspace_event,
        scan::parse_scan_cursor, scan_generic, signal_modified_key,
    },
};

/// Во сколько раз остаток должен быть больше запрошенного количества,
/// чтобы SPOP выдёргивал случайные элементы, а не пересобирал множество.
const SPOP_MOVE_STRATEGY_MUL: usize = 5;

/// Во сколько раз множество должно быть больше запрошенного количества,
/// чтобы SRANDMEMBER набирал элементы, а не вычитал лишние.
const SRANDMEMBER_SUB_STRATEGY_MUL: usize = 3;

////////////////////////////////////////////////////////////////////////////////
// Вспомогательные функции
////////////////////////////////////////////////////////////////////////////////

fn parse_long(arg: &Sds) -> StoreResult<i64> {
    arg.parse_i64().ok_or(StoreError::NotAnInteger)
}

/// Тип обязан быть множеством.
fn check_set(obj: &ObjRef) -> StoreResult<()> {
    match obj.value {
        Value::Set(_) => Ok(()),
        _ => Err(StoreError::WrongType),
    }
}

fn set_len(obj: &ObjRef) -> usize {
    match &obj.value {
        Value::Set(s) => s.len(),
        _ => 0,
    }
}

/// Изменяемый доступ к множеству в слоте ключа, с copy-on-write для
/// разделяемого значения.
fn set_slot_mut<'a>(
    srv: &'a mut Server,
    db_id: usize,
    key: &Sds,
) -> &'a mut SetValue {
    let slot = srv.dbs[db_id]
        .main
        .get_mut(key)
        .expect("set key vanished mid-command");
    let obj = Arc::make_mut(slot);
    match &mut obj.value {
        Value::Set(s) => s,
        _ => panic!("set key holds a non-set value"),
    }
}

fn set_len_at(
    srv: &Server,
    db_id: usize,
    key: &Sds,
) -> usize {
    srv.dbs[db_id].main.get(key).map(set_len).unwrap_or(0)
}

/// Случайный элемент множества по ключу, владеющей копией. Для intset
/// дополнительно возвращает само число, чтобы удалить его без повторного
/// разбора строки.
fn random_member_owned(
    srv: &Server,
    db_id: usize,
    key: &Sds,
) -> (Option<i64>, Sds) {
    let slot = srv.dbs[db_id]
        .main
        .get(key)
        .expect("set key vanished mid-command");
    let Value::Set(set) = &slot.value else {
        panic!("set key holds a non-set value");
    };

    let m = set
        .random_member(&mut thread_rng())
        .expect("random element of an empty set");
    match m {
        SetMember::Int(v) => (Some(v), Sds::from_i64(v)),
        SetMember::Str(s) => (None, s.clone()),
    }
}

/// Транслирует синтетический SREM в AOF и поток репликации.
fn propagate_srem(
    srv: &mut Server,
    db_id: usize,
    key: &Sds,
    member: &Sds,
) {
    let argv = [Sds::from_str("SREM"), key.clone(), member.clone()];
    srv.hooks.propagation.feed(db_id, &argv);
}

/// Общий финал STORE-вариантов: результат заменяет ключ назначения,
/// пустой результат его удаляет.
fn store_result_set(
    srv: &mut Server,
    session: &Session,
    dstset: SetValue,
    dst: &Sds,
    event: &str,
) -> StoreResult<Reply> {
    let db_id = session.db_id;
    let deleted = db_delete(srv, db_id, dst);

    let reply = if !dstset.is_empty() {
        let len = dstset.len() as i64;
        let obj = srv.new_object(Value::Set(dstset));
        db_add(srv, db_id, dst, obj);
        notify_keyspace_event(srv, NOTIFY_SET, event, dst, db_id);
        Reply::Int(len)
    } else {
        if deleted {
            notify_keyspace_event(srv, NOTIFY_GENERIC, "del", dst, db_id);
        }
        Reply::Int(0)
    };

    signal_modified_key(srv, db_id, dst);
    srv.dirty += 1;
    Ok(reply)
}

////////////////////////////////////////////////////////////////////////////////
// SADD / SREM / SMOVE / SISMEMBER / SCARD
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct SAddCommand {
    pub key: Sds,
    pub members: Vec<Sds>,
}

impl CommandExecute for SAddCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let db_id = session.db_id;

        match lookup_key_write(srv, db_id, &self.key) {
            Some(obj) => check_set(&obj)?,
            None => {
                let set = SetValue::for_value(&self.members[0]);
                let obj = srv.new_object(Value::Set(set));
                db_add(srv, db_id, &self.key, obj);
            }
        }

        let max = srv.config.set_max_intset_entries;
        let mut added = 0u64;
        {
            let set = set_slot_mut(srv, db_id, &self.key);
            for m in &self.members {
                if set.add(m, max) {
                    added += 1;
                }
            }
        }

        if added > 0 {
            signal_modified_key(srv, db_id, &self.key);
            notify_keyspace_event(srv, NOTIFY_SET, "sadd", &self.key, db_id);
        }
        srv.dirty += added;
        Ok(Reply::Int(added as i64))
    }
}

#[derive(Debug)]
pub struct SRemCommand {
    pub key: Sds,
    pub members: Vec<Sds>,
}

impl CommandExecute for SRemCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let db_id = session.db_id;

        let Some(obj) = lookup_key_write(srv, db_id, &self.key) else {
            return Ok(Reply::Int(0));
        };
        check_set(&obj)?;
        drop(obj);

        let mut deleted = 0u64;
        let emptied;
        {
            let set = set_slot_mut(srv, db_id, &self.key);
            for m in &self.members {
                if set.remove(m) {
                    deleted += 1;
                    if set.is_empty() {
                        break;
                    }
                }
            }
            emptied = set.is_empty();
        }

        let mut keyremoved = false;
        if emptied && deleted > 0 {
            db_delete(srv, db_id, &self.key);
            keyremoved = true;
        }

        if deleted > 0 {
            signal_modified_key(srv, db_id, &self.key);
            notify_keyspace_event(srv, NOTIFY_SET, "srem", &self.key, db_id);
            if keyremoved {
                notify_keyspace_event(srv, NOTIFY_GENERIC, "del", &self.key, db_id);
            }
            srv.dirty += deleted;
        }
        Ok(Reply::Int(deleted as i64))
    }
}

#[derive(Debug)]
pub struct SMoveCommand {
    pub src: Sds,
    pub dst: Sds,
    pub member: Sds,
}

impl CommandExecute for SMoveCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let db_id = session.db_id;

        let Some(srcset) = lookup_key_write(srv, db_id, &self.src) else {
            return Ok(Reply::Int(0));
        };
        let dstset = lookup_key_write(srv, db_id, &self.dst);

        check_set(&srcset)?;
        if let Some(d) = &dstset {
            check_set(d)?;
        }

        // Совпадающие источник и назначение: не операция.
        if self.src == self.dst {
            let Value::Set(s) = &srcset.value else {
                unreachable!()
            };
            return Ok(Reply::from_bool(s.contains(&self.member)));
        }

        let dst_exists = dstset.is_some();
        drop(dstset);
        drop(srcset);

        let removed = {
            let set = set_slot_mut(srv, db_id, &self.src);
            set.remove(&self.member)
        };
        if !removed {
            return Ok(Reply::Int(0));
        }
        notify_keyspace_event(srv, NOTIFY_SET, "srem", &self.src, db_id);

        if set_len_at(srv, db_id, &self.src) == 0 {
            db_delete(srv, db_id, &self.src);
            notify_keyspace_event(srv, NOTIFY_GENERIC, "del", &self.src, db_id);
        }

        if !dst_exists {
            let set = SetValue::for_value(&self.member);
            let obj = srv.new_object(Value::Set(set));
            db_add(srv, db_id, &self.dst, obj);
        }

        signal_modified_key(srv, db_id, &self.src);
        signal_modified_key(srv, db_id, &self.dst);
        srv.dirty += 1;

        let max = srv.config.set_max_intset_entries;
        let added = {
            let set = set_slot_mut(srv, db_id, &self.dst);
            set.add(&self.member, max)
        };
        if added {
            srv.dirty += 1;
            notify_keyspace_event(srv, NOTIFY_SET, "sadd", &self.dst, db_id);
        }
        Ok(Reply::Int(1))
    }
}

#[derive(Debug)]
pub struct SIsMemberCommand {
    pub key: Sds,
    pub member: Sds,
}

impl CommandExecute for SIsMemberCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let Some(obj) = lookup_key_read(srv, session.db_id, &self.key) else {
            return Ok(Reply::Int(0));
        };
        check_set(&obj)?;

        let Value::Set(set) = &obj.value else {
            unreachable!()
        };
        Ok(Reply::from_bool(set.contains(&self.member)))
    }
}

#[derive(Debug)]
pub struct SCardCommand {
    pub key: Sds,
}

impl CommandExecute for SCardCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let Some(obj) = lookup_key_read(srv, session.db_id, &self.key) else {
            return Ok(Reply::Int(0));
        };
        check_set(&obj)?;
        Ok(Reply::Int(set_len(&obj) as i64))
    }
}

////////////////////////////////////////////////////////////////////////////////
// SPOP
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct SPopCommand {
    pub key: Sds,
    pub count: Option<Sds>,
}

impl CommandExecute for SPopCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        if let Some(count) = &self.count {
            return spop_with_count(srv, session, &self.key, count);
        }

        let db_id = session.db_id;
        let Some(obj) = lookup_key_write(srv, db_id, &self.key) else {
            return Ok(Reply::Nil);
        };
        check_set(&obj)?;
        drop(obj);

        let (as_int, ele) = random_member_owned(srv, db_id, &self.key);
        {
            let set = set_slot_mut(srv, db_id, &self.key);
            match as_int {
                Some(v) => {
                    set.remove_i64(v);
                }
                None => {
                    set.remove(&ele);
                }
            }
        }

        notify_keyspace_event(srv, NOTIFY_SET, "spop", &self.key, db_id);

        // В поток изменений уходит детерминированный SREM, а не SPOP.
        session.rewritten_argv = Some(vec![
            Sds::from_str("SREM"),
            self.key.clone(),
            ele.clone(),
        ]);

        if set_len_at(srv, db_id, &self.key) == 0 {
            db_delete(srv, db_id, &self.key);
            notify_keyspace_event(srv, NOTIFY_GENERIC, "del", &self.key, db_id);
        }

        signal_modified_key(srv, db_id, &self.key);
        srv.dirty += 1;
        Ok(Reply::Bulk(ele))
    }
}

/// SPOP key count.
fn spop_with_count(
    srv: &mut Server,
    session: &mut Session,
    key: &Sds,
    count_arg: &Sds,
) -> StoreResult<Reply> {
    let l = parse_long(count_arg)?;
    if l < 0 {
        return Err(StoreError::OutOfRange);
    }
    let count = l as usize;

    let db_id = session.db_id;
    let Some(obj) = lookup_key_read(srv, db_id, key) else {
        return Ok(Reply::empty_array());
    };
    check_set(&obj)?;

    if count == 0 {
        return Ok(Reply::empty_array());
    }

    let size = set_len(&obj);
    notify_keyspace_event(srv, NOTIFY_SET, "spop", key, db_id);
    srv.dirty += count as u64;

    // Запрошено не меньше, чем есть: отдать всё множество и удалить ключ.
    if count >= size {
        let members: Vec<Sds> = {
            let Value::Set(set) = &obj.value else {
                unreachable!()
            };
            set.iter().map(|m| m.to_sds()).collect()
        };
        drop(obj);

        db_delete(srv, db_id, key);
        notify_keyspace_event(srv, NOTIFY_GENERIC, "del", key, db_id);

        // Репликам и AOF операция видна как DEL.
        session.rewritten_argv = Some(vec![Sds::from_str("DEL"), key.clone()]);
        signal_modified_key(srv, db_id, key);
        srv.dirty += 1;
        return Ok(members.into());
    }
    drop(obj);

    let mut reply: Vec<Reply> = Vec::with_capacity(count);
    let remaining = size - count;

    if remaining.saturating_mul(SPOP_MOVE_STRATEGY_MUL) > count {
        // Остаётся много: дёшево выдёргивать случайные элементы по одному.
        for _ in 0..count {
            let (as_int, ele) = random_member_owned(srv, db_id, key);
            {
                let set = set_slot_mut(srv, db_id, key);
                match as_int {
                    Some(v) => {
                        set.remove_i64(v);
                    }
                    None => {
                        set.remove(&ele);
                    }
                }
            }
            propagate_srem(srv, db_id, key, &ele);
            reply.push(Reply::Bulk(ele));
        }
    } else {
        // Остаётся мало: дешевле выбрать остающихся и пересобрать
        // множество, чем выдёргивать извлекаемое большинство.
        let max = srv.config.set_max_intset_entries;
        let mut newset: Option<SetValue> = None;

        for _ in 0..remaining {
            let (_, ele) = random_member_owned(srv, db_id, key);
            let ns = newset.get_or_insert_with(|| SetValue::for_value(&ele));
            ns.add(&ele, max);
            {
                let set = set_slot_mut(srv, db_id, key);
                set.remove(&ele);
            }
        }

        // Придержать старое множество и подменить значение ключа новым.
        let old: ObjRef = srv.dbs[db_id]
            .main
            .get(key)
            .expect("set key vanished mid-command")
            .clone();
        let newobj = srv.new_object(Value::Set(newset.expect("at least one element remains")));
        crate::keyspace::db_overwrite(srv, db_id, key, newobj);

        // Остаток старого множества уходит клиенту, в поток — по SREM на
        // элемент.
        let Value::Set(old_set) = &old.value else {
            unreachable!()
        };
        for m in old_set.iter() {
            let ele = m.to_sds();
            propagate_srem(srv, db_id, key, &ele);
            reply.push(Reply::Bulk(ele));
        }
    }

    // Сама команда в поток не попадает: вместо неё уже ушли SREM.
    session.prevent_propagation = true;
    signal_modified_key(srv, db_id, key);
    srv.dirty += 1;
    Ok(Reply::Array(reply))
}

////////////////////////////////////////////////////////////////////////////////
// SRANDMEMBER
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct SRandMemberCommand {
    pub key: Sds,
    pub count: Option<Sds>,
}

impl CommandExecute for SRandMemberCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        if let Some(count) = &self.count {
            return srandmember_with_count(srv, session, &self.key, count);
        }

        let Some(obj) = lookup_key_read(srv, session.db_id, &self.key) else {
            return Ok(Reply::Nil);
        };
        check_set(&obj)?;

        let Value::Set(set) = &obj.value else {
            unreachable!()
        };
        let m = set
            .random_member(&mut thread_rng())
            .expect("random element of an empty set");
        Ok(Reply::Bulk(m.to_sds()))
    }
}

/// SRANDMEMBER key count.
fn srandmember_with_count(
    srv: &mut Server,
    session: &mut Session,
    key: &Sds,
    count_arg: &Sds,
) -> StoreResult<Reply> {
    let l = parse_long(count_arg)?;
    // Отрицательное количество разрешает повторы.
    let (count, uniq) = if l >= 0 {
        (l as usize, true)
    } else {
        (l.unsigned_abs() as usize, false)
    };

    let Some(obj) = lookup_key_read(srv, session.db_id, key) else {
        return Ok(Reply::empty_array());
    };
    check_set(&obj)?;

    if count == 0 {
        return Ok(Reply::empty_array());
    }

    let size = set_len(&obj);
    let Value::Set(set) = &obj.value else {
        unreachable!()
    };
    let mut rng = thread_rng();

    // Выборка с возвращением: просто count независимых розыгрышей.
    if !uniq {
        let mut reply = Vec::with_capacity(count);
        for _ in 0..count {
            let m = set
                .random_member(&mut rng)
                .expect("random element of an empty set");
            reply.push(Reply::Bulk(m.to_sds()));
        }
        return Ok(Reply::Array(reply));
    }

    // Запрошено не меньше всего множества: отдать всё.
    if count >= size {
        let members: Vec<Sds> = set.iter().map(|m| m.to_sds()).collect();
        return Ok(members.into());
    }

    let mut aux: crate::database::Dict<Sds, ()> = crate::database::Dict::new();

    if count.saturating_mul(SRANDMEMBER_SUB_STRATEGY_MUL) > size {
        // Запрошена крупная доля: скопировать всё и вычесть лишнее.
        for m in set.iter() {
            let added = aux.add(m.to_sds(), ());
            assert!(added, "duplicate member while copying a set");
        }

        let mut left = size;
        while left > count {
            let victim = aux
                .random_entry(&mut rng)
                .map(|(k, _)| k.clone())
                .expect("auxiliary dict drained below target");
            aux.remove(&victim);
            left -= 1;
        }
    } else {
        // Множество сильно больше запрошенного: добирать случайные
        // элементы с отбрасыванием дубликатов.
        let mut added = 0;
        while added < count {
            let m = set
                .random_member(&mut rng)
                .expect("random element of an empty set");
            if aux.add(m.to_sds(), ()) {
                added += 1;
            }
        }
    }

    let members: Vec<Sds> = aux.iter().map(|(k, _)| k.clone()).collect();
    Ok(members.into())
}

////////////////////////////////////////////////////////////////////////////////
// SINTER / SUNION / SDIFF
////////////////////////////////////////////////////////////////////////////////

/// Общий путь SINTER/SINTERSTORE/SMEMBERS.
fn sinter_generic(
    srv: &mut Server,
    session: &mut Session,
    keys: &[Sds],
    dstkey: Option<&Sds>,
) -> StoreResult<Reply> {
    let db_id = session.db_id;

    let mut sets: Vec<ObjRef> = Vec::with_capacity(keys.len());
    for k in keys {
        let obj = if dstkey.is_some() {
            lookup_key_write(srv, db_id, k)
        } else {
            lookup_key_read(srv, db_id, k)
        };

        let Some(obj) = obj else {
            // Пустой операнд делает пустым всё пересечение.
            return Ok(match dstkey {
                Some(dst) => {
                    if db_delete(srv, db_id, dst) {
                        signal_modified_key(srv, db_id, dst);
                        srv.dirty += 1;
                    }
                    Reply::Int(0)
                }
                None => Reply::empty_array(),
            });
        };
        check_set(&obj)?;
        sets.push(obj);
    }

    // От меньшего к большему: обходим наименьшее множество, пробуем
    // остальные.
    sets.sort_by_key(set_len);

    let max = srv.config.set_max_intset_entries;
    let mut dstset = dstkey.map(|_| SetValue::default());
    let mut out: Vec<Reply> = Vec::new();

    {
        let first = &sets[0];
        let Value::Set(first_set) = &first.value else {
            unreachable!()
        };

        'elements: for m in first_set.iter() {
            for other in &sets[1..] {
                if Arc::ptr_eq(other, first) {
                    continue;
                }
                let Value::Set(os) = &other.value else {
                    unreachable!()
                };
                let present = match m {
                    SetMember::Int(v) => os.contains_i64(v),
                    SetMember::Str(s) => os.contains(s),
                };
                if !present {
                    continue 'elements;
                }
            }

            // Элемент есть во всех множествах.
            match &mut dstset {
                Some(ds) => {
                    ds.add(&m.to_sds(), max);
                }
                None => out.push(Reply::Bulk(m.to_sds())),
            }
        }
    }

    match dstkey {
        Some(dst) => {
            let ds = dstset.expect("accumulator exists in store mode");
            store_result_set(srv, session, ds, dst, "sinterstore")
        }
        None => Ok(Reply::Array(out)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Union,
    Diff,
}

/// Общий путь SUNION/SUNIONSTORE/SDIFF/SDIFFSTORE.
fn sunion_diff_generic(
    srv: &mut Server,
    session: &mut Session,
    keys: &[Sds],
    dstkey: Option<&Sds>,
    op: SetOp,
) -> StoreResult<Reply> {
    let db_id = session.db_id;

    // Отсутствующие ключи ведут себя как пустые множества.
    let mut sets: Vec<Option<ObjRef>> = Vec::with_capacity(keys.len());
    for k in keys {
        let obj = if dstkey.is_some() {
            lookup_key_write(srv, db_id, k)
        } else {
            lookup_key_read(srv, db_id, k)
        };
        match obj {
            None => sets.push(None),
            Some(o) => {
                check_set(&o)?;
                sets.push(Some(o));
            }
        }
    }

    // Выбор алгоритма разности.
    //
    // Алгоритм 1: O(N*M) — N элементов первого множества, M множеств.
    // Алгоритм 2: O(N) — N элементов во всех множествах суммарно.
    let mut diff_algo = 1;
    if op == SetOp::Diff && sets[0].is_some() {
        let first_len = sets[0].as_ref().map(set_len).unwrap_or(0) as i64;
        let mut algo_one_work: i64 = 0;
        let mut algo_two_work: i64 = 0;

        for s in sets.iter().flatten() {
            algo_one_work += first_len;
            algo_two_work += set_len(s) as i64;
        }

        // Пробы на общих элементах обрываются рано: даём первому
        // алгоритму фору.
        algo_one_work /= 2;
        diff_algo = if algo_one_work <= algo_two_work { 1 } else { 2 };

        if diff_algo == 1 && sets.len() > 1 {
            // Вычитаемые — по убыванию размера: самый вероятный носитель
            // дубликата пробуется первым.
            sets[1..].sort_by(|a, b| {
                let la = a.as_ref().map(set_len).unwrap_or(0);
                let lb = b.as_ref().map(set_len).unwrap_or(0);
                lb.cmp(&la)
            });
        }
    }

    let max = srv.config.set_max_intset_entries;
    let mut dstset = SetValue::default();
    let mut cardinality: i64 = 0;

    match op {
        SetOp::Union => {
            // Объединение тривиально: добавить всё, дубликаты схлопнутся.
            for s in sets.iter().flatten() {
                let Value::Set(sv) = &s.value else {
                    unreachable!()
                };
                for m in sv.iter() {
                    if dstset.add(&m.to_sds(), max) {
                        cardinality += 1;
                    }
                }
            }
        }
        SetOp::Diff if sets[0].is_none() => {}
        SetOp::Diff if diff_algo == 1 => {
            // Обходим первое множество, элемент берём только если его нет
            // ни в одном из остальных.
            let first = sets[0].as_ref().expect("first operand present");
            let Value::Set(first_set) = &first.value else {
                unreachable!()
            };

            'elements: for m in first_set.iter() {
                let ele = m.to_sds();
                for other in sets[1..].iter() {
                    let Some(o) = other else {
                        continue;
                    };
                    if Arc::ptr_eq(o, first) {
                        continue 'elements;
                    }
                    let Value::Set(os) = &o.value else {
                        unreachable!()
                    };
                    if os.contains(&ele) {
                        continue 'elements;
                    }
                }

                dstset.add(&ele, max);
                cardinality += 1;
            }
        }
        SetOp::Diff => {
            // Скопировать первое множество, вычесть остальные. Пустой
            // аккумулятор дальше не меняется — выходим раньше.
            for (j, s) in sets.iter().enumerate() {
                let Some(o) = s else {
                    continue;
                };
                let Value::Set(sv) = &o.value else {
                    unreachable!()
                };

                for m in sv.iter() {
                    let ele = m.to_sds();
                    if j == 0 {
                        if dstset.add(&ele, max) {
                            cardinality += 1;
                        }
                    } else if dstset.remove(&ele) {
                        cardinality -= 1;
                    }
                }

                if cardinality == 0 {
                    break;
                }
            }
        }
    }

    match dstkey {
        Some(dst) => {
            let event = if op == SetOp::Union {
                "sunionstore"
            } else {
                "sdiffstore"
            };
            store_result_set(srv, session, dstset, dst, event)
        }
        None => {
            debug_assert_eq!(cardinality as usize, dstset.len());
            let members: Vec<Sds> = dstset.iter().map(|m| m.to_sds()).collect();
            Ok(members.into())
        }
    }
}

#[derive(Debug)]
pub struct SMembersCommand {
    pub key: Sds,
}

impl CommandExecute for SMembersCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        sinter_generic(srv, session, std::slice::from_ref(&self.key), None)
    }
}

#[derive(Debug)]
pub struct SInterCommand {
    pub keys: Vec<Sds>,
}

impl CommandExecute for SInterCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        sinter_generic(srv, session, &self.keys, None)
    }
}

#[derive(Debug)]
pub struct SInterStoreCommand {
    pub dst: Sds,
    pub keys: Vec<Sds>,
}

impl CommandExecute for SInterStoreCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        sinter_generic(srv, session, &self.keys, Some(&self.dst))
    }
}

#[derive(Debug)]
pub struct SUnionCommand {
    pub keys: Vec<Sds>,
}

impl CommandExecute for SUnionCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        sunion_diff_generic(srv, session, &self.keys, None, SetOp::Union)
    }
}

#[derive(Debug)]
pub struct SUnionStoreCommand {
    pub dst: Sds,
    pub keys: Vec<Sds>,
}

impl CommandExecute for SUnionStoreCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        sunion_diff_generic(srv, session, &self.keys, Some(&self.dst), SetOp::Union)
    }
}

#[derive(Debug)]
pub struct SDiffCommand {
    pub keys: Vec<Sds>,
}

impl CommandExecute for SDiffCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        sunion_diff_generic(srv, session, &self.keys, None, SetOp::Diff)
    }
}

#[derive(Debug)]
pub struct SDiffStoreCommand {
    pub dst: Sds,
    pub keys: Vec<Sds>,
}

impl CommandExecute for SDiffStoreCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        sunion_diff_generic(srv, session, &self.keys, Some(&self.dst), SetOp::Diff)
    }
}

////////////////////////////////////////////////////////////////////////////////
// SSCAN
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct SScanCommand {
    pub key: Sds,
    pub cursor: Sds,
    pub args: Vec<Sds>,
}

impl CommandExecute for SScanCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let cursor = parse_scan_cursor(&self.cursor)?;

        let Some(obj) = lookup_key_read(srv, session.db_id, &self.key) else {
            return Ok(Reply::Array(vec![
                Reply::bulk_str("0"),
                Reply::empty_array(),
            ]));
        };
        check_set(&obj)?;

        let (next, entries) = scan_generic(srv, session.db_id, Some(&obj), cursor, &self.args)?;
        Ok(Reply::Array(vec![
            Reply::Bulk(Sds::from_str(&next.to_string())),
            entries.into(),
        ]))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
