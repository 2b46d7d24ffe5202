//! Типонезависимые команды над пространством ключей.

use crate::{
    command::execute::{CommandExecute, Session},
    command::reply::Reply,
    database::Sds,
    engine::{notify::NOTIFY_GENERIC, Server},
    error::{StoreError, StoreResult},
    keyspace::{
        db::{db_async_delete, db_sync_delete},
        db_exists, db_random_key, empty_db, expire_if_needed, get_expire,
        lookup_key_read_with_flags, lookup_key_write, notify_keyspace_event, scan::parse_scan_cursor,
        scan_generic, set_expire, signal_flushed_db, signal_modified_key, swap_databases,
        MatchPattern, LOOKUP_NOTOUCH,
    },
};

////////////////////////////////////////////////////////////////////////////////
// DEL / UNLINK / EXISTS
////////////////////////////////////////////////////////////////////////////////

/// Общий путь DEL и UNLINK: различие только в пути освобождения.
fn del_generic(
    srv: &mut Server,
    session: &mut Session,
    keys: &[Sds],
    lazy: bool,
) -> StoreResult<Reply> {
    let db_id = session.db_id;
    let mut numdel = 0i64;

    for key in keys {
        expire_if_needed(srv, db_id, key);
        let deleted = if lazy {
            db_async_delete(srv, db_id, key)
        } else {
            db_sync_delete(srv, db_id, key)
        };
        if deleted {
            signal_modified_key(srv, db_id, key);
            notify_keyspace_event(srv, NOTIFY_GENERIC, "del", key, db_id);
            srv.dirty += 1;
            numdel += 1;
        }
    }
    Ok(Reply::Int(numdel))
}

#[derive(Debug)]
pub struct DelCommand {
    pub keys: Vec<Sds>,
}

impl CommandExecute for DelCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        del_generic(srv, session, &self.keys, false)
    }
}

#[derive(Debug)]
pub struct UnlinkCommand {
    pub keys: Vec<Sds>,
}

impl CommandExecute for UnlinkCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        del_generic(srv, session, &self.keys, true)
    }
}

#[derive(Debug)]
pub struct ExistsCommand {
    pub keys: Vec<Sds>,
}

impl CommandExecute for ExistsCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let db_id = session.db_id;
        let mut count = 0i64;

        for key in &self.keys {
            expire_if_needed(srv, db_id, key);
            if db_exists(srv, db_id, key) {
                count += 1;
            }
        }
        Ok(Reply::Int(count))
    }
}

////////////////////////////////////////////////////////////////////////////////
// SELECT / RANDOMKEY / DBSIZE / TYPE / LASTSAVE
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct SelectCommand {
    pub index: Sds,
}

impl CommandExecute for SelectCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let id = self
            .index
            .parse_i64()
            .ok_or_else(|| StoreError::InvalidDbIndex("invalid DB index".into()))?;

        if srv.config.cluster_enabled && id != 0 {
            return Err(StoreError::NotAllowedInCluster("SELECT"));
        }
        if id < 0 || id as usize >= srv.dbs.len() {
            return Err(StoreError::DbIndexOutOfRange);
        }

        session.db_id = id as usize;
        Ok(Reply::Ok)
    }
}

#[derive(Debug)]
pub struct RandomKeyCommand;

impl CommandExecute for RandomKeyCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        match db_random_key(srv, session.db_id) {
            None => Ok(Reply::Nil),
            Some(key) => Ok(Reply::Bulk(key)),
        }
    }
}

#[derive(Debug)]
pub struct DbSizeCommand;

impl CommandExecute for DbSizeCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        Ok(Reply::Int(srv.dbs[session.db_id].main.len() as i64))
    }
}

#[derive(Debug)]
pub struct TypeCommand {
    pub key: Sds,
}

impl CommandExecute for TypeCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let name = lookup_key_read_with_flags(srv, session.db_id, &self.key, LOOKUP_NOTOUCH)
            .map(|o| o.type_name())
            .unwrap_or("none");
        Ok(Reply::Status(name))
    }
}

#[derive(Debug)]
pub struct LastSaveCommand;

impl CommandExecute for LastSaveCommand {
    fn execute(
        &self,
        srv: &mut Server,
        _session: &mut Session,
    ) -> StoreResult<Reply> {
        Ok(Reply::Int(srv.lastsave))
    }
}

////////////////////////////////////////////////////////////////////////////////
// KEYS / SCAN
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct KeysCommand {
    pub pattern: Sds,
}

impl CommandExecute for KeysCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let db_id = session.db_id;
        let allkeys = self.pattern.as_slice() == b"*";
        let pattern = MatchPattern::new(&self.pattern);

        let candidates: Vec<Sds> = srv.dbs[db_id]
            .main
            .iter()
            .filter(|(k, _)| allkeys || pattern.matches(k))
            .map(|(k, _)| k.clone())
            .collect();

        let mut out = Vec::with_capacity(candidates.len());
        for key in candidates {
            if !expire_if_needed(srv, db_id, &key) {
                out.push(key);
            }
        }
        Ok(out.into())
    }
}

#[derive(Debug)]
pub struct ScanCommand {
    pub cursor: Sds,
    pub args: Vec<Sds>,
}

impl CommandExecute for ScanCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let cursor = parse_scan_cursor(&self.cursor)?;
        let (next, entries) = scan_generic(srv, session.db_id, None, cursor, &self.args)?;
        Ok(Reply::Array(vec![
            Reply::Bulk(Sds::from_str(&next.to_string())),
            entries.into(),
        ]))
    }
}

////////////////////////////////////////////////////////////////////////////////
// FLUSHDB / FLUSHALL / SHUTDOWN
////////////////////////////////////////////////////////////////////////////////

/// Разбирает опциональный флаг ASYNC команд FLUSH*.
fn parse_flush_async(args: &[Sds]) -> StoreResult<bool> {
    match args {
        [] => Ok(false),
        [flag] if flag.eq_ignore_ascii_case(b"async") => Ok(true),
        _ => Err(StoreError::Syntax),
    }
}

#[derive(Debug)]
pub struct FlushDbCommand {
    pub args: Vec<Sds>,
}

impl CommandExecute for FlushDbCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let async_flag = parse_flush_async(&self.args)?;
        let db_id = session.db_id;

        signal_flushed_db(srv, db_id as i64);
        let removed = empty_db(srv, db_id as i64, async_flag, None)?;
        srv.dirty += removed;
        Ok(Reply::Ok)
    }
}

#[derive(Debug)]
pub struct FlushAllCommand {
    pub args: Vec<Sds>,
}

impl CommandExecute for FlushAllCommand {
    fn execute(
        &self,
        srv: &mut Server,
        _session: &mut Session,
    ) -> StoreResult<Reply> {
        let async_flag = parse_flush_async(&self.args)?;

        signal_flushed_db(srv, -1);
        let removed = empty_db(srv, -1, async_flag, None)?;
        srv.dirty += removed;

        // Коллаборатор персистентности снимает свежий снапшот и убирает
        // фонового потомка; счётчик dirty он не сбрасывает, иначе FLUSHALL
        // не доедет до AOF и реплик.
        srv.hooks.persistence.on_flushall();
        srv.dirty += 1;
        Ok(Reply::Ok)
    }
}

#[derive(Debug)]
pub struct ShutdownCommand {
    pub arg: Option<Sds>,
}

impl CommandExecute for ShutdownCommand {
    fn execute(
        &self,
        srv: &mut Server,
        _session: &mut Session,
    ) -> StoreResult<Reply> {
        let mut save = match &self.arg {
            None => None,
            Some(a) if a.eq_ignore_ascii_case(b"nosave") => Some(false),
            Some(a) if a.eq_ignore_ascii_case(b"save") => Some(true),
            Some(_) => return Err(StoreError::Syntax),
        };

        // Посреди загрузки датасета сохраняться нельзя: на диске оказалась
        // бы полупрочитанная база.
        if srv.loading {
            save = Some(false);
        }

        if srv.hooks.persistence.prepare_for_shutdown(save.unwrap_or(true)) {
            Err(StoreError::Shutdown)
        } else {
            Err(StoreError::ShutdownFailed)
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// RENAME / RENAMENX / MOVE / SWAPDB
////////////////////////////////////////////////////////////////////////////////

/// Общий путь RENAME/RENAMENX.
fn rename_generic(
    srv: &mut Server,
    session: &mut Session,
    src: &Sds,
    dst: &Sds,
    nx: bool,
) -> StoreResult<Reply> {
    let db_id = session.db_id;

    // Совпадающие имена — не операция, но отсутствующий ключ всё равно
    // ошибка.
    let samekey = src == dst;

    let Some(obj) = lookup_key_write(srv, db_id, src) else {
        return Err(StoreError::NoSuchKey);
    };

    if samekey {
        return Ok(if nx { Reply::Int(0) } else { Reply::Ok });
    }

    let expire = get_expire(srv, db_id, src);
    if lookup_key_write(srv, db_id, dst).is_some() {
        if nx {
            return Ok(Reply::Int(0));
        }
        // Перезапись: старое значение назначения удаляется молча.
        crate::keyspace::db_delete(srv, db_id, dst);
    }

    crate::keyspace::db_add(srv, db_id, dst, obj);
    if expire != -1 {
        set_expire(srv, db_id, dst, expire);
    }
    crate::keyspace::db_delete(srv, db_id, src);

    signal_modified_key(srv, db_id, src);
    signal_modified_key(srv, db_id, dst);
    notify_keyspace_event(srv, NOTIFY_GENERIC, "rename_from", src, db_id);
    notify_keyspace_event(srv, NOTIFY_GENERIC, "rename_to", dst, db_id);
    srv.dirty += 1;

    Ok(if nx { Reply::Int(1) } else { Reply::Ok })
}

#[derive(Debug)]
pub struct RenameCommand {
    pub src: Sds,
    pub dst: Sds,
}

impl CommandExecute for RenameCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        rename_generic(srv, session, &self.src, &self.dst, false)
    }
}

#[derive(Debug)]
pub struct RenameNxCommand {
    pub src: Sds,
    pub dst: Sds,
}

impl CommandExecute for RenameNxCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        rename_generic(srv, session, &self.src, &self.dst, true)
    }
}

#[derive(Debug)]
pub struct MoveCommand {
    pub key: Sds,
    pub db: Sds,
}

impl CommandExecute for MoveCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        if srv.config.cluster_enabled {
            return Err(StoreError::NotAllowedInCluster("MOVE"));
        }

        let src_id = session.db_id;
        let dst_id = match self.db.parse_i64() {
            Some(id) if id >= 0 && (id as usize) < srv.dbs.len() => id as usize,
            _ => return Err(StoreError::OutOfRange),
        };

        if src_id == dst_id {
            return Err(StoreError::SameObject);
        }

        let Some(obj) = lookup_key_write(srv, src_id, &self.key) else {
            return Ok(Reply::Int(0));
        };
        let expire = get_expire(srv, src_id, &self.key);

        // Ключ уже есть в базе назначения: перенос не происходит.
        if lookup_key_write(srv, dst_id, &self.key).is_some() {
            return Ok(Reply::Int(0));
        }

        crate::keyspace::db_add(srv, dst_id, &self.key, obj);
        if expire != -1 {
            set_expire(srv, dst_id, &self.key, expire);
        }
        crate::keyspace::db_delete(srv, src_id, &self.key);
        srv.dirty += 1;
        Ok(Reply::Int(1))
    }
}

#[derive(Debug)]
pub struct SwapDbCommand {
    pub first: Sds,
    pub second: Sds,
}

impl CommandExecute for SwapDbCommand {
    fn execute(
        &self,
        srv: &mut Server,
        _session: &mut Session,
    ) -> StoreResult<Reply> {
        // В кластерном режиме существует только база 0.
        if srv.config.cluster_enabled {
            return Err(StoreError::NotAllowedInCluster("SWAPDB"));
        }

        let id1 = self
            .first
            .parse_i64()
            .ok_or_else(|| StoreError::InvalidDbIndex("invalid first DB index".into()))?;
        let id2 = self
            .second
            .parse_i64()
            .ok_or_else(|| StoreError::InvalidDbIndex("invalid second DB index".into()))?;

        if id1 < 0 || id2 < 0 || !swap_databases(srv, id1 as usize, id2 as usize) {
            return Err(StoreError::DbIndexOutOfRange);
        }

        srv.dirty += 1;
        Ok(Reply::Ok)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::set::SAddCommand;
    use crate::database::{StrValue, Value};
    use crate::keyspace::db_add;

    fn setup() -> (Server, Session) {
        (Server::default(), Session::new())
    }

    fn sds(s: &str) -> Sds {
        Sds::from_str(s)
    }

    fn add_str(
        srv: &mut Server,
        db_id: usize,
        key: &str,
        val: &str,
    ) {
        let obj = srv.new_object(Value::Str(StrValue::Raw(sds(val))));
        db_add(srv, db_id, &sds(key), obj);
    }

    /// Тест проверяет DEL: количество удалённых, событие del, дубликаты
    /// не считаются.
    #[test]
    fn del_counts_removed() {
        let (mut srv, mut session) = setup();
        add_str(&mut srv, 0, "a", "1");
        add_str(&mut srv, 0, "b", "2");

        let cmd = DelCommand {
            keys: vec![sds("a"), sds("b"), sds("missing"), sds("a")],
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Int(2));
        assert_eq!(srv.dirty, 2);
    }

    /// Тест проверяет EXISTS: N-арный подсчёт с повторами.
    #[test]
    fn exists_counts_with_duplicates() {
        let (mut srv, mut session) = setup();
        add_str(&mut srv, 0, "a", "1");

        let cmd = ExistsCommand {
            keys: vec![sds("a"), sds("a"), sds("missing")],
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Int(2));
    }

    /// Тест проверяет SELECT: смена базы, ошибки диапазона.
    #[test]
    fn select_switches_db() {
        let (mut srv, mut session) = setup();

        let cmd = SelectCommand { index: sds("3") };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Ok);
        assert_eq!(session.db_id, 3);

        let cmd = SelectCommand { index: sds("99") };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::DbIndexOutOfRange)
        ));

        let cmd = SelectCommand { index: sds("x") };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::InvalidDbIndex(_))
        ));
    }

    /// Тест проверяет SELECT в кластерном режиме.
    #[test]
    fn select_in_cluster_mode() {
        use crate::config::Settings;
        let mut srv = Server::new(Settings {
            cluster_enabled: true,
            ..Settings::default()
        });
        let mut session = Session::new();

        let cmd = SelectCommand { index: sds("0") };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Ok);

        let cmd = SelectCommand { index: sds("1") };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::NotAllowedInCluster("SELECT"))
        ));
    }

    /// Тест проверяет TYPE: имя типа, "none" и отсутствие обновления
    /// поля доступа.
    #[test]
    fn type_reports_without_touch() {
        let (mut srv, mut session) = setup();
        add_str(&mut srv, 0, "s", "v");
        let before = srv.dbs[0].main.get(&sds("s")).unwrap().lru();

        let cmd = TypeCommand { key: sds("s") };
        assert_eq!(
            cmd.execute(&mut srv, &mut session).unwrap(),
            Reply::Status("string")
        );
        let after = srv.dbs[0].main.get(&sds("s")).unwrap().lru();
        assert_eq!(before, after);

        let cmd = TypeCommand { key: sds("none") };
        assert_eq!(
            cmd.execute(&mut srv, &mut session).unwrap(),
            Reply::Status("none")
        );
    }

    /// Тест проверяет KEYS: glob-фильтр и отсев истёкших.
    #[test]
    fn keys_filters_pattern_and_expired() {
        let (mut srv, mut session) = setup();
        srv.fixed_time_ms = Some(1_000);
        add_str(&mut srv, 0, "user:1", "a");
        add_str(&mut srv, 0, "user:2", "b");
        add_str(&mut srv, 0, "other", "c");
        set_expire(&mut srv, 0, &sds("user:2"), 500);

        let cmd = KeysCommand {
            pattern: sds("user:*"),
        };
        let Reply::Array(items) = cmd.execute(&mut srv, &mut session).unwrap() else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], Reply::Bulk(sds("user:1")));
    }

    /// Тест проверяет DBSIZE.
    #[test]
    fn dbsize_counts_keys() {
        let (mut srv, mut session) = setup();
        add_str(&mut srv, 0, "a", "1");
        add_str(&mut srv, 0, "b", "2");

        let cmd = DbSizeCommand;
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Int(2));
    }

    /// Тест проверяет FLUSHDB и разбор флага ASYNC.
    #[test]
    fn flushdb_clears_current_db() {
        let (mut srv, mut session) = setup();
        add_str(&mut srv, 0, "a", "1");
        add_str(&mut srv, 1, "b", "2");

        let cmd = FlushDbCommand { args: vec![] };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Ok);
        assert_eq!(srv.dbs[0].main.len(), 0);
        assert_eq!(srv.dbs[1].main.len(), 1);
        assert_eq!(srv.dirty, 1);

        let cmd = FlushDbCommand {
            args: vec![sds("bogus")],
        };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::Syntax)
        ));
    }

    /// Тест проверяет FLUSHALL [ASYNC].
    #[test]
    fn flushall_clears_everything() {
        let (mut srv, mut session) = setup();
        add_str(&mut srv, 0, "a", "1");
        add_str(&mut srv, 1, "b", "2");

        let cmd = FlushAllCommand {
            args: vec![sds("ASYNC")],
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Ok);
        assert_eq!(srv.dbs[0].main.len(), 0);
        assert_eq!(srv.dbs[1].main.len(), 0);
        // Два удалённых ключа плюс завершающая единица.
        assert_eq!(srv.dirty, 3);
    }

    /// Тест проверяет RENAME: перенос значения и истечения, события.
    #[test]
    fn rename_carries_value_and_expire() {
        use crate::engine::hooks::RecordingHooks;

        let (mut srv, mut session) = setup();
        let rec = RecordingHooks::default();
        srv.hooks.notify = Box::new(rec.clone());
        srv.notify_flags = u32::MAX;
        srv.fixed_time_ms = Some(1_000);

        add_str(&mut srv, 0, "k", "v");
        set_expire(&mut srv, 0, &sds("k"), 100_000);

        let cmd = RenameCommand {
            src: sds("k"),
            dst: sds("k2"),
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Ok);

        assert!(!db_exists(&srv, 0, &sds("k")));
        assert!(db_exists(&srv, 0, &sds("k2")));
        assert_eq!(get_expire(&srv, 0, &sds("k2")), 100_000);

        let events: Vec<String> = rec
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event.clone())
            .collect();
        assert_eq!(events, vec!["rename_from", "rename_to"]);
    }

    /// Тест проверяет RENAME отсутствующего ключа и совпадающие имена.
    #[test]
    fn rename_edge_cases() {
        let (mut srv, mut session) = setup();

        let cmd = RenameCommand {
            src: sds("missing"),
            dst: sds("x"),
        };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::NoSuchKey)
        ));

        add_str(&mut srv, 0, "k", "v");
        let cmd = RenameCommand {
            src: sds("k"),
            dst: sds("k"),
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Ok);

        let cmd = RenameNxCommand {
            src: sds("k"),
            dst: sds("k"),
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Int(0));
    }

    /// Тест проверяет RENAMENX с занятым назначением.
    #[test]
    fn renamenx_respects_existing_destination() {
        let (mut srv, mut session) = setup();
        add_str(&mut srv, 0, "a", "1");
        add_str(&mut srv, 0, "b", "2");

        let cmd = RenameNxCommand {
            src: sds("a"),
            dst: sds("b"),
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Int(0));
        assert!(db_exists(&srv, 0, &sds("a")));

        let cmd = RenameNxCommand {
            src: sds("a"),
            dst: sds("c"),
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Int(1));
    }

    /// Тест проверяет MOVE между базами с переносом истечения.
    #[test]
    fn move_between_databases() {
        let (mut srv, mut session) = setup();
        srv.fixed_time_ms = Some(1_000);
        add_str(&mut srv, 0, "k", "v");
        set_expire(&mut srv, 0, &sds("k"), 50_000);

        let cmd = MoveCommand {
            key: sds("k"),
            db: sds("1"),
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Int(1));
        assert!(!db_exists(&srv, 0, &sds("k")));
        assert!(db_exists(&srv, 1, &sds("k")));
        assert_eq!(get_expire(&srv, 1, &sds("k")), 50_000);

        // Занятое назначение: перенос не происходит.
        add_str(&mut srv, 0, "k", "other");
        let cmd = MoveCommand {
            key: sds("k"),
            db: sds("1"),
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Int(0));

        // Совпадающие базы — ошибка.
        let cmd = MoveCommand {
            key: sds("k"),
            db: sds("0"),
        };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::SameObject)
        ));
    }

    /// Тест проверяет SWAPDB, включая сценарий с множеством.
    #[test]
    fn swapdb_exchanges_contents() {
        let (mut srv, mut session) = setup();

        let sadd = SAddCommand {
            key: sds("s"),
            members: vec![sds("a")],
        };
        sadd.execute(&mut srv, &mut session).unwrap();

        let cmd = SwapDbCommand {
            first: sds("0"),
            second: sds("1"),
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Ok);
        assert!(!db_exists(&srv, 0, &sds("s")));
        assert!(db_exists(&srv, 1, &sds("s")));

        let cmd = SwapDbCommand {
            first: sds("0"),
            second: sds("99"),
        };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::DbIndexOutOfRange)
        ));
    }

    /// Тест проверяет SHUTDOWN: сигнал и синтаксис.
    #[test]
    fn shutdown_signals() {
        let (mut srv, mut session) = setup();

        let cmd = ShutdownCommand { arg: None };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::Shutdown)
        ));

        let cmd = ShutdownCommand {
            arg: Some(sds("NOSAVE")),
        };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::Shutdown)
        ));

        let cmd = ShutdownCommand {
            arg: Some(sds("bogus")),
        };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::Syntax)
        ));
    }

    /// Тест проверяет RANDOMKEY на пустой и непустой базе.
    #[test]
    fn randomkey_reports() {
        let (mut srv, mut session) = setup();

        let cmd = RandomKeyCommand;
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Nil);

        add_str(&mut srv, 0, "only", "v");
        assert_eq!(
            cmd.execute(&mut srv, &mut session).unwrap(),
            Reply::Bulk(sds("only"))
        );
    }

    /// Тест проверяет SCAN: полный проход по ключам.
    #[test]
    fn scan_walks_keyspace() {
        let (mut srv, mut session) = setup();
        for i in 0..50 {
            add_str(&mut srv, 0, &format!("k{i}"), "v");
        }

        let mut seen = std::collections::HashSet::new();
        let mut cursor = sds("0");
        loop {
            let cmd = ScanCommand {
                cursor: cursor.clone(),
                args: vec![],
            };
            let Reply::Array(parts) = cmd.execute(&mut srv, &mut session).unwrap() else {
                panic!("expected array");
            };
            let Reply::Bulk(next) = &parts[0] else {
                panic!("expected cursor");
            };
            let Reply::Array(batch) = &parts[1] else {
                panic!("expected batch");
            };
            for r in batch {
                let Reply::Bulk(k) = r else {
                    panic!("expected bulk")
                };
                seen.insert(k.clone());
            }
            if next.as_slice() == b"0" {
                break;
            }
            cursor = next.clone();
        }
        assert_eq!(seen.len(), 50);
    }
}
