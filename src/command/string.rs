//! Строковые команды: минимум, которым пользуется пространство ключей.

use crate::{
    command::execute::{CommandExecute, Session},
    command::reply::Reply,
    database::{shared_int, Sds, StrValue, Value},
    engine::{
        notify::{NOTIFY_GENERIC, NOTIFY_STRING},
        Server,
    },
    error::{StoreError, StoreResult},
    keyspace::{
        lookup_key_read, notify_keyspace_event, scan::string_value_bytes, set_expire, set_key,
    },
};

/// Единица времени у опции истечения SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireUnit {
    Seconds,
    Milliseconds,
}

#[derive(Debug)]
pub struct SetCommand {
    pub key: Sds,
    pub value: Sds,
    pub expire: Option<(ExpireUnit, Sds)>,
}

impl CommandExecute for SetCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let db_id = session.db_id;

        let expire_ms = match &self.expire {
            None => None,
            Some((unit, raw)) => {
                let n = raw.parse_i64().ok_or(StoreError::NotAnInteger)?;
                if n <= 0 {
                    return Err(StoreError::InvalidExpireTime("set"));
                }
                Some(match unit {
                    ExpireUnit::Seconds => n * 1000,
                    ExpireUnit::Milliseconds => n,
                })
            }
        };

        // Маленькие числа берутся из пула общих объектов, остальные
        // числовые значения пакуются, прочее хранится как есть.
        let obj = match self.value.parse_i64() {
            Some(v) => {
                shared_int(v).unwrap_or_else(|| srv.new_object(Value::Str(StrValue::Int(v))))
            }
            None => srv.new_object(Value::Str(StrValue::Raw(self.value.clone()))),
        };

        set_key(srv, db_id, &self.key, obj);
        srv.dirty += 1;
        if let Some(ms) = expire_ms {
            let when = srv.mstime() + ms;
            set_expire(srv, db_id, &self.key, when);
        }

        notify_keyspace_event(srv, NOTIFY_STRING, "set", &self.key, db_id);
        if expire_ms.is_some() {
            notify_keyspace_event(srv, NOTIFY_GENERIC, "expire", &self.key, db_id);
        }

        Ok(Reply::Ok)
    }
}

#[derive(Debug)]
pub struct GetCommand {
    pub key: Sds,
}

impl CommandExecute for GetCommand {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        let Some(obj) = lookup_key_read(srv, session.db_id, &self.key) else {
            return Ok(Reply::Nil);
        };

        match &obj.value {
            Value::Str(s) => Ok(Reply::Bulk(string_value_bytes(s))),
            _ => Err(StoreError::WrongType),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::get_expire;

    fn setup() -> (Server, Session) {
        (Server::default(), Session::new())
    }

    fn sds(s: &str) -> Sds {
        Sds::from_str(s)
    }

    /// Тест проверяет SET и GET.
    #[test]
    fn set_then_get() {
        let (mut srv, mut session) = setup();

        let cmd = SetCommand {
            key: sds("k"),
            value: sds("hello"),
            expire: None,
        };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Ok);

        let cmd = GetCommand { key: sds("k") };
        assert_eq!(
            cmd.execute(&mut srv, &mut session).unwrap(),
            Reply::Bulk(sds("hello"))
        );

        let cmd = GetCommand { key: sds("nope") };
        assert_eq!(cmd.execute(&mut srv, &mut session).unwrap(), Reply::Nil);
    }

    /// Тест проверяет упаковку числа и пул общих объектов.
    #[test]
    fn set_packs_integers() {
        let (mut srv, mut session) = setup();

        let cmd = SetCommand {
            key: sds("n"),
            value: sds("42"),
            expire: None,
        };
        cmd.execute(&mut srv, &mut session).unwrap();

        let obj = srv.dbs[0].main.get(&sds("n")).unwrap();
        assert_eq!(obj.encoding_name(), "int");

        let cmd = GetCommand { key: sds("n") };
        assert_eq!(
            cmd.execute(&mut srv, &mut session).unwrap(),
            Reply::Bulk(sds("42"))
        );
    }

    /// Тест проверяет SET EX: истечение выставлено, повторный SET его
    /// снимает.
    #[test]
    fn set_with_expire_then_persistent_set() {
        let (mut srv, mut session) = setup();
        srv.fixed_time_ms = Some(1_000);

        let cmd = SetCommand {
            key: sds("k"),
            value: sds("v"),
            expire: Some((ExpireUnit::Seconds, sds("100"))),
        };
        cmd.execute(&mut srv, &mut session).unwrap();
        assert_eq!(get_expire(&srv, 0, &sds("k")), 101_000);

        let cmd = SetCommand {
            key: sds("k"),
            value: sds("w"),
            expire: None,
        };
        cmd.execute(&mut srv, &mut session).unwrap();
        assert_eq!(get_expire(&srv, 0, &sds("k")), -1);
    }

    /// Тест проверяет отказ на неположительном времени истечения.
    #[test]
    fn set_rejects_bad_expire() {
        let (mut srv, mut session) = setup();

        let cmd = SetCommand {
            key: sds("k"),
            value: sds("v"),
            expire: Some((ExpireUnit::Seconds, sds("0"))),
        };
        assert!(matches!(
            cmd.execute(&mut srv, &mut session),
            Err(StoreError::InvalidExpireTime(_))
        ));
    }
}
