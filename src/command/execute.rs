//! Диспетчер команд.
//!
//! Разбирает вектор аргументов в типизированную команду, проверяет
//! арность по таблице, исполняет и решает судьбу трансляции: команда
//! уходит в поток изменений, только если она что-то изменила и не
//! подавила либо не переписала собственную трансляцию.

use crate::{
    command::keyspace::{
        DbSizeCommand, DelCommand, ExistsCommand, FlushAllCommand, FlushDbCommand, KeysCommand,
        LastSaveCommand, MoveCommand, RandomKeyCommand, RenameCommand, RenameNxCommand,
        ScanCommand, SelectCommand, ShutdownCommand, SwapDbCommand, TypeCommand, UnlinkCommand,
    },
    command::reply::Reply,
    command::set::{
        SAddCommand, SCardCommand, SDiffCommand, SDiffStoreCommand, SInterCommand,
        SInterStoreCommand, SIsMemberCommand, SMembersCommand, SMoveCommand, SPopCommand,
        SRandMemberCommand, SRemCommand, SScanCommand, SUnionCommand, SUnionStoreCommand,
    },
    command::string::{ExpireUnit, GetCommand, SetCommand},
    command::table::lookup_command,
    database::Sds,
    engine::{Caller, Server},
    error::{StoreError, StoreResult},
    keyspace::CMD_READONLY,
};

/// Кем открыт текущий сеанс.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerOrigin {
    /// Канал репликации с мастера.
    MasterLink,
    /// Обычный клиент.
    Normal,
}

/// Состояние сеанса: выбранная база и решения о трансляции текущей
/// команды.
#[derive(Debug)]
pub struct Session {
    pub db_id: usize,
    pub origin: CallerOrigin,
    /// Команда подавила собственную трансляцию (например, SPOP с
    /// количеством уже отправил синтетические SREM).
    pub prevent_propagation: bool,
    /// Команда заменила себя в потоке изменений другой (SPOP -> SREM).
    pub rewritten_argv: Option<Vec<Sds>>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            db_id: 0,
            origin: CallerOrigin::Normal,
            prevent_propagation: false,
            rewritten_argv: None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Исполняемая команда.
pub trait CommandExecute: std::fmt::Debug {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply>;
}

#[derive(Debug)]
pub enum Command {
    // Множества
    SAdd(SAddCommand),
    SRem(SRemCommand),
    SMove(SMoveCommand),
    SIsMember(SIsMemberCommand),
    SCard(SCardCommand),
    SPop(SPopCommand),
    SRandMember(SRandMemberCommand),
    SMembers(SMembersCommand),
    SInter(SInterCommand),
    SInterStore(SInterStoreCommand),
    SUnion(SUnionCommand),
    SUnionStore(SUnionStoreCommand),
    SDiff(SDiffCommand),
    SDiffStore(SDiffStoreCommand),
    SScan(SScanCommand),
    // Пространство ключей
    Del(DelCommand),
    Unlink(UnlinkCommand),
    Exists(ExistsCommand),
    Select(SelectCommand),
    RandomKey(RandomKeyCommand),
    Keys(KeysCommand),
    Scan(ScanCommand),
    DbSize(DbSizeCommand),
    Type(TypeCommand),
    Shutdown(ShutdownCommand),
    FlushDb(FlushDbCommand),
    FlushAll(FlushAllCommand),
    Rename(RenameCommand),
    RenameNx(RenameNxCommand),
    Move(MoveCommand),
    SwapDb(SwapDbCommand),
    LastSave(LastSaveCommand),
    // Строки
    Set(SetCommand),
    Get(GetCommand),
}

impl CommandExecute for Command {
    fn execute(
        &self,
        srv: &mut Server,
        session: &mut Session,
    ) -> StoreResult<Reply> {
        match self {
            Command::SAdd(cmd) => cmd.execute(srv, session),
            Command::SRem(cmd) => cmd.execute(srv, session),
            Command::SMove(cmd) => cmd.execute(srv, session),
            Command::SIsMember(cmd) => cmd.execute(srv, session),
            Command::SCard(cmd) => cmd.execute(srv, session),
            Command::SPop(cmd) => cmd.execute(srv, session),
            Command::SRandMember(cmd) => cmd.execute(srv, session),
            Command::SMembers(cmd) => cmd.execute(srv, session),
            Command::SInter(cmd) => cmd.execute(srv, session),
            Command::SInterStore(cmd) => cmd.execute(srv, session),
            Command::SUnion(cmd) => cmd.execute(srv, session),
            Command::SUnionStore(cmd) => cmd.execute(srv, session),
            Command::SDiff(cmd) => cmd.execute(srv, session),
            Command::SDiffStore(cmd) => cmd.execute(srv, session),
            Command::SScan(cmd) => cmd.execute(srv, session),
            Command::Del(cmd) => cmd.execute(srv, session),
            Command::Unlink(cmd) => cmd.execute(srv, session),
            Command::Exists(cmd) => cmd.execute(srv, session),
            Command::Select(cmd) => cmd.execute(srv, session),
            Command::RandomKey(cmd) => cmd.execute(srv, session),
            Command::Keys(cmd) => cmd.execute(srv, session),
            Command::Scan(cmd) => cmd.execute(srv, session),
            Command::DbSize(cmd) => cmd.execute(srv, session),
            Command::Type(cmd) => cmd.execute(srv, session),
            Command::Shutdown(cmd) => cmd.execute(srv, session),
            Command::FlushDb(cmd) => cmd.execute(srv, session),
            Command::FlushAll(cmd) => cmd.execute(srv, session),
            Command::Rename(cmd) => cmd.execute(srv, session),
            Command::RenameNx(cmd) => cmd.execute(srv, session),
            Command::Move(cmd) => cmd.execute(srv, session),
            Command::SwapDb(cmd) => cmd.execute(srv, session),
            Command::LastSave(cmd) => cmd.execute(srv, session),
            Command::Set(cmd) => cmd.execute(srv, session),
            Command::Get(cmd) => cmd.execute(srv, session),
        }
    }
}

/// Собирает типизированную команду из вектора аргументов. Арность уже
/// проверена по таблице.
fn parse_command(
    name: &str,
    argv: &[Sds],
) -> StoreResult<Command> {
    let cmd = match name {
        "sadd" => Command::SAdd(SAddCommand {
            key: argv[1].clone(),
            members: argv[2..].to_vec(),
        }),
        "srem" => Command::SRem(SRemCommand {
            key: argv[1].clone(),
            members: argv[2..].to_vec(),
        }),
        "smove" => Command::SMove(SMoveCommand {
            src: argv[1].clone(),
            dst: argv[2].clone(),
            member: argv[3].clone(),
        }),
        "sismember" => Command::SIsMember(SIsMemberCommand {
            key: argv[1].clone(),
            member: argv[2].clone(),
        }),
        "scard" => Command::SCard(SCardCommand {
            key: argv[1].clone(),
        }),
        "spop" => {
            if argv.len() > 3 {
                return Err(StoreError::Syntax);
            }
            Command::SPop(SPopCommand {
                key: argv[1].clone(),
                count: argv.get(2).cloned(),
            })
        }
        "srandmember" => {
            if argv.len() > 3 {
                return Err(StoreError::Syntax);
            }
            Command::SRandMember(SRandMemberCommand {
                key: argv[1].clone(),
                count: argv.get(2).cloned(),
            })
        }
        "smembers" => Command::SMembers(SMembersCommand {
            key: argv[1].clone(),
        }),
        "sinter" => Command::SInter(SInterCommand {
            keys: argv[1..].to_vec(),
        }),
        "sinterstore" => Command::SInterStore(SInterStoreCommand {
            dst: argv[1].clone(),
            keys: argv[2..].to_vec(),
        }),
        "sunion" => Command::SUnion(SUnionCommand {
            keys: argv[1..].to_vec(),
        }),
        "sunionstore" => Command::SUnionStore(SUnionStoreCommand {
            dst: argv[1].clone(),
            keys: argv[2..].to_vec(),
        }),
        "sdiff" => Command::SDiff(SDiffCommand {
            keys: argv[1..].to_vec(),
        }),
        "sdiffstore" => Command::SDiffStore(SDiffStoreCommand {
            dst: argv[1].clone(),
            keys: argv[2..].to_vec(),
        }),
        "sscan" => Command::SScan(SScanCommand {
            key: argv[1].clone(),
            cursor: argv[2].clone(),
            args: argv[3..].to_vec(),
        }),
        "del" => Command::Del(DelCommand {
            keys: argv[1..].to_vec(),
        }),
        "unlink" => Command::Unlink(UnlinkCommand {
            keys: argv[1..].to_vec(),
        }),
        "exists" => Command::Exists(ExistsCommand {
            keys: argv[1..].to_vec(),
        }),
        "select" => Command::Select(SelectCommand {
            index: argv[1].clone(),
        }),
        "randomkey" => Command::RandomKey(RandomKeyCommand),
        "keys" => Command::Keys(KeysCommand {
            pattern: argv[1].clone(),
        }),
        "scan" => Command::Scan(ScanCommand {
            cursor: argv[1].clone(),
            args: argv[2..].to_vec(),
        }),
        "dbsize" => Command::DbSize(DbSizeCommand),
        "type" => Command::Type(TypeCommand {
            key: argv[1].clone(),
        }),
        "shutdown" => {
            if argv.len() > 2 {
                return Err(StoreError::Syntax);
            }
            Command::Shutdown(ShutdownCommand {
                arg: argv.get(1).cloned(),
            })
        }
        "flushdb" => Command::FlushDb(FlushDbCommand {
            args: argv[1..].to_vec(),
        }),
        "flushall" => Command::FlushAll(FlushAllCommand {
            args: argv[1..].to_vec(),
        }),
        "rename" => Command::Rename(RenameCommand {
            src: argv[1].clone(),
            dst: argv[2].clone(),
        }),
        "renamenx" => Command::RenameNx(RenameNxCommand {
            src: argv[1].clone(),
            dst: argv[2].clone(),
        }),
        "move" => Command::Move(MoveCommand {
            key: argv[1].clone(),
            db: argv[2].clone(),
        }),
        "swapdb" => Command::SwapDb(SwapDbCommand {
            first: argv[1].clone(),
            second: argv[2].clone(),
        }),
        "lastsave" => Command::LastSave(LastSaveCommand),
        "set" => {
            let mut expire = None;
            let mut i = 3;
            while i < argv.len() {
                let rest = argv.len() - i;
                if argv[i].eq_ignore_ascii_case(b"ex") && rest >= 2 {
                    expire = Some((ExpireUnit::Seconds, argv[i + 1].clone()));
                    i += 2;
                } else if argv[i].eq_ignore_ascii_case(b"px") && rest >= 2 {
                    expire = Some((ExpireUnit::Milliseconds, argv[i + 1].clone()));
                    i += 2;
                } else {
                    return Err(StoreError::Syntax);
                }
            }
            Command::Set(SetCommand {
                key: argv[1].clone(),
                value: argv[2].clone(),
                expire,
            })
        }
        "get" => Command::Get(GetCommand {
            key: argv[1].clone(),
        }),
        _ => return Err(StoreError::UnknownCommand(name.to_string())),
    };
    Ok(cmd)
}

/// Исполняет один вектор аргументов целиком: таблица, арность, разбор,
/// исполнение, трансляция.
pub fn dispatch(
    srv: &mut Server,
    session: &mut Session,
    argv: &[Sds],
) -> StoreResult<Reply> {
    let Some(first) = argv.first() else {
        return Err(StoreError::Syntax);
    };
    let name = String::from_utf8_lossy(first.as_slice()).to_lowercase();

    let Some(spec) = lookup_command(&name) else {
        return Err(StoreError::UnknownCommand(name));
    };

    let argc = argv.len() as i32;
    let arity_ok = if spec.arity >= 0 {
        argc == spec.arity
    } else {
        argc >= -spec.arity
    };
    if !arity_ok {
        return Err(StoreError::WrongArity(name));
    }

    srv.current_caller = match session.origin {
        CallerOrigin::MasterLink => Caller::MasterLink,
        CallerOrigin::Normal => Caller::Client {
            readonly_command: spec.flags & CMD_READONLY != 0,
        },
    };

    session.prevent_propagation = false;
    session.rewritten_argv = None;
    let dirty_before = srv.dirty;

    let cmd = parse_command(&name, argv)?;
    let result = cmd.execute(srv, session);

    // Изменившая данные команда уходит в AOF и на реплики, если сама не
    // распорядилась иначе.
    if result.is_ok() && srv.dirty > dirty_before && !session.prevent_propagation {
        let out = session
            .rewritten_argv
            .take()
            .unwrap_or_else(|| argv.to_vec());
        srv.hooks.propagation.feed(session.db_id, &out);
    }

    result
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
