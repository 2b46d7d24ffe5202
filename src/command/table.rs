//! Таблица команд: арность, флаги и позиции ключевых аргументов.
//!
//! Часть строк описывает команды, которых движок сам не исполняет
//! (ZUNIONSTORE, EVAL, SORT, MIGRATE, GEORADIUS): их схемы ключей нужны
//! кластерной маршрутизации, и извлечение ключей обязано работать для
//! них так же, как для исполняемых команд.

use crate::keyspace::keys::{
    eval_get_keys, georadius_get_keys, migrate_get_keys, sort_get_keys, zunion_inter_get_keys,
    CommandSpec, CMD_ADMIN, CMD_READONLY, CMD_WRITE,
};

macro_rules! cmd {
    ($name:literal, $arity:literal, $flags:expr, $fk:literal, $lk:literal, $ks:literal) => {
        CommandSpec {
            name: $name,
            arity: $arity,
            flags: $flags,
            firstkey: $fk,
            lastkey: $lk,
            keystep: $ks,
            getkeys: None,
        }
    };
    ($name:literal, $arity:literal, $flags:expr, $fk:literal, $lk:literal, $ks:literal, $gk:expr) => {
        CommandSpec {
            name: $name,
            arity: $arity,
            flags: $flags,
            firstkey: $fk,
            lastkey: $lk,
            keystep: $ks,
            getkeys: Some($gk),
        }
    };
}

pub static COMMAND_TABLE: &[CommandSpec] = &[
    // Множества
    cmd!("sadd", -3, CMD_WRITE, 1, 1, 1),
    cmd!("srem", -3, CMD_WRITE, 1, 1, 1),
    cmd!("smove", 4, CMD_WRITE, 1, 2, 1),
    cmd!("sismember", 3, CMD_READONLY, 1, 1, 1),
    cmd!("scard", 2, CMD_READONLY, 1, 1, 1),
    cmd!("spop", -2, CMD_WRITE, 1, 1, 1),
    cmd!("srandmember", -2, CMD_READONLY, 1, 1, 1),
    cmd!("smembers", 2, CMD_READONLY, 1, 1, 1),
    cmd!("sinter", -2, CMD_READONLY, 1, -1, 1),
    cmd!("sinterstore", -3, CMD_WRITE, 1, -1, 1),
    cmd!("sunion", -2, CMD_READONLY, 1, -1, 1),
    cmd!("sunionstore", -3, CMD_WRITE, 1, -1, 1),
    cmd!("sdiff", -2, CMD_READONLY, 1, -1, 1),
    cmd!("sdiffstore", -3, CMD_WRITE, 1, -1, 1),
    cmd!("sscan", -3, CMD_READONLY, 1, 1, 1),
    // Пространство ключей
    cmd!("del", -2, CMD_WRITE, 1, -1, 1),
    cmd!("unlink", -2, CMD_WRITE, 1, -1, 1),
    cmd!("exists", -2, CMD_READONLY, 1, -1, 1),
    cmd!("select", 2, CMD_READONLY, 0, 0, 0),
    cmd!("randomkey", 1, CMD_READONLY, 0, 0, 0),
    cmd!("keys", 2, CMD_READONLY, 0, 0, 0),
    cmd!("scan", -2, CMD_READONLY, 0, 0, 0),
    cmd!("dbsize", 1, CMD_READONLY, 0, 0, 0),
    cmd!("type", 2, CMD_READONLY, 1, 1, 1),
    cmd!("shutdown", -1, CMD_ADMIN, 0, 0, 0),
    cmd!("flushdb", -1, CMD_WRITE, 0, 0, 0),
    cmd!("flushall", -1, CMD_WRITE, 0, 0, 0),
    cmd!("rename", 3, CMD_WRITE, 1, 2, 1),
    cmd!("renamenx", 3, CMD_WRITE, 1, 2, 1),
    cmd!("move", 3, CMD_WRITE, 1, 1, 1),
    cmd!("swapdb", 3, CMD_WRITE, 0, 0, 0),
    cmd!("lastsave", 1, CMD_READONLY, 0, 0, 0),
    // Строки
    cmd!("set", -3, CMD_WRITE, 1, 1, 1),
    cmd!("get", 2, CMD_READONLY, 1, 1, 1),
    // Только схемы ключей: исполняют внешние подсистемы.
    cmd!("zunionstore", -4, CMD_WRITE, 0, 0, 0, zunion_inter_get_keys),
    cmd!("zinterstore", -4, CMD_WRITE, 0, 0, 0, zunion_inter_get_keys),
    cmd!("eval", -3, CMD_WRITE, 0, 0, 0, eval_get_keys),
    cmd!("evalsha", -3, CMD_WRITE, 0, 0, 0, eval_get_keys),
    cmd!("sort", -2, CMD_WRITE, 1, 1, 1, sort_get_keys),
    cmd!("migrate", -6, CMD_WRITE, 0, 0, 0, migrate_get_keys),
    cmd!("georadius", -6, CMD_WRITE, 1, 1, 1, georadius_get_keys),
    cmd!(
        "georadiusbymember",
        -5,
        CMD_WRITE,
        1,
        1,
        1,
        georadius_get_keys
    ),
];

/// Ищет описание команды по имени в нижнем регистре.
pub fn lookup_command(name: &str) -> Option<&'static CommandSpec> {
    COMMAND_TABLE.iter().find(|spec| spec.name == name)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
