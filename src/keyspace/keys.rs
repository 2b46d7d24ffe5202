//! Извлечение ключевых аргументов команд.
//!
//! Базовый случай описывается позициями из таблицы команд (firstkey,
//! lastkey, keystep); команды с нерегулярной схемой аргументов имеют
//! собственные экстракторы.

use crate::database::Sds;

/// Флаг команды: пишет в кейспейс.
pub const CMD_WRITE: u32 = 1 << 0;
/// Флаг команды: только чтение.
pub const CMD_READONLY: u32 = 1 << 1;
/// Флаг команды: административная.
pub const CMD_ADMIN: u32 = 1 << 2;

/// Специализированный экстрактор ключей команды.
pub type GetKeysProc = fn(&CommandSpec, &[Sds]) -> Vec<usize>;

/// Строка таблицы команд.
///
/// `arity > 0` — точное число аргументов (включая имя команды),
/// `arity < 0` — минимальное. Отрицательный `lastkey` отсчитывается от
/// конца вектора аргументов.
pub struct CommandSpec {
    pub name: &'static str,
    pub arity: i32,
    pub flags: u32,
    pub firstkey: i32,
    pub lastkey: i32,
    pub keystep: i32,
    pub getkeys: Option<GetKeysProc>,
}

////////////////////////////////////////////////////////////////////////////////
// Экстракторы
////////////////////////////////////////////////////////////////////////////////

/// Позиции ключей по описанию из таблицы команд.
pub fn get_keys_using_command_table(
    spec: &CommandSpec,
    argv: &[Sds],
) -> Vec<usize> {
    if spec.firstkey == 0 {
        return Vec::new();
    }

    let argc = argv.len() as i32;
    let last = if spec.lastkey < 0 {
        argc + spec.lastkey
    } else {
        spec.lastkey
    };

    let mut keys = Vec::new();
    let mut j = spec.firstkey;
    while j <= last {
        assert!(
            j < argc,
            "command table key positions do not match the arity of '{}'",
            spec.name
        );
        keys.push(j as usize);
        j += spec.keystep;
    }
    keys
}

/// Позиции всех ключевых аргументов команды: специализированный
/// экстрактор, если он есть, иначе таблица.
pub fn get_keys_from_command(
    spec: &CommandSpec,
    argv: &[Sds],
) -> Vec<usize> {
    match spec.getkeys {
        Some(proc) => proc(spec, argv),
        None => get_keys_using_command_table(spec, argv),
    }
}

/// ZUNIONSTORE/ZINTERSTORE: `cmd dst numkeys key [key ...] [опции]` —
/// ключи-источники плюс ключ назначения.
pub fn zunion_inter_get_keys(
    _spec: &CommandSpec,
    argv: &[Sds],
) -> Vec<usize> {
    let num = match argv.get(2).and_then(|a| a.parse_i64()) {
        Some(n) if n >= 0 => n as usize,
        _ => return Vec::new(),
    };

    // Синтаксически неверную команду не разбираем.
    if num > argv.len().saturating_sub(3) {
        return Vec::new();
    }

    let mut keys: Vec<usize> = (3..3 + num).collect();
    keys.push(1);
    keys
}

/// EVAL/EVALSHA: `cmd script numkeys key [key ...] [args]`.
pub fn eval_get_keys(
    _spec: &CommandSpec,
    argv: &[Sds],
) -> Vec<usize> {
    let num = match argv.get(2).and_then(|a| a.parse_i64()) {
        Some(n) if n > 0 => n as usize,
        _ => return Vec::new(),
    };

    if num > argv.len().saturating_sub(3) {
        return Vec::new();
    }

    (3..3 + num).collect()
}

/// SORT: первый аргумент всегда ключ; опция STORE добавляет ключ
/// назначения, при нескольких STORE выигрывает последний.
pub fn sort_get_keys(
    _spec: &CommandSpec,
    argv: &[Sds],
) -> Vec<usize> {
    // Опции с аргументами, которые надо перешагнуть.
    const SKIP: &[(&[u8], usize)] = &[(b"limit", 2), (b"get", 1), (b"by", 1)];

    let mut keys = vec![1];
    let mut store: Option<usize> = None;

    let mut i = 2;
    while i < argv.len() {
        let arg = argv[i].as_slice();

        if arg.eq_ignore_ascii_case(b"store") && i + 1 < argv.len() {
            store = Some(i + 1);
        } else if let Some((_, skip)) = SKIP
            .iter()
            .find(|(name, _)| arg.eq_ignore_ascii_case(name))
        {
            i += skip;
        }
        i += 1;
    }

    if let Some(pos) = store {
        keys.push(pos);
    }
    keys
}

/// MIGRATE: ключ в argv[3], либо — при пустом argv[3] и опции KEYS — все
/// хвостовые аргументы после неё.
pub fn migrate_get_keys(
    _spec: &CommandSpec,
    argv: &[Sds],
) -> Vec<usize> {
    let mut first = 3;
    let mut num = 1;

    if argv.len() > 6 {
        for i in 6..argv.len() {
            if argv[i].eq_ignore_ascii_case(b"keys") && argv[3].is_empty() {
                first = i + 1;
                num = argv.len() - first;
                break;
            }
        }
    }

    (first..first + num).collect()
}

/// GEORADIUS/GEORADIUSBYMEMBER: argv[1] плюс ключ из STORE/STOREDIST;
/// при обеих опциях побеждает указанная последней.
pub fn georadius_get_keys(
    _spec: &CommandSpec,
    argv: &[Sds],
) -> Vec<usize> {
    let mut stored: Option<usize> = None;

    let mut i = 5;
    while i < argv.len() {
        let arg = argv[i].as_slice();
        if (arg.eq_ignore_ascii_case(b"store") || arg.eq_ignore_ascii_case(b"storedist"))
            && i + 1 < argv.len()
        {
            stored = Some(i + 1);
            i += 1;
        }
        i += 1;
    }

    let mut keys = vec![1];
    if let Some(pos) = stored {
        keys.push(pos);
    }
    keys
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<Sds> {
        parts.iter().map(|s| Sds::from_str(s)).collect()
    }

    fn spec(
        firstkey: i32,
        lastkey: i32,
        keystep: i32,
    ) -> CommandSpec {
        CommandSpec {
            name: "test",
            arity: -1,
            flags: 0,
            firstkey,
            lastkey,
            keystep,
            getkeys: None,
        }
    }

    /// Тест проверяет базовый экстрактор: одиночный ключ, диапазон до
    /// конца, шаг 2.
    #[test]
    fn table_extractor() {
        let a = argv(&["get", "k"]);
        assert_eq!(get_keys_using_command_table(&spec(1, 1, 1), &a), vec![1]);

        let a = argv(&["del", "a", "b", "c"]);
        assert_eq!(
            get_keys_using_command_table(&spec(1, -1, 1), &a),
            vec![1, 2, 3]
        );

        let a = argv(&["mset", "k1", "v1", "k2", "v2"]);
        assert_eq!(
            get_keys_using_command_table(&spec(1, -2, 2), &a),
            vec![1, 3]
        );

        let a = argv(&["ping"]);
        assert!(get_keys_using_command_table(&spec(0, 0, 0), &a).is_empty());
    }

    /// Тест проверяет экстрактор ZUNIONSTORE: источники плюс назначение.
    #[test]
    fn zunion_extractor() {
        let a = argv(&["zunionstore", "dst", "2", "a", "b", "WEIGHTS", "1", "2"]);
        assert_eq!(zunion_inter_get_keys(&spec(0, 0, 0), &a), vec![3, 4, 1]);

        // numkeys больше фактического числа ключей: синтаксическая ошибка,
        // ключей нет.
        let a = argv(&["zunionstore", "dst", "9", "a", "b"]);
        assert!(zunion_inter_get_keys(&spec(0, 0, 0), &a).is_empty());
    }

    /// Тест проверяет экстрактор EVAL.
    #[test]
    fn eval_extractor() {
        let a = argv(&["eval", "return 1", "2", "k1", "k2", "arg"]);
        assert_eq!(eval_get_keys(&spec(0, 0, 0), &a), vec![3, 4]);

        let a = argv(&["eval", "return 1", "0"]);
        assert!(eval_get_keys(&spec(0, 0, 0), &a).is_empty());
    }

    /// Тест проверяет экстрактор SORT: BY/LIMIT/GET перешагиваются,
    /// последний STORE побеждает.
    #[test]
    fn sort_extractor() {
        let a = argv(&["sort", "mylist"]);
        assert_eq!(sort_get_keys(&spec(0, 0, 0), &a), vec![1]);

        let a = argv(&[
            "sort", "mylist", "BY", "w_*", "LIMIT", "0", "10", "STORE", "d1", "STORE", "d2",
        ]);
        assert_eq!(sort_get_keys(&spec(0, 0, 0), &a), vec![1, 10]);
    }

    /// Тест проверяет экстрактор MIGRATE с опцией KEYS.
    #[test]
    fn migrate_extractor() {
        let a = argv(&["migrate", "host", "6379", "key", "0", "100"]);
        assert_eq!(migrate_get_keys(&spec(0, 0, 0), &a), vec![3]);

        let a = argv(&[
            "migrate", "host", "6379", "", "0", "100", "KEYS", "a", "b", "c",
        ]);
        assert_eq!(migrate_get_keys(&spec(0, 0, 0), &a), vec![7, 8, 9]);
    }

    /// Тест проверяет экстрактор GEORADIUS: STORE/STOREDIST, последний
    /// побеждает.
    #[test]
    fn georadius_extractor() {
        let a = argv(&["georadius", "src", "15", "37", "200", "km"]);
        assert_eq!(georadius_get_keys(&spec(0, 0, 0), &a), vec![1]);

        let a = argv(&[
            "georadius",
            "src",
            "15",
            "37",
            "200",
            "km",
            "STORE",
            "d1",
            "STOREDIST",
            "d2",
        ]);
        assert_eq!(georadius_get_keys(&spec(0, 0, 0), &a), vec![1, 9]);
    }
}
