//! Классы событий кейспейса и разбор строки конфигурации классов.
//!
//! Событие отправляется коллаборатору только если его класс включён
//! оператором; по умолчанию все классы выключены.

/// Событие канала keyspace (`__keyspace@<db>__:<key>`).
pub const NOTIFY_KEYSPACE: u32 = 1 << 0; // K
/// Событие канала keyevent (`__keyevent@<db>__:<event>`).
pub const NOTIFY_KEYEVENT: u32 = 1 << 1; // E
/// Общие команды над ключами: DEL, RENAME, EXPIRE и т.п.
pub const NOTIFY_GENERIC: u32 = 1 << 2; // g
/// Строковые команды.
pub const NOTIFY_STRING: u32 = 1 << 3; // $
/// Списочные команды.
pub const NOTIFY_LIST: u32 = 1 << 4; // l
/// Команды множеств.
pub const NOTIFY_SET: u32 = 1 << 5; // s
/// Команды хешей.
pub const NOTIFY_HASH: u32 = 1 << 6; // h
/// Команды сортированных множеств.
pub const NOTIFY_ZSET: u32 = 1 << 7; // z
/// Истечение ключей.
pub const NOTIFY_EXPIRED: u32 = 1 << 8; // x
/// Вытеснение ключей.
pub const NOTIFY_EVICTED: u32 = 1 << 9; // e

/// Все классы данных (без K и E): флаг `A`.
pub const NOTIFY_ALL: u32 = NOTIFY_GENERIC
    | NOTIFY_STRING
    | NOTIFY_LIST
    | NOTIFY_SET
    | NOTIFY_HASH
    | NOTIFY_ZSET
    | NOTIFY_EXPIRED
    | NOTIFY_EVICTED;

/// Разбирает строку классов (`"AKE"`, `"gxE"` и т.п.) в битовую маску.
/// Возвращает `None` при неизвестном символе.
pub fn parse_event_classes(spec: &str) -> Option<u32> {
    let mut flags = 0u32;

    for c in spec.chars() {
        flags |= match c {
            'A' => NOTIFY_ALL,
            'K' => NOTIFY_KEYSPACE,
            'E' => NOTIFY_KEYEVENT,
            'g' => NOTIFY_GENERIC,
            '$' => NOTIFY_STRING,
            'l' => NOTIFY_LIST,
            's' => NOTIFY_SET,
            'h' => NOTIFY_HASH,
            'z' => NOTIFY_ZSET,
            'x' => NOTIFY_EXPIRED,
            'e' => NOTIFY_EVICTED,
            _ => return None,
        };
    }

    Some(flags)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
