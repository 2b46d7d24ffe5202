//! Форма ответа команды.
//!
//! Сериализация в протокол — дело внешнего слоя; ядро отдаёт ответ
//! структурой. Отложенные длины multi-bulk здесь не нужны: массив
//! материализуется целиком.

use crate::database::Sds;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+OK`
    Ok,
    /// Статусная строка (`TYPE` отвечает именно так).
    Status(&'static str),
    Int(i64),
    Bulk(Sds),
    /// Null bulk: «ключа нет».
    Nil,
    Array(Vec<Reply>),
}

impl Reply {
    /// Пустой multi-bulk.
    pub fn empty_array() -> Reply {
        Reply::Array(Vec::new())
    }

    /// Bulk из числа.
    pub fn bulk_i64(v: i64) -> Reply {
        Reply::Bulk(Sds::from_i64(v))
    }

    /// Bulk из строки.
    pub fn bulk_str(s: &str) -> Reply {
        Reply::Bulk(Sds::from_str(s))
    }

    /// Ответ 0/1 по булеву значению.
    pub fn from_bool(b: bool) -> Reply {
        Reply::Int(b as i64)
    }
}

impl From<Vec<Sds>> for Reply {
    /// Multi-bulk из списка строк.
    fn from(items: Vec<Sds>) -> Self {
        Reply::Array(items.into_iter().map(Reply::Bulk).collect())
    }
}
