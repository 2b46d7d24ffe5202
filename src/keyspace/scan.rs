//! Generic-движок SCAN/SSCAN/HSCAN/ZSCAN.
//!
//! Курсор stateless: состояние прохода целиком закодировано в 64-битном
//! числе (см. `Dict::scan`). Ноль открывает и закрывает полный проход.

use globset::{GlobBuilder, GlobMatcher};

use crate::{
    database::{ObjRef, Sds, SetValue, StrValue, Value},
    engine::Server,
    error::{StoreError, StoreResult},
};

use super::expire::expire_if_needed;

/// COUNT по умолчанию.
pub const SCAN_DEFAULT_COUNT: usize = 10;

/// Разбирает курсор из аргумента команды.
pub fn parse_scan_cursor(arg: &Sds) -> StoreResult<u64> {
    std::str::from_utf8(arg.as_slice())
        .ok()
        .and_then(|s| s.trim_start_matches('+').parse::<u64>().ok())
        .ok_or(StoreError::InvalidCursor)
}

/// Скомпилированный MATCH-паттерн.
///
/// `*` отключает фильтрацию; не компилирующийся паттерн не матчит ничего.
pub struct MatchPattern {
    any: bool,
    matcher: Option<GlobMatcher>,
}

impl MatchPattern {
    /// Паттерн, пропускающий все ключи.
    pub fn any() -> Self {
        MatchPattern {
            any: true,
            matcher: None,
        }
    }

    pub fn new(pat: &Sds) -> Self {
        if pat.as_slice() == b"*" {
            return Self::any();
        }

        let text = String::from_utf8_lossy(pat.as_slice());
        let matcher = GlobBuilder::new(&text)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .ok()
            .map(|g| g.compile_matcher());

        MatchPattern { any: false, matcher }
    }

    pub fn matches(
        &self,
        key: &Sds,
    ) -> bool {
        if self.any {
            return true;
        }
        match &self.matcher {
            Some(m) => m.is_match(String::from_utf8_lossy(key.as_slice()).as_ref()),
            None => false,
        }
    }
}

/// Разобранные опции SCAN.
pub struct ScanOptions {
    pub count: usize,
    pub pattern: MatchPattern,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            count: SCAN_DEFAULT_COUNT,
            pattern: MatchPattern::any(),
        }
    }
}

impl ScanOptions {
    /// Разбирает хвост аргументов `[MATCH pat] [COUNT n]` в любом порядке.
    pub fn parse(args: &[Sds]) -> StoreResult<Self> {
        let mut opts = ScanOptions::default();
        let mut i = 0;

        while i < args.len() {
            let rest = args.len() - i;
            if args[i].eq_ignore_ascii_case(b"count") && rest >= 2 {
                let count = args[i + 1]
                    .parse_i64()
                    .ok_or(StoreError::NotAnInteger)?;
                if count < 1 {
                    return Err(StoreError::Syntax);
                }
                opts.count = count as usize;
                i += 2;
            } else if args[i].eq_ignore_ascii_case(b"match") && rest >= 2 {
                opts.pattern = MatchPattern::new(&args[i + 1]);
                i += 2;
            } else {
                return Err(StoreError::Syntax);
            }
        }

        Ok(opts)
    }
}

/// Один шаг generic-сканирования; разбирает хвост `[MATCH] [COUNT]` сам.
///
/// `target == None` сканирует ключи базы; иначе — содержимое переданного
/// значения (Set, Hash или ZSet; Hash и ZSet отдают поле и значение
/// парой, и COUNT для них внутренне удваивается). Компактные кодирования
/// малы по построению, поэтому отдаются целиком с курсором 0.
///
/// Возвращает следующий курсор и собранные элементы.
pub fn scan_generic(
    srv: &mut Server,
    db_id: usize,
    target: Option<&ObjRef>,
    cursor: u64,
    args: &[Sds],
) -> StoreResult<(u64, Vec<Sds>)> {
    let opts = &ScanOptions::parse(args)?;
    let mut entries: Vec<Sds> = Vec::new();
    let mut cursor = cursor;
    // Пары "ключ-значение" фильтруются по ключу, значение следует судьбе
    // ключа.
    let mut paired = false;

    match target.map(|o| &o.value) {
        None => {
            let main = &srv.dbs[db_id].main;
            let count = opts.count;
            // Потолок итераций: на патологически разреженной таблице
            // лучше вернуть мало элементов, чем надолго занять поток.
            let mut maxiterations = count.saturating_mul(10);
            loop {
                cursor = main.scan(cursor, |k, _| entries.push(k.clone()));
                if cursor == 0 || maxiterations == 0 || entries.len() >= count {
                    break;
                }
                maxiterations -= 1;
            }
        }
        Some(Value::Set(SetValue::Table(table))) => {
            let count = opts.count;
            let mut maxiterations = count.saturating_mul(10);
            loop {
                cursor = table.scan(cursor, |k, _| entries.push(k.clone()));
                if cursor == 0 || maxiterations == 0 || entries.len() >= count {
                    break;
                }
                maxiterations -= 1;
            }
        }
        Some(Value::Set(SetValue::Intset(is))) => {
            // Компактное множество отдаётся одним махом.
            for v in is.iter() {
                entries.push(Sds::from_i64(v));
            }
            cursor = 0;
        }
        Some(Value::Hash(fields)) => {
            paired = true;
            let count = opts.count.saturating_mul(2);
            let mut maxiterations = count.saturating_mul(10);
            loop {
                cursor = fields.scan(cursor, |k, v| {
                    entries.push(k.clone());
                    entries.push(v.clone());
                });
                if cursor == 0 || maxiterations == 0 || entries.len() >= count {
                    break;
                }
                maxiterations -= 1;
            }
        }
        Some(Value::ZSet { dict }) => {
            paired = true;
            let count = opts.count.saturating_mul(2);
            let mut maxiterations = count.saturating_mul(10);
            loop {
                cursor = dict.scan(cursor, |k, score| {
                    entries.push(k.clone());
                    entries.push(Sds::from_str(&score.to_string()));
                });
                if cursor == 0 || maxiterations == 0 || entries.len() >= count {
                    break;
                }
                maxiterations -= 1;
            }
        }
        Some(Value::Str(_)) | Some(Value::List(_)) => {
            panic!("scan target must be a set, hash or sorted set");
        }
    }

    // Фильтрация: MATCH, затем — для ключей базы — отсев истёкших.
    if paired {
        let mut filtered = Vec::with_capacity(entries.len());
        for pair in entries.chunks_exact(2) {
            if opts.pattern.matches(&pair[0]) {
                filtered.push(pair[0].clone());
                filtered.push(pair[1].clone());
            }
        }
        entries = filtered;
    } else {
        entries.retain(|k| opts.pattern.matches(k));
        if target.is_none() {
            entries.retain(|k| !expire_if_needed(srv, db_id, k));
        }
    }

    Ok((cursor, entries))
}

/// Форматирует строковое значение для ответов.
pub fn string_value_bytes(v: &StrValue) -> Sds {
    match v {
        StrValue::Raw(s) => s.clone(),
        StrValue::Int(i) => Sds::from_i64(*i),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
