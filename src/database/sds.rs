use std::{
    cmp::Ordering,
    fmt::{self, Display},
    hash::{Hash, Hasher},
    ops::Deref,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone)]
enum Repr {
    Inline { len: u8, buf: [u8; Sds::INLINE_CAP] },
    Heap { buf: Vec<u8> },
}

/// Бинарно-безопасная строка с кешированной длиной.
///
/// Короткие строки хранятся прямо в структуре (inline), длинные — в куче.
/// Равенство, хеш и порядок определяются по сырым байтам.
#[derive(Debug, Clone)]
pub struct Sds(Repr);

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Sds {
    pub const INLINE_CAP: usize = std::mem::size_of::<usize>() * 3 - 1;

    /// Создаёт `Sds` из вектора байт, выбирая `inline` или `heap` в зависимости
    /// от длины.
    #[inline(always)]
    pub fn from_vec(vec: Vec<u8>) -> Self {
        let len = vec.len();

        if len <= Self::INLINE_CAP {
            let mut buf = [0u8; Self::INLINE_CAP];
            buf[..len].copy_from_slice(&vec);

            Sds(Repr::Inline {
                len: len as u8,
                buf,
            })
        } else {
            Sds(Repr::Heap { buf: vec })
        }
    }

    /// Создаёт `Sds` из байтов среза, копируя данные.
    #[inline]
    pub fn from_bytes<B: AsRef<[u8]>>(bytes: B) -> Self {
        let slice = bytes.as_ref();

        if slice.len() <= Self::INLINE_CAP {
            let mut buf = [0u8; Self::INLINE_CAP];
            buf[..slice.len()].copy_from_slice(slice);

            Sds(Repr::Inline {
                len: slice.len() as u8,
                buf,
            })
        } else {
            Sds(Repr::Heap {
                buf: slice.to_vec(),
            })
        }
    }

    /// Создаёт `Sds` из `&str`.
    #[allow(clippy::should_implement_trait)]
    #[inline]
    pub fn from_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Создаёт `Sds` из десятичной записи числа.
    #[inline]
    pub fn from_i64(v: i64) -> Self {
        let mut buf = [0u8; 20];
        Self::from_bytes(format_i64(v, &mut buf))
    }

    /// Возвращает содержимое строки как срез байт.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        match &self.0 {
            Repr::Inline { len, buf } => &buf[..*len as usize],
            Repr::Heap { buf } => buf.as_slice(),
        }
    }

    /// Псевдоним для [`as_slice`](Sds::as_slice).
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /// Возвращает текущую длину строки в байтах.
    #[inline]
    pub fn len(&self) -> usize {
        match &self.0 {
            Repr::Inline { len, .. } => *len as usize,
            Repr::Heap { buf } => buf.len(),
        }
    }

    /// Возвращает `true`, если строка пустая.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Возвращает `true`, если строка хранится на стеке (inline).
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.0, Repr::Inline { .. })
    }

    /// Проверяет, является ли содержимое точной десятичной записью знакового
    /// 64-битного числа, и возвращает его.
    ///
    /// Разбор строгий: никаких пробелов, знака `+` и ведущих нулей (кроме
    /// самой строки `"0"`). Переполнение i64 также отвергается.
    pub fn parse_i64(&self) -> Option<i64> {
        let s = self.as_slice();

        if s.is_empty() || s.len() >= 21 {
            return None;
        }

        // Единственный допустимый вариант с ведущим нулём.
        if s[0] == b'0' {
            return if s.len() == 1 { Some(0) } else { None };
        }

        let (negative, digits) = if s[0] == b'-' {
            (true, &s[1..])
        } else {
            (false, s)
        };

        // После знака обязана идти ненулевая первая цифра.
        match digits.first() {
            Some(b'1'..=b'9') => {}
            _ => return None,
        }

        // Аккумулируем в отрицательной области: |i64::MIN| > i64::MAX.
        let mut v: i64 = 0;
        for &b in digits {
            if !b.is_ascii_digit() {
                return None;
            }
            v = v.checked_mul(10)?.checked_sub((b - b'0') as i64)?;
        }

        if negative {
            Some(v)
        } else {
            v.checked_neg()
        }
    }
}

/// Записывает десятичную запись `v` в `buf` и возвращает срез с цифрами.
fn format_i64(v: i64, buf: &mut [u8; 20]) -> &[u8] {
    // u128 снимает крайний случай |i64::MIN|.
    let mut u = v.unsigned_abs() as u128;
    let mut pos = buf.len();

    loop {
        pos -= 1;
        buf[pos] = b'0' + (u % 10) as u8;
        u /= 10;
        if u == 0 {
            break;
        }
    }

    if v < 0 {
        pos -= 1;
        buf[pos] = b'-';
    }

    &buf[pos..]
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Sds
////////////////////////////////////////////////////////////////////////////////

impl Deref for Sds {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Sds {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for Sds {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Sds {}

impl Hash for Sds {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl PartialOrd for Sds {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sds {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl Display for Sds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_slice()))
    }
}

impl From<&str> for Sds {
    fn from(s: &str) -> Self {
        Sds::from_str(s)
    }
}

impl From<&[u8]> for Sds {
    fn from(b: &[u8]) -> Self {
        Sds::from_bytes(b)
    }
}

impl From<Vec<u8>> for Sds {
    fn from(v: Vec<u8>) -> Self {
        Sds::from_vec(v)
    }
}

impl Serialize for Sds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.as_slice())
    }
}

impl<'de> Deserialize<'de> for Sds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SdsVisitor;

        impl<'de> serde::de::Visitor<'de> for SdsVisitor {
            type Value = Sds;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("byte array")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Sds, E> {
                Ok(Sds::from_bytes(v))
            }

            fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Sds, E> {
                Ok(Sds::from_vec(v))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Sds, E> {
                Ok(Sds::from_str(v))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> Result<Sds, A::Error> {
                let mut buf = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    buf.push(b);
                }
                Ok(Sds::from_vec(buf))
            }
        }

        deserializer.deserialize_byte_buf(SdsVisitor)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
