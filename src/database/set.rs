use rand::Rng;

use super::{
    dict::{Dict, DictIter},
    intset::{IntSet, IntSetIter},
    sds::Sds,
};

/// Множество строк с адаптивным кодированием.
///
/// Пока все элементы являются точными десятичными записями i64 и их
/// количество не превышает настроенный порог, множество хранится как
/// компактный отсортированный массив чисел (`Intset`). Первая же вставка,
/// нарушающая любое из условий, переводит множество в хеш-таблицу
/// (`Table`). Обратного перехода нет.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Intset(IntSet),
    Table(Dict<Sds, ()>),
}

/// Один элемент множества, отданный итератором или случайной выборкой:
/// число для intset-кодирования, заимствованная строка для таблицы.
///
/// Строковый вариант нельзя удерживать через мутацию множества.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetMember<'a> {
    Int(i64),
    Str(&'a Sds),
}

/// Ленивый итератор по элементам множества во внутреннем порядке.
pub enum SetIter<'a> {
    Intset(IntSetIter<'a>),
    Table(DictIter<'a, Sds, ()>),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SetValue {
    /// Фабрика: кодирование подбирается под первое значение.
    pub fn for_value(v: &Sds) -> Self {
        if v.parse_i64().is_some() {
            SetValue::Intset(IntSet::new())
        } else {
            SetValue::Table(Dict::new())
        }
    }

    /// Возвращает кол-во элементов множества.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            SetValue::Intset(is) => is.len(),
            SetValue::Table(d) => d.len(),
        }
    }

    /// Проверяет, пустое ли множество.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Возвращает `true`, если множество в компактном числовом кодировании.
    #[inline]
    pub fn is_intset(&self) -> bool {
        matches!(self, SetValue::Intset(_))
    }

    /// Имя кодирования, как его отдаёт интроспекция объектов.
    pub fn encoding_name(&self) -> &'static str {
        match self {
            SetValue::Intset(_) => "intset",
            SetValue::Table(_) => "hashtable",
        }
    }

    /// Добавляет значение. Возвращает `true`, если элемент новый.
    ///
    /// Для intset-кодирования вставка нечислового значения либо рост сверх
    /// `max_intset_entries` переводит множество в таблицу.
    pub fn add(
        &mut self,
        v: &Sds,
        max_intset_entries: usize,
    ) -> bool {
        if let SetValue::Table(d) = self {
            return d.add(v.clone(), ());
        }

        match v.parse_i64() {
            Some(ll) => {
                let SetValue::Intset(is) = self else {
                    unreachable!()
                };
                if !is.insert(ll) {
                    return false;
                }
                // Порог превышен: компактная форма больше не годится.
                if is.len() > max_intset_entries {
                    self.convert_to_table();
                }
                true
            }
            None => {
                self.convert_to_table();
                let SetValue::Table(d) = self else {
                    unreachable!()
                };
                // Таблица только что построена из одних чисел, нечисловое
                // значение обязано быть новым.
                let added = d.add(v.clone(), ());
                assert!(added, "non-numeric value already present after conversion");
                true
            }
        }
    }

    /// Удаляет значение. Возвращает `true`, если элемент присутствовал.
    /// Кодирование не понижается.
    pub fn remove(
        &mut self,
        v: &Sds,
    ) -> bool {
        match self {
            SetValue::Table(d) => {
                if d.remove(v) {
                    d.shrink_if_needed();
                    true
                } else {
                    false
                }
            }
            SetValue::Intset(is) => match v.parse_i64() {
                Some(ll) => is.remove(ll),
                None => false,
            },
        }
    }

    /// Удаляет число напрямую, без промежуточной строки.
    pub fn remove_i64(
        &mut self,
        v: i64,
    ) -> bool {
        match self {
            SetValue::Intset(is) => is.remove(v),
            SetValue::Table(d) => {
                if d.remove(&Sds::from_i64(v)) {
                    d.shrink_if_needed();
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Проверяет принадлежность значения множеству.
    ///
    /// Для intset-кодирования нечисловое значение отсутствует тривиально.
    pub fn contains(
        &self,
        v: &Sds,
    ) -> bool {
        match self {
            SetValue::Table(d) => d.contains_key(v),
            SetValue::Intset(is) => match v.parse_i64() {
                Some(ll) => is.contains(ll),
                None => false,
            },
        }
    }

    /// Проверяет принадлежность числа множеству.
    pub fn contains_i64(
        &self,
        v: i64,
    ) -> bool {
        match self {
            SetValue::Intset(is) => is.contains(v),
            SetValue::Table(d) => d.contains_key(&Sds::from_i64(v)),
        }
    }

    /// Равномерно выбранный случайный элемент непустого множества.
    pub fn random_member<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Option<SetMember<'_>> {
        match self {
            SetValue::Intset(is) => is.random(rng).map(SetMember::Int),
            SetValue::Table(d) => d.random_entry(rng).map(|(k, _)| SetMember::Str(k)),
        }
    }

    /// Итератор по элементам во внутреннем порядке множества.
    pub fn iter(&self) -> SetIter<'_> {
        match self {
            SetValue::Intset(is) => SetIter::Intset(is.iter()),
            SetValue::Table(d) => SetIter::Table(d.iter()),
        }
    }

    /// Переводит intset-кодирование в хеш-таблицу.
    ///
    /// Таблица заранее расширена до текущей кардинальности, чтобы вставка
    /// элементов не запускала рехеширование.
    pub fn convert_to_table(&mut self) {
        let SetValue::Intset(is) = self else {
            panic!("set conversion from a hash table is not supported");
        };

        let mut d = Dict::with_capacity(is.len());
        for v in is.iter() {
            let added = d.add(Sds::from_i64(v), ());
            assert!(added, "duplicate element inside intset");
        }

        *self = SetValue::Table(d);
    }
}

impl<'a> SetMember<'a> {
    /// Владеющая копия элемента: число превращается в десятичную строку.
    pub fn to_sds(&self) -> Sds {
        match self {
            SetMember::Int(v) => Sds::from_i64(*v),
            SetMember::Str(s) => (*s).clone(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для SetIter
////////////////////////////////////////////////////////////////////////////////

impl<'a> Iterator for SetIter<'a> {
    type Item = SetMember<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SetIter::Intset(iter) => iter.next().map(SetMember::Int),
            SetIter::Table(iter) => iter.next().map(|(k, _)| SetMember::Str(k)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            SetIter::Intset(iter) => iter.size_hint(),
            SetIter::Table(_) => (0, None),
        }
    }
}

impl Default for SetValue {
    /// Пустое множество начинает с компактного кодирования.
    fn default() -> Self {
        SetValue::Intset(IntSet::new())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
