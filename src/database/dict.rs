use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Ёмкость таблицы при первой вставке.
const MIN_TABLE_SIZE: usize = 4;

/// Минимальная заполненность таблицы в процентах; ниже неё таблица
/// сжимается.
const MIN_FILL_PERCENT: usize = 10;

/// Период вызова progress-callback в `empty_with`, в бакетах.
const EMPTY_CALLBACK_PERIOD: usize = 65_536;

type Link<K, V> = Option<Box<Node<K, V>>>;

/// Узел цепочки коллизий.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
struct Node<K, V> {
    key: K,
    val: V,
    next: Link<K, V>,
}

/// Одна из двух таблиц словаря. Количество слотов — всегда степень
/// двойки, поэтому маска бакета выводится из длины.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
struct Table<K, V> {
    slots: Vec<Link<K, V>>,
    used: usize,
}

/// Хеш-таблица с инкрементальной миграцией.
///
/// Рост и сжатие не перестраивают таблицу разом: выделяется вторая
/// таблица нужного размера, и каждый мутирующий вызов переносит в неё по
/// одному бакету. Курсор `migration` указывает на следующий переносимый
/// бакет; `None` означает, что вся таблица живёт в `tables[0]`, а
/// `tables[1]` не выделена.
///
/// Суммарное число элементов в любой момент равно сумме `used` обеих
/// таблиц. Stateless-курсор `scan` переживает и рост, и сжатие (см.
/// комментарий у метода).
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Dict<K, V> {
    tables: [Table<K, V>; 2],
    migration: Option<usize>,
}

/// Итератор по словарю `Dict` (разделяемая ссылка).
pub struct DictIter<'a, K, V> {
    dict: &'a Dict<K, V>,
    table: usize,
    slot: usize,
    node: Option<&'a Node<K, V>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<K, V> Table<K, V> {
    /// Невыделенная таблица.
    fn empty() -> Self {
        Table {
            slots: Vec::new(),
            used: 0,
        }
    }

    /// Таблица, вмещающая `cap` элементов.
    fn sized(cap: usize) -> Self {
        let n = cap.next_power_of_two().max(MIN_TABLE_SIZE);
        let mut slots = Vec::with_capacity(n);
        slots.resize_with(n, || None);

        Table { slots, used: 0 }
    }

    #[inline]
    fn is_unallocated(&self) -> bool {
        self.slots.is_empty()
    }

    /// Бакет для хеша. Таблица обязана быть выделена.
    #[inline]
    fn slot_of(
        &self,
        hash: u64,
    ) -> usize {
        (hash as usize) & (self.slots.len() - 1)
    }
}

impl<K, V> Dict<K, V>
where
    K: Hash + Eq,
{
    /// Создаёт новый пустой словарь.
    pub fn new() -> Self {
        Dict {
            tables: [Table::empty(), Table::empty()],
            migration: None,
        }
    }

    /// Создаёт словарь, заранее вмещающий `cap` элементов без миграции.
    pub fn with_capacity(cap: usize) -> Self {
        if cap == 0 {
            return Self::new();
        }

        Dict {
            tables: [Table::sized(cap), Table::empty()],
            migration: None,
        }
    }

    /// Вставляет пару `(key, val)` только если ключа ещё нет.
    ///
    /// Возвращает `false`, если ключ уже существует — сигнал дубликата,
    /// существующее значение при этом не трогается.
    pub fn add(
        &mut self,
        key: K,
        val: V,
    ) -> bool {
        self.grow_if_needed();
        self.migrate_one_bucket();

        if self.node_mut(&key).is_some() {
            return false;
        }

        self.attach_new(key, val);
        true
    }

    /// Вставляет пару `(key, val)`, перезаписывая существующее значение.
    ///
    /// Возвращает `true`, если ключ новый.
    pub fn replace(
        &mut self,
        key: K,
        val: V,
    ) -> bool {
        self.grow_if_needed();
        self.migrate_one_bucket();

        if let Some(node) = self.node_mut(&key) {
            node.val = val;
            return false;
        }

        self.attach_new(key, val);
        true
    }

    /// Возвращает `Some(&V)` для указанного ключа или `None`.
    pub fn get(
        &self,
        key: &K,
    ) -> Option<&V> {
        let hash = Self::hash_of(key);

        if let Some(node) = Self::chain_find(&self.tables[0], hash, key) {
            return Some(&node.val);
        }

        // Вне миграции вторая таблица не существует.
        if self.migration.is_some() {
            return Self::chain_find(&self.tables[1], hash, key).map(|n| &n.val);
        }
        None
    }

    /// Возвращает `Some(&mut V)` для указанного ключа или `None`.
    pub fn get_mut(
        &mut self,
        key: &K,
    ) -> Option<&mut V> {
        self.migrate_one_bucket();
        self.node_mut(key).map(|node| &mut node.val)
    }

    /// Возвращает `true`, если ключ присутствует.
    #[inline]
    pub fn contains_key(
        &self,
        key: &K,
    ) -> bool {
        self.get(key).is_some()
    }

    /// Удаляет ключ. Возвращает true, если удаление произошло.
    pub fn remove(
        &mut self,
        key: &K,
    ) -> bool {
        self.take(key).is_some()
    }

    /// Удаляет ключ и возвращает его значение.
    pub fn take(
        &mut self,
        key: &K,
    ) -> Option<V> {
        self.migrate_one_bucket();

        let hash = Self::hash_of(key);
        let migrating = self.migration.is_some();
        let [t0, t1] = &mut self.tables;

        if let Some(node) = Self::chain_detach(t0, hash, key) {
            return Some(node.val);
        }
        if migrating {
            return Self::chain_detach(t1, hash, key).map(|node| node.val);
        }
        None
    }

    /// Возвращает общее количество элементов в обеих таблицах.
    pub fn len(&self) -> usize {
        self.tables[0].used + self.tables[1].used
    }

    /// Возвращает `true`, если словарь пуст.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Очищает словарь и сбрасывает миграцию.
    pub fn clear(&mut self) {
        self.tables = [Table::empty(), Table::empty()];
        self.migration = None;
    }

    /// Очищает словарь по частям, вызывая `callback` c числом пройденных
    /// бакетов каждые 65 536 бакетов. Позволяет внешнему циклу показывать
    /// прогресс на очень больших таблицах.
    pub fn empty_with<F: FnMut(usize)>(
        &mut self,
        mut callback: F,
    ) {
        let mut dropped = 0usize;

        for table in &mut self.tables {
            for slot in &mut table.slots {
                drop(slot.take());
                dropped += 1;
                if dropped % EMPTY_CALLBACK_PERIOD == 0 {
                    callback(dropped);
                }
            }
        }
        self.clear();
    }

    /// Возвращает итератор по парам `(&K, &V)`.
    pub fn iter(&self) -> DictIter<'_, K, V> {
        DictIter {
            dict: self,
            table: 0,
            slot: 0,
            node: None,
        }
    }

    /// Случайная пара из словаря, равномерная по занятым бакетам.
    ///
    /// Во время миграции бакеты `tables[0]` до курсора уже пусты, поэтому
    /// розыгрыш идёт по объединённому пространству оставшихся бакетов
    /// обеих таблиц.
    pub fn random_entry<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Option<(&K, &V)> {
        if self.is_empty() {
            return None;
        }

        loop {
            let chain = match self.migration {
                Some(done) => {
                    let total = self.tables[0].slots.len() + self.tables[1].slots.len();
                    let pick = done + rng.gen_range(0..total - done);
                    if pick < self.tables[0].slots.len() {
                        &self.tables[0].slots[pick]
                    } else {
                        &self.tables[1].slots[pick - self.tables[0].slots.len()]
                    }
                }
                None => {
                    if self.tables[0].is_unallocated() {
                        return None;
                    }
                    &self.tables[0].slots[rng.gen_range(0..self.tables[0].slots.len())]
                }
            };

            // Пустой бакет: перерисовываем. used > 0 гарантирует выход.
            let mut nodes = 0;
            let mut cur = chain.as_deref();
            while let Some(node) = cur {
                nodes += 1;
                cur = node.next.as_deref();
            }
            if nodes == 0 {
                continue;
            }

            let mut skip = rng.gen_range(0..nodes);
            let mut cur = chain.as_deref();
            while let Some(node) = cur {
                if skip == 0 {
                    return Some((&node.key, &node.val));
                }
                skip -= 1;
                cur = node.next.as_deref();
            }
        }
    }

    /// Запускает сжатие таблицы, если она заполнена меньше чем на 10% и
    /// больше минимального размера.
    pub fn shrink_if_needed(&mut self) {
        if self.migration.is_some() {
            return;
        }

        let size = self.tables[0].slots.len();
        let used = self.tables[0].used;

        if size <= MIN_TABLE_SIZE || used * 100 >= size * MIN_FILL_PERCENT {
            return;
        }

        let target = used.max(MIN_TABLE_SIZE).next_power_of_two();
        if target < size {
            self.tables[1] = Table::sized(target);
            self.migration = Some(0);
        }
    }

    /// Один шаг stateless-сканирования.
    ///
    /// Вызывает `visit` для каждой пары в бакете `cursor & mask` меньшей
    /// таблицы и, при идущей миграции, во всех покрываемых им бакетах
    /// большей таблицы. Возвращает следующий курсор; ноль означает конец
    /// полного прохода.
    ///
    /// Курсор продвигается инкрементом старших битов с зеркальным
    /// отражением (reverse-bit increment): благодаря этому ни один бакет
    /// не будет пропущен, даже если между шагами таблица выросла или
    /// сжалась, а повторные посещения ограничены окном миграции.
    pub fn scan<F: FnMut(&K, &V)>(
        &self,
        cursor: u64,
        mut visit: F,
    ) -> u64 {
        let mut v = cursor;

        if self.migration.is_some() {
            let (small, large) = if self.tables[0].slots.len() > self.tables[1].slots.len() {
                (&self.tables[1], &self.tables[0])
            } else {
                (&self.tables[0], &self.tables[1])
            };
            let small_mask = (small.slots.len() - 1) as u64;
            let large_mask = (large.slots.len() - 1) as u64;

            Self::visit_chain(&small.slots[(v & small_mask) as usize], &mut visit);

            loop {
                Self::visit_chain(&large.slots[(v & large_mask) as usize], &mut visit);

                v |= !large_mask;
                v = v.reverse_bits().wrapping_add(1).reverse_bits();

                if v & (small_mask ^ large_mask) == 0 {
                    break;
                }
            }
        } else {
            if self.tables[0].is_unallocated() {
                return 0;
            }
            let mask = (self.tables[0].slots.len() - 1) as u64;

            Self::visit_chain(&self.tables[0].slots[(v & mask) as usize], &mut visit);

            v |= !mask;
            v = v.reverse_bits().wrapping_add(1).reverse_bits();
        }

        v
    }

    /// Хеш ключа.
    #[inline]
    fn hash_of(key: &K) -> u64 {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        h.finish()
    }

    /// Обходит одну цепочку коллизий.
    fn visit_chain<F: FnMut(&K, &V)>(
        head: &Link<K, V>,
        visit: &mut F,
    ) {
        let mut cur = head.as_deref();
        while let Some(node) = cur {
            visit(&node.key, &node.val);
            cur = node.next.as_deref();
        }
    }

    /// Ищет узел по ключу в цепочке таблицы.
    fn chain_find<'a>(
        table: &'a Table<K, V>,
        hash: u64,
        key: &K,
    ) -> Option<&'a Node<K, V>> {
        if table.is_unallocated() {
            return None;
        }

        let mut cur = table.slots[table.slot_of(hash)].as_deref();
        while let Some(node) = cur {
            if &node.key == key {
                return Some(node);
            }
            cur = node.next.as_deref();
        }
        None
    }

    /// Изменяемый вариант поиска по цепочке.
    fn chain_find_mut<'a>(
        table: &'a mut Table<K, V>,
        hash: u64,
        key: &K,
    ) -> Option<&'a mut Node<K, V>> {
        if table.is_unallocated() {
            return None;
        }

        let slot = table.slot_of(hash);
        let mut cur = &mut table.slots[slot];
        while let Some(node) = cur {
            if &node.key == key {
                return Some(&mut **node);
            }
            cur = &mut node.next;
        }
        None
    }

    /// Выцепляет узел с ключом из цепочки таблицы и поправляет счётчик.
    fn chain_detach(
        table: &mut Table<K, V>,
        hash: u64,
        key: &K,
    ) -> Option<Box<Node<K, V>>> {
        if table.is_unallocated() {
            return None;
        }

        let slot = table.slot_of(hash);
        let mut cur = &mut table.slots[slot];
        loop {
            match cur {
                None => return None,
                Some(node) if &node.key == key => {
                    let rest = node.next.take();
                    let detached = std::mem::replace(cur, rest);
                    table.used -= 1;
                    return detached;
                }
                Some(node) => cur = &mut node.next,
            }
        }
    }

    /// Находит изменяемый узел в любой из живых таблиц.
    fn node_mut(
        &mut self,
        key: &K,
    ) -> Option<&mut Node<K, V>> {
        let hash = Self::hash_of(key);
        let migrating = self.migration.is_some();
        let [t0, t1] = &mut self.tables;

        if let Some(node) = Self::chain_find_mut(t0, hash, key) {
            return Some(node);
        }
        if migrating {
            return Self::chain_find_mut(t1, hash, key);
        }
        None
    }

    /// Вставляет заведомо новый ключ в голову цепочки. Во время миграции
    /// новые ключи идут сразу в таблицу-приёмник.
    fn attach_new(
        &mut self,
        key: K,
        val: V,
    ) {
        let hash = Self::hash_of(&key);
        let target = if self.migration.is_some() { 1 } else { 0 };
        let table = &mut self.tables[target];

        let slot = table.slot_of(hash);
        let head = table.slots[slot].take();
        table.slots[slot] = Some(Box::new(Node {
            key,
            val,
            next: head,
        }));
        table.used += 1;
    }

    /// Переносит одну цепочку из старой таблицы в новую; когда переносить
    /// больше нечего, таблица-приёмник становится основной.
    fn migrate_one_bucket(&mut self) {
        let Some(idx) = self.migration else {
            return;
        };

        if idx >= self.tables[0].slots.len() {
            self.tables.swap(0, 1);
            self.tables[1] = Table::empty();
            self.migration = None;
            return;
        }

        let mut moved = self.tables[0].slots[idx].take();
        while let Some(mut node) = moved {
            moved = node.next.take();

            let slot = self.tables[1].slot_of(Self::hash_of(&node.key));
            node.next = self.tables[1].slots[slot].take();
            self.tables[1].slots[slot] = Some(node);

            self.tables[0].used -= 1;
            self.tables[1].used += 1;
        }

        self.migration = Some(idx + 1);
    }

    /// Первая вставка выделяет таблицу; заполнение до единицы запускает
    /// миграцию в таблицу вдвое большего размера.
    fn grow_if_needed(&mut self) {
        if self.migration.is_some() {
            return;
        }

        if self.tables[0].is_unallocated() {
            self.tables[0] = Table::sized(MIN_TABLE_SIZE);
            return;
        }

        if self.tables[0].used >= self.tables[0].slots.len() {
            self.tables[1] = Table::sized(self.tables[0].slots.len() * 2);
            self.migration = Some(0);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Dict, DictIter
////////////////////////////////////////////////////////////////////////////////

impl<'a, K, V> Iterator for DictIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Сначала дожёвываем текущую цепочку.
            if let Some(node) = self.node.take() {
                self.node = node.next.as_deref();
                return Some((&node.key, &node.val));
            }

            let slots = &self.dict.tables[self.table].slots;
            if self.slot >= slots.len() {
                // Таблица-приёмник пуста вне миграции, цикл сразу
                // закончится.
                if self.table == 1 {
                    return None;
                }
                self.table = 1;
                self.slot = 0;
                continue;
            }

            self.node = slots[self.slot].as_deref();
            self.slot += 1;
        }
    }
}

impl<'a, K, V> IntoIterator for &'a Dict<K, V>
where
    K: Hash + Eq,
{
    type Item = (&'a K, &'a V);
    type IntoIter = DictIter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> Default for Dict<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
