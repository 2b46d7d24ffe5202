use rand::Rng;

/// Ширина ячейки множества. Порядок вариантов задаёт порядок расширения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Width {
    W16,
    W32,
    W64,
}

/// Хранилище: один отсортированный массив в самой узкой ширине,
/// вмещающей все текущие элементы.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cells {
    W16(Vec<i16>),
    W32(Vec<i32>),
    W64(Vec<i64>),
}

/// Компактное множество уникальных целых чисел.
///
/// Элементы лежат строго по возрастанию; вставка значения, не влезающего
/// в текущую ширину, перекладывает весь массив в более широкие ячейки.
/// Обратного сужения нет. Доступ по порядковому индексу даёт дешёвую
/// равномерную случайную выборку.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntSet {
    cells: Cells,
}

/// Итератор по элементам множества в порядке возрастания.
pub struct IntSetIter<'a> {
    set: &'a IntSet,
    index: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl IntSet {
    pub fn new() -> Self {
        IntSet {
            cells: Cells::W16(Vec::new()),
        }
    }

    /// Возвращает кол-во элементов во множестве.
    #[inline]
    pub fn len(&self) -> usize {
        match &self.cells {
            Cells::W16(cells) => cells.len(),
            Cells::W32(cells) => cells.len(),
            Cells::W64(cells) => cells.len(),
        }
    }

    /// Проверяет, пустое ли множество.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Проверяет наличие значения во множестве.
    #[inline]
    pub fn contains(
        &self,
        v: i64,
    ) -> bool {
        self.find(v).is_ok()
    }

    /// Бинарный поиск: `Ok(позиция)` для присутствующего значения,
    /// `Err(слот вставки)` для отсутствующего.
    ///
    /// Значение вне текущей ширины отсутствует заведомо; его слот — край
    /// массива со стороны знака.
    pub fn find(
        &self,
        v: i64,
    ) -> Result<usize, usize> {
        match &self.cells {
            Cells::W16(cells) => match i16::try_from(v) {
                Ok(x) => cells.binary_search(&x),
                Err(_) => Err(if v < 0 { 0 } else { cells.len() }),
            },
            Cells::W32(cells) => match i32::try_from(v) {
                Ok(x) => cells.binary_search(&x),
                Err(_) => Err(if v < 0 { 0 } else { cells.len() }),
            },
            Cells::W64(cells) => cells.binary_search(&v),
        }
    }

    /// Вставляет значение во множество. Возвращает `true`, если значение
    /// новое.
    pub fn insert(
        &mut self,
        v: i64,
    ) -> bool {
        let need = Self::width_of(v);
        if need > self.width() {
            self.widen_to(need);
        }

        match self.find(v) {
            Ok(_) => false,
            Err(pos) => {
                match &mut self.cells {
                    Cells::W16(cells) => cells.insert(pos, v as i16),
                    Cells::W32(cells) => cells.insert(pos, v as i32),
                    Cells::W64(cells) => cells.insert(pos, v),
                }
                true
            }
        }
    }

    /// Удаляет указанное значение из множества. Ширина ячеек при этом не
    /// сужается.
    pub fn remove(
        &mut self,
        v: i64,
    ) -> bool {
        match self.find(v) {
            Err(_) => false,
            Ok(pos) => {
                match &mut self.cells {
                    Cells::W16(cells) => {
                        cells.remove(pos);
                    }
                    Cells::W32(cells) => {
                        cells.remove(pos);
                    }
                    Cells::W64(cells) => {
                        cells.remove(pos);
                    }
                }
                true
            }
        }
    }

    /// Возвращает элемент по порядковому индексу (в порядке возрастания).
    #[inline]
    pub fn get(
        &self,
        index: usize,
    ) -> Option<i64> {
        match &self.cells {
            Cells::W16(cells) => cells.get(index).map(|&x| x as i64),
            Cells::W32(cells) => cells.get(index).map(|&x| x as i64),
            Cells::W64(cells) => cells.get(index).copied(),
        }
    }

    /// Равномерно выбранный случайный элемент.
    pub fn random<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        self.get(rng.gen_range(0..self.len()))
    }

    /// Создаёт итератор по всем элементам множества в отсортированном
    /// порядке.
    #[inline]
    pub fn iter(&self) -> IntSetIter<'_> {
        IntSetIter {
            set: self,
            index: 0,
        }
    }

    /// Самая узкая ширина, вмещающая значение.
    fn width_of(v: i64) -> Width {
        if i16::try_from(v).is_ok() {
            Width::W16
        } else if i32::try_from(v).is_ok() {
            Width::W32
        } else {
            Width::W64
        }
    }

    /// Текущая ширина ячеек.
    fn width(&self) -> Width {
        match &self.cells {
            Cells::W16(_) => Width::W16,
            Cells::W32(_) => Width::W32,
            Cells::W64(_) => Width::W64,
        }
    }

    /// Перекладывает содержимое в более широкие ячейки.
    fn widen_to(
        &mut self,
        target: Width,
    ) {
        let wide: Vec<i64> = self.iter().collect();

        self.cells = match target {
            Width::W32 => Cells::W32(wide.into_iter().map(|x| x as i32).collect()),
            Width::W64 => Cells::W64(wide),
            // Сужения не бывает.
            Width::W16 => return,
        };
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для IntSet, IntSetIter
////////////////////////////////////////////////////////////////////////////////

impl<'a> Iterator for IntSetIter<'a> {
    type Item = i64;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let v = self.set.get(self.index)?;
        self.index += 1;
        Some(v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.set.len() - self.index;
        (rest, Some(rest))
    }
}

impl<'a> ExactSizeIterator for IntSetIter<'a> {}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
