use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use once_cell::sync::Lazy;
use rand::Rng;

use super::{dict::Dict, sds::Sds, set::SetValue};

/// Разрядность поля времени доступа.
pub const LRU_BITS: u32 = 24;

/// Максимум LRU-часов; дальше счёт идёт по модулю.
pub const LRU_CLOCK_MAX: u32 = (1 << LRU_BITS) - 1;

/// Начальное значение LFU-счётчика нового объекта: даёт свежим ключам
/// шанс накопить обращения до первого вытеснения.
pub const LFU_INIT_VAL: u8 = 5;

/// Количество предсозданных общих числовых объектов.
pub const SHARED_INTEGERS: i64 = 10_000;

/// Строковое значение: сырые байты или упакованное число.
#[derive(Debug, Clone, PartialEq)]
pub enum StrValue {
    Raw(Sds),
    Int(i64),
}

/// Полиморфное значение, хранимое в кейспейсе.
///
/// Списки, хеши и сортированные множества здесь присутствуют в минимальном
/// виде: их называет `TYPE`, создание списка сигналит блокирующему
/// коллаборатору, а generic-SCAN перечисляет их содержимое.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(StrValue),
    List(Vec<Sds>),
    Set(SetValue),
    Hash(Dict<Sds, Sds>),
    ZSet { dict: Dict<Sds, f64> },
}

/// Объект-обёртка значения: полезная нагрузка плюс 24-битное поле времени
/// доступа, интерпретируемое политикой вытеснения либо как LRU-часы, либо
/// как пара (минуты LFU ‖ счётчик LFU).
///
/// Разделяемое владение — `Arc`: счётчик ссылок и есть refcount объекта,
/// а `Arc::make_mut` даёт copy-on-write для записи в разделяемое значение.
#[derive(Debug)]
pub struct Object {
    pub value: Value,
    lru: AtomicU32,
}

/// Разделяемая ссылка на объект.
pub type ObjRef = Arc<Object>;

/// Пул общих числовых объектов. Пул держит сильные ссылки всё время жизни
/// процесса, поэтому эти объекты никогда не освобождаются.
static SHARED_INTS: Lazy<Vec<ObjRef>> = Lazy::new(|| {
    (0..SHARED_INTEGERS)
        .map(|v| Arc::new(Object::with_lru(Value::Str(StrValue::Int(v)), 0)))
        .collect()
});

/// Возвращает общий числовой объект для маленьких неотрицательных чисел.
pub fn shared_int(v: i64) -> Option<ObjRef> {
    if (0..SHARED_INTEGERS).contains(&v) {
        Some(Arc::clone(&SHARED_INTS[v as usize]))
    } else {
        None
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Object {
    /// Создаёт объект с нулевым полем доступа; корректное начальное
    /// значение выставляет кейспейс при установке ключа.
    pub fn new(value: Value) -> Self {
        Self::with_lru(value, 0)
    }

    /// Создаёт объект с заданным полем доступа.
    pub fn with_lru(
        value: Value,
        lru: u32,
    ) -> Self {
        Object {
            value,
            lru: AtomicU32::new(lru & LRU_CLOCK_MAX),
        }
    }

    /// Разделяемый объект: помимо слота кейспейса на него держит ссылку
    /// кто-то ещё (итератор, отложенный ответ, пул сентинелей).
    #[inline]
    pub fn is_shared(obj: &ObjRef) -> bool {
        Arc::strong_count(obj) != 1
    }

    /// Текущее значение поля доступа.
    #[inline]
    pub fn lru(&self) -> u32 {
        self.lru.load(Ordering::Relaxed)
    }

    /// Устанавливает поле доступа (обрезая до 24 бит).
    #[inline]
    pub fn set_lru(
        &self,
        lru: u32,
    ) {
        self.lru.store(lru & LRU_CLOCK_MAX, Ordering::Relaxed);
    }

    /// Имя типа, как его отдаёт команда TYPE.
    pub fn type_name(&self) -> &'static str {
        match &self.value {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Hash(_) => "hash",
            Value::ZSet { .. } => "zset",
        }
    }

    /// Имя кодирования для интроспекции объектов.
    pub fn encoding_name(&self) -> &'static str {
        match &self.value {
            Value::Str(StrValue::Raw(_)) => "raw",
            Value::Str(StrValue::Int(_)) => "int",
            Value::List(_) => "quicklist",
            Value::Set(set) => set.encoding_name(),
            Value::Hash(_) => "hashtable",
            Value::ZSet { .. } => "skiplist",
        }
    }

    /// Декодирует LFU-пару (минуты, счётчик) из поля доступа.
    #[inline]
    pub fn lfu_parts(&self) -> (u16, u8) {
        let lru = self.lru();
        ((lru >> 8) as u16, (lru & 0xFF) as u8)
    }

    /// Применяет LFU-распад: счётчик уменьшается на число прошедших
    /// периодов `decay_minutes` и возвращается без записи.
    pub fn lfu_decr_and_return(
        &self,
        now_minutes: u16,
        decay_minutes: u32,
    ) -> u8 {
        let (ldt, counter) = self.lfu_parts();
        if decay_minutes == 0 {
            return counter;
        }

        // 16-битные минуты переполняются каждые ~45 дней.
        let elapsed = now_minutes.wrapping_sub(ldt) as u32;
        let periods = elapsed / decay_minutes;

        counter.saturating_sub(periods.min(u8::MAX as u32) as u8)
    }

    /// Записывает LFU-пару обратно в поле доступа.
    #[inline]
    pub fn set_lfu(
        &self,
        minutes: u16,
        counter: u8,
    ) {
        self.set_lru(((minutes as u32) << 8) | counter as u32);
    }
}

/// Логарифмический инкремент LFU-счётчика: вероятность роста падает как
/// `1 / ((counter - 5) * log_factor + 1)`, потолок 255.
pub fn lfu_log_incr<R: Rng>(
    counter: u8,
    log_factor: u32,
    rng: &mut R,
) -> u8 {
    if counter == u8::MAX {
        return counter;
    }

    let r: f64 = rng.gen();
    let baseval = counter.saturating_sub(LFU_INIT_VAL) as f64;
    let p = 1.0 / (baseval * log_factor as f64 + 1.0);

    if r < p {
        counter + 1
    } else {
        counter
    }
}

/// Переводит абсолютное время в 16-битные LFU-минуты.
#[inline]
pub fn lfu_time_minutes(now_ms: i64) -> u16 {
    ((now_ms / 1000 / 60) & 0xFFFF) as u16
}

/// Переводит абсолютное время в 24-битные LRU-часы.
#[inline]
pub fn lru_clock(now_ms: i64) -> u32 {
    ((now_ms / 1000) as u32) & LRU_CLOCK_MAX
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Object
////////////////////////////////////////////////////////////////////////////////

impl Clone for Object {
    fn clone(&self) -> Self {
        Object {
            value: self.value.clone(),
            lru: AtomicU32::new(self.lru()),
        }
    }
}

impl PartialEq for Object {
    /// Сравнение по значению; поле доступа — служебное.
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<Value> for Object {
    fn from(value: Value) -> Self {
        Object::new(value)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет обрезание поля доступа до 24 бит.
    #[test]
    fn lru_field_is_24_bit() {
        let o = Object::new(Value::Str(StrValue::Int(1)));
        o.set_lru(u32::MAX);
        assert_eq!(o.lru(), LRU_CLOCK_MAX);
    }

    /// Тест проверяет упаковку и распаковку LFU-пары.
    #[test]
    fn lfu_parts_roundtrip() {
        let o = Object::new(Value::Str(StrValue::Int(1)));
        o.set_lfu(0xABCD, 42);
        assert_eq!(o.lfu_parts(), (0xABCD, 42));
    }

    /// Тест проверяет распад LFU-счётчика по прошедшим минутам.
    #[test]
    fn lfu_decay() {
        let o = Object::new(Value::Str(StrValue::Int(1)));
        o.set_lfu(100, 10);

        // Ни одного полного периода не прошло.
        assert_eq!(o.lfu_decr_and_return(100, 1), 10);
        // 3 минуты при периоде 1 минута: минус три.
        assert_eq!(o.lfu_decr_and_return(103, 1), 7);
        // Счётчик не уходит ниже нуля.
        assert_eq!(o.lfu_decr_and_return(250, 1), 0);
        // Нулевой период распада отключает распад.
        assert_eq!(o.lfu_decr_and_return(250, 0), 10);
    }

    /// Тест проверяет распад через переполнение 16-битных минут.
    #[test]
    fn lfu_decay_wraps() {
        let o = Object::new(Value::Str(StrValue::Int(1)));
        o.set_lfu(0xFFFF, 10);
        assert_eq!(o.lfu_decr_and_return(1, 1), 8);
    }

    /// Тест проверяет насыщение логарифмического инкремента.
    #[test]
    fn lfu_log_incr_saturates() {
        let mut rng = rand::thread_rng();
        assert_eq!(lfu_log_incr(u8::MAX, 10, &mut rng), u8::MAX);

        // При нулевом факторе вероятность равна единице: рост всегда.
        assert_eq!(lfu_log_incr(7, 0, &mut rng), 8);
    }

    /// Тест проверяет пул общих числовых объектов.
    #[test]
    fn shared_integers_pool() {
        let a = shared_int(42).unwrap();
        let b = shared_int(42).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        // Пул плюс две выданных ссылки.
        assert!(Arc::strong_count(&a) >= 3);

        assert!(shared_int(-1).is_none());
        assert!(shared_int(SHARED_INTEGERS).is_none());
    }

    /// Тест проверяет признак разделяемого владения.
    #[test]
    fn is_shared_follows_refcount() {
        let a: ObjRef = Arc::new(Object::new(Value::Str(StrValue::Int(1))));
        assert!(!Object::is_shared(&a));

        let b = Arc::clone(&a);
        assert!(Object::is_shared(&a));
        drop(b);
        assert!(!Object::is_shared(&a));

        // Объекты пула сентинелей разделяемы всегда: пул держит свою
        // ссылку вечно.
        let s = shared_int(5).unwrap();
        assert!(Object::is_shared(&s));
    }

    /// Тест проверяет copy-on-write через make_mut для разделяемого объекта.
    #[test]
    fn make_mut_is_copy_on_write() {
        let mut a: ObjRef = Arc::new(Object::new(Value::Str(StrValue::Int(5))));
        let b = Arc::clone(&a);

        let obj = Arc::make_mut(&mut a);
        obj.value = Value::Str(StrValue::Int(6));

        assert_eq!(b.value, Value::Str(StrValue::Int(5)));
        assert_eq!(a.value, Value::Str(StrValue::Int(6)));
    }

    /// Тест проверяет имена типов и кодирований.
    #[test]
    fn type_and_encoding_names() {
        let s = Object::new(Value::Str(StrValue::Raw(Sds::from_str("x"))));
        assert_eq!(s.type_name(), "string");
        assert_eq!(s.encoding_name(), "raw");

        let i = Object::new(Value::Str(StrValue::Int(1)));
        assert_eq!(i.encoding_name(), "int");

        let set = Object::new(Value::Set(SetValue::default()));
        assert_eq!(set.type_name(), "set");
        assert_eq!(set.encoding_name(), "intset");
    }
}
