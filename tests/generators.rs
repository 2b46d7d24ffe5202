//! Генераторы для property-based тестов.
//!
//! Стратегии дают и числовые, и строковые элементы множеств, чтобы
//! прогонять оба кодирования и их смешение.

use proptest::{prelude::*, string::string_regex};

use lavka::Sds;

/// Элемент множества: примерно пополам числа и строки.
pub fn member_strategy() -> impl Strategy<Value = Sds> {
    prop_oneof![
        // Числа в разных диапазонах ширины intset.
        (-300i64..300).prop_map(Sds::from_i64),
        any::<i64>().prop_map(Sds::from_i64),
        // Короткие строки; среди них попадаются и похожие на числа с
        // ведущим нулём.
        string_regex("[a-z0-9]{1,8}")
            .unwrap()
            .prop_map(|s| Sds::from_str(&s)),
    ]
}

/// Только числовые элементы: множество обязано остаться в intset, пока
/// не упрётся в порог.
pub fn int_member_strategy() -> impl Strategy<Value = Sds> {
    any::<i64>().prop_map(Sds::from_i64)
}

/// Последовательность операций добавить/удалить.
#[derive(Debug, Clone)]
pub enum SetOpKind {
    Add(Sds),
    Remove(Sds),
}

pub fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<SetOpKind>> {
    prop::collection::vec(
        prop_oneof![
            member_strategy().prop_map(SetOpKind::Add),
            member_strategy().prop_map(SetOpKind::Remove),
        ],
        0..max_len,
    )
}

/// Имя ключа.
pub fn key_strategy() -> impl Strategy<Value = Sds> {
    string_regex("[a-z]{1,6}")
        .unwrap()
        .prop_map(|s| Sds::from_str(&s))
}
