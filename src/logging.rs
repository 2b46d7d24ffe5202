//! Инициализация логирования.
//!
//! Тонкая обёртка над `tracing-subscriber`: уровень берётся из
//! переменной окружения `LAVKA_LOG` (формат `EnvFilter`), по умолчанию
//! `info`.

use tracing_subscriber::{fmt, EnvFilter};

/// Поднимает глобальный подписчик логов. Повторный вызов безвреден:
/// ошибка установки глобального подписчика игнорируется.
pub fn init() {
    let filter = EnvFilter::try_from_env("LAVKA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
