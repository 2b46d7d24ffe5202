//! Команды и их исполнение.
//!
//! Модули по семействам:
//!
//! - `execute`: диспетчер, трейт `CommandExecute`, состояние сеанса.
//! - `keyspace`: типонезависимые команды над пространством ключей.
//! - `reply`: структурная форма ответа клиенту.
//! - `set`: команды множеств.
//! - `string`: минимальные строковые команды.
//! - `table`: таблица арностей, флагов и схем ключей.

pub mod execute;
pub mod keyspace;
pub mod reply;
pub mod set;
pub mod string;
pub mod table;

pub use execute::{dispatch, CallerOrigin, Command, CommandExecute, Session};
pub use keyspace::*;
pub use reply::Reply;
pub use set::*;
pub use string::*;
pub use table::{lookup_command, COMMAND_TABLE};
