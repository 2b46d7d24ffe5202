pub mod db;
pub mod expire;
pub mod keys;
pub mod scan;

pub use db::{
    db_add, db_async_delete, db_delete, db_exists, db_overwrite, db_random_key, db_sync_delete,
    db_unshare_string_value, del_keys_in_slot, empty_db, lookup_key, lookup_key_read,
    lookup_key_read_with_flags, lookup_key_write, notify_keyspace_event,
    scan_database_for_ready_lists, set_key, signal_flushed_db, signal_list_as_ready,
    signal_modified_key, swap_databases, Db, LOOKUP_NONE, LOOKUP_NOTOUCH,
};
pub use expire::{expire_if_needed, get_expire, propagate_expire, remove_expire, set_expire};
pub use keys::{get_keys_from_command, CommandSpec, CMD_ADMIN, CMD_READONLY, CMD_WRITE};
pub use scan::{scan_generic, MatchPattern, ScanOptions};
