pub mod hooks;
pub mod lazyfree;
pub mod notify;
pub mod server;

pub use hooks::{
    Hooks, KeyspaceEvent, ListBlockingHooks, NotificationSink, NullHooks, PersistenceHooks,
    PropagatedCommand, PropagationSink, RecordingHooks, SlotIndex, WatchHooks,
};
pub use lazyfree::LazyFree;
pub use server::{Caller, Server};
