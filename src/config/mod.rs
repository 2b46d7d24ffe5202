pub mod settings;

pub use settings::{MaxmemoryPolicy, Settings};
