pub mod error;
pub mod load;
pub mod save;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_settings, DEFAULT_CONFIG_FILE};
pub use save::{save_settings, write_default_settings};
pub use settings::{Settings, WorkerSettings};
