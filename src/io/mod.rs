pub mod config_io;
pub mod event_io;
pub mod state;
pub mod vault_io;
pub mod watcher;

pub use vault_io::{VaultError, delete_tasks, load_vault, save_task};
