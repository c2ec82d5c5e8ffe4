pub mod install_state;

pub use install_state::{write_atomic, InstallState, InstallStateStore, InstalledBinary};
