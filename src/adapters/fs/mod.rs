pub mod loader;

pub use loader::{LoadedProject, load_project};
