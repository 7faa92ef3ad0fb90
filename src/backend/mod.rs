/// Backend that owns the capability objects and runs their async calls
///
/// - `main_loop`: action polling loop on a dedicated tokio runtime
/// - `main_loop::handlers`: one spawned task per action, completions sent back as `GuiEvent`s
/// - `main_loop::state`: per-session cancellation tokens
mod main_loop;

// Re-export the main backend entry points
pub use main_loop::run_backend;
