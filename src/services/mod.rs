pub mod director;
pub mod llm;
pub mod prompt;
#[cfg(not(target_arch = "wasm32"))]
pub mod session;
#[cfg(not(target_arch = "wasm32"))]
pub mod setup;
