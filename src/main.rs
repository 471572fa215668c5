#[cfg(not(target_arch = "wasm32"))]
use anyhow::Result;
#[cfg(not(target_arch = "wasm32"))]
use infinite_comic::core::config::Config;
#[cfg(not(target_arch = "wasm32"))]
use infinite_comic::services::{llm, session};

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // A missing API key is reported on the first remote call, not here.
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            return Err(e);
        }
    };

    config.ensure_directories()?;

    let generator = llm::create_generator(&config.llm)?;
    session::run_session(&config, generator).await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
