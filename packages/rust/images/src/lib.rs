//! Cover image services: generative (OpenAI, Gemini) and stock (Unsplash).
//!
//! Generated images are written under the configured image directory with a
//! name derived from the prompt hash, then uploaded by the publisher.

mod gemini;
mod openai;
mod prompt;
mod unsplash;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use autopress_shared::{AutopressError, ImageGenerationConfig, ImageGenerator, Result};

pub use gemini::GeminiImages;
pub use openai::OpenAiImages;
pub use prompt::image_prompt;
pub use unsplash::Unsplash;

/// Image generation and stock downloads share one timeout.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 60;

pub(crate) const USER_AGENT: &str = concat!("Autopress/", env!("CARGO_PKG_VERSION"));

/// Short content hash of a prompt, used in file names.
fn prompt_hash(service: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(prompt.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Write image bytes to `dir/{service}_{hash}.{ext}`.
pub(crate) async fn save_image(
    dir: &Path,
    service: &str,
    prompt: &str,
    ext: &str,
    bytes: &[u8],
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AutopressError::io(dir, e))?;
    let path = dir.join(format!("{service}_{}.{ext}", prompt_hash(service, prompt)));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AutopressError::io(&path, e))?;
    Ok(path)
}

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Build every generator whose API key is present, OpenAI first.
pub fn configured_generators(
    config: &ImageGenerationConfig,
    output_dir: &Path,
) -> Result<Vec<Box<dyn ImageGenerator>>> {
    let mut generators: Vec<Box<dyn ImageGenerator>> = Vec::new();

    if let Some(key) = env_key(&config.openai_api_key_env) {
        generators.push(Box::new(OpenAiImages::new(
            key,
            &config.openai_model,
            &config.openai_base_url,
            output_dir,
        )?));
    }
    if let Some(key) = env_key(&config.gemini_api_key_env) {
        generators.push(Box::new(GeminiImages::new(
            key,
            &config.gemini_model,
            &config.gemini_base_url,
            output_dir,
        )?));
    }

    debug!(
        generators = ?generators.iter().map(|g| g.name().to_string()).collect::<Vec<_>>(),
        "image generators configured"
    );
    Ok(generators)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_hash_deterministic() {
        let a = prompt_hash("gpt_image", "laptop");
        assert_eq!(a, prompt_hash("gpt_image", "laptop"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, prompt_hash("gemini_image", "laptop"));
    }

    #[test]
    fn no_keys_no_generators() {
        let config = ImageGenerationConfig {
            openai_api_key_env: "AUTOPRESS_TEST_NO_OPENAI_KEY".into(),
            gemini_api_key_env: "AUTOPRESS_TEST_NO_GEMINI_KEY".into(),
            ..ImageGenerationConfig::default()
        };
        let generators = configured_generators(&config, &std::env::temp_dir()).unwrap();
        assert!(generators.is_empty());
    }
}
