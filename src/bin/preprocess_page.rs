//! Preprocess a single page image for OCR.
//!
//! Usage: `preprocess_page <input> <output.png>`
//!
//! Writes the processed image as PNG and prints a JSON summary of the
//! detected quality tier, metrics, stages and OCR hints to stdout.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::info;

use page_preprocess::config::AppConfig;
use page_preprocess::errors::error_logging;
use page_preprocess::observability;
use page_preprocess::{ImagePreprocessor, OcrHints};

fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        bail!("{}", usage(&args));
    }
    let input = PathBuf::from(&args[1]);
    let output = PathBuf::from(&args[2]);

    let config = AppConfig::from_env().map_err(|e| {
        error_logging::log_config_error(&e, "PREPROCESS_*", "load_configuration");
        anyhow::anyhow!("{}", e)
    })?;
    observability::init_tracing_with_config(&config.observability)?;
    info!("{}", config.summary());

    let preprocessor = ImagePreprocessor::with_config(config.preprocessing)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let result = preprocessor
        .preprocess_path(&input)
        .with_context(|| format!("Failed to preprocess {}", input.display()))?;

    result.image.save(&output).map_err(|e| {
        let path = output.display().to_string();
        error_logging::log_filesystem_error(&e, "save_image", Some(path.as_str()), None);
        anyhow::anyhow!("Failed to write {}: {}", output.display(), e)
    })?;

    info!(
        input = %input.display(),
        output = %output.display(),
        quality = %result.quality,
        "Preprocessed page written"
    );

    let report = json!({
        "input": input.display().to_string(),
        "output": output.display().to_string(),
        "preprocessing": result.summary(),
        "ocr_hints": OcrHints::for_tier(result.quality),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Usage line, tolerating an empty argument vector.
fn usage(args: &[String]) -> String {
    let program = args.first().map(String::as_str).unwrap_or("preprocess_page");
    format!("Usage: {} <input image> <output png>", program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_names_program() {
        let args = vec!["/usr/bin/preprocess_page".to_string()];
        assert_eq!(
            usage(&args),
            "Usage: /usr/bin/preprocess_page <input image> <output png>"
        );
    }

    #[test]
    fn test_usage_without_arguments() {
        assert_eq!(usage(&[]), "Usage: preprocess_page <input image> <output png>");
    }
}
