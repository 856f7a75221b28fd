pub mod debug;
pub mod doctor;
pub mod export;
pub mod import;
pub mod ingest;
pub mod maintenance;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use nexus_knowledge::config::{EmbeddingConfig, KnowledgeConfig};
use nexus_knowledge::embedding::local::{MODEL_FILE, TOKENIZER_FILE};
use nexus_knowledge::embedding::tfidf::{TfIdfVectorizer, VOCABULARY_FILE};
use nexus_knowledge::knowledge::{ChunkStore, KnowledgeSearch};

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Open the configured store and embedder for a command.
pub fn open_search(config: &KnowledgeConfig) -> Result<KnowledgeSearch> {
    KnowledgeSearch::open(config).with_context(|| {
        format!(
            "failed to open knowledge base at {}",
            config.resolved_db_path().display()
        )
    })
}

/// Truncate to `max_chars` characters for terminal display.
pub fn preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let head: String = content.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let cache_dir = config.resolved_cache_dir();
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    let model_path = cache_dir.join(MODEL_FILE);
    let tokenizer_path = cache_dir.join(TOKENIZER_FILE);

    if model_path.exists() {
        println!("Model already exists at {}", model_path.display());
    } else {
        println!("Downloading {} ({MODEL_FILE}, ~90MB)...", config.model);
        download_file(MODEL_URL, &model_path).await?;
        println!("Model saved to {}", model_path.display());
    }

    if tokenizer_path.exists() {
        println!("Tokenizer already exists at {}", tokenizer_path.display());
    } else {
        println!("Downloading {TOKENIZER_FILE}...");
        download_file(TOKENIZER_URL, &tokenizer_path).await?;
        println!("Tokenizer saved to {}", tokenizer_path.display());
    }

    println!("Model download complete. The transformer tier is used on next start.");
    Ok(())
}

/// Download a file with a progress bar. Writes to a temp file, then renames.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    let bytes = response.bytes().await.context("error reading response")?;
    pb.inc(bytes.len() as u64);
    file.write_all(&bytes).await.context("error writing to file")?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

/// Fit the TF-IDF vocabulary over every stored chunk and save it to the cache directory.
///
/// Opens the store directly: the fitted vocabulary must not depend on which tier
/// is currently selected.
pub fn model_fit(config: &KnowledgeConfig) -> Result<()> {
    let store = ChunkStore::from_config(config)?;
    let corpus: Vec<String> = store
        .all_chunks()?
        .into_iter()
        .map(|chunk| chunk.content)
        .collect();
    anyhow::ensure!(!corpus.is_empty(), "no chunks stored; ingest some knowledge first");

    let vectorizer = TfIdfVectorizer::fit(&corpus);
    let path = config.embedding.resolved_cache_dir().join(VOCABULARY_FILE);
    vectorizer
        .save(&path)
        .with_context(|| format!("failed to write vocabulary: {}", path.display()))?;

    println!(
        "Fitted {} terms over {} chunks; saved to {}",
        vectorizer.len(),
        vectorizer.documents(),
        path.display()
    );
    println!("Vectors stored under another tier are not comparable; re-run `nexus-kb import` from an export to re-embed.");
    Ok(())
}
