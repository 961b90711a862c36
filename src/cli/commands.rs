//! CLI command implementations

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analyzer::WalletAnalyzer;
use crate::api::{self, AppState};
use crate::cache::AnalysisCache;
use crate::client::AnalyzerClient;
use crate::config::Config;
use crate::dataset::{self, Dataset};
use crate::model::ModelBundle;
use crate::similarity::{HashingEmbedder, SimilarWallet, WalletSimilarity};
use crate::wallet::{validate_address, ActivityProfile, FeatureVector, WalletArchetype, WalletRequest};

/// Run the HTTP service
pub async fn serve(config: &Config) -> Result<()> {
    info!("Starting wallet analyzer service...");

    let analyzer = load_analyzer(config)?;
    info!(
        "Classes: {:?}, indexed wallets: {}, confidence threshold: {}",
        analyzer.classes(),
        analyzer.indexed_wallets(),
        config.decision.confidence_threshold
    );

    let cache = if config.cache.enabled {
        info!(
            "Result cache enabled (ttl {}s, max {} entries)",
            config.cache.ttl_secs, config.cache.max_entries
        );
        Some(AnalysisCache::new(&config.cache))
    } else {
        None
    };

    api::serve(AppState::new(analyzer, cache), &config.server).await?;
    Ok(())
}

/// Build the similarity index from the dataset and save it
pub fn build_index(config: &Config) -> Result<()> {
    let similarity = build_similarity(config)?;
    similarity
        .save_index(&config.similarity.index_path)
        .with_context(|| format!("Failed to save index to {}", config.similarity.index_path))?;

    println!("\n=== SIMILARITY INDEX ===\n");
    println!("Dataset:  {}", config.similarity.dataset_path);
    println!("Index:    {}", config.similarity.index_path);
    println!("Wallets:  {}", similarity.len());
    println!("Labels:   {}", similarity.labels().join(", "));
    Ok(())
}

/// Show the wallets most similar to an indexed wallet
pub fn similar(config: &Config, address: &str, k: usize) -> Result<()> {
    validate_address(address)?;
    let similarity = load_similarity(config)?;

    let Some(wallet) = similarity.get(address) else {
        anyhow::bail!("Wallet {} is not in the similarity index", address);
    };

    println!("\n=== {} ({}) ===\n", address, wallet.label);
    println!("{}\n", wallet.description);

    let neighbors = similarity.find_similar_wallets(address, k)?;
    if neighbors.is_empty() {
        println!("No similar wallets found.");
        return Ok(());
    }
    print_neighbors(&neighbors);
    Ok(())
}

/// Run the full pipeline on a request file and print the result
pub fn classify(config: &Config, input: &Path) -> Result<()> {
    let request = read_request(input)?;
    let analyzer = load_analyzer(config)?;
    let result = analyzer.analyze(&request)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Print the feature vector and activity profile of a request file
pub fn features(input: &Path) -> Result<()> {
    let request = read_request(input)?;
    request.validate()?;

    let features = FeatureVector::extract(&request.address, &request.transactions)?;
    let profile = ActivityProfile::from_transactions(&request.transactions);

    println!("\n=== FEATURES: {} ===\n", request.address);
    for (name, value) in features.named() {
        println!("{:<28} {:>16.6}", name, value);
    }

    println!("\n=== ACTIVITY ===\n");
    println!("Transactions:          {}", profile.transaction_count);
    println!("Unique counterparties: {}", profile.unique_counterparties);
    println!("Average value:         {:.6} ETH", profile.average_value);
    println!("NFT operations:        {} ({:.1}%)", profile.nft_operations, profile.nft_ratio() * 100.0);
    println!("Avg interval:          {:.1}s", profile.avg_time_between_tx);
    if let (Some(first), Some(last)) = (profile.first_seen, profile.last_seen) {
        println!("Active:                {} .. {}", first.to_rfc3339(), last.to_rfc3339());
    }
    if profile.hints.bursty_multi_contract {
        println!("Hint:                  bursty activity across many contracts");
    }
    if profile.hints.moderate_activity {
        println!("Hint:                  moderate activity");
    }
    for (method, count) in &profile.method_counts {
        let method = if method.is_empty() { "(none)" } else { method.as_str() };
        println!("  {:<20} {}", method, count);
    }
    Ok(())
}

/// Analyze a request file on a running service
pub async fn remote_analyze(config: &Config, input: &Path) -> Result<()> {
    let request = read_request(input)?;
    let client = AnalyzerClient::new(&config.client)?;
    info!("Submitting {} to {}", request.address, client.base_url());

    let result = client.analyze(&request).await?;
    let archetype = WalletArchetype::from(result.predicted_class.as_str());
    println!(
        "{}: {} (confidence {:.2}, via {})",
        request.address,
        archetype.human_name(),
        result.confidence,
        result.source
    );
    if let Some(neighbors) = &result.similar_wallets {
        print_neighbors(neighbors);
    }
    Ok(())
}

/// Check a running service
pub async fn remote_health(config: &Config) -> Result<()> {
    let client = AnalyzerClient::new(&config.client)?;
    print!("Analyzer at {}... ", client.base_url());

    match client.health().await {
        Ok(health) => {
            println!("{}", health.status.to_uppercase());
            println!("  indexed wallets: {}", health.indexed_wallets);
            println!("  classes:         {}", health.classes.join(", "));
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            Err(e.into())
        }
    }
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

fn read_request(path: &Path) -> Result<WalletRequest> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Invalid request JSON in {}", path.display()))
}

fn load_analyzer(config: &Config) -> Result<WalletAnalyzer> {
    let model = ModelBundle::load(&config.model.classifier_path, &config.model.scaler_path)
        .context("Failed to load model artifacts")?;
    let similarity = load_similarity(config)?;
    Ok(WalletAnalyzer::new(model, similarity, config.decision.clone()))
}

/// Load the saved index, rebuilding from the dataset when the snapshot is
/// missing, unreadable, built for another embedder, or built from a
/// different version of the dataset file
fn load_similarity(config: &Config) -> Result<WalletSimilarity> {
    let index_path = Path::new(&config.similarity.index_path);
    if !config.similarity.rebuild_on_start && index_path.exists() {
        let embedder = Arc::new(HashingEmbedder::new(config.similarity.dimensions));
        match WalletSimilarity::load_index(index_path, embedder) {
            Ok(similarity) if snapshot_is_current(&similarity, &config.similarity.dataset_path) => {
                return Ok(similarity)
            }
            Ok(_) => warn!(
                "Index {} was built from a different dataset (rebuilding)",
                index_path.display()
            ),
            Err(e) => warn!("Could not load index {}: {} (rebuilding)", index_path.display(), e),
        }
    }

    let similarity = build_similarity(config)?;
    if config.similarity.save_after_build {
        if let Err(e) = similarity.save_index(index_path) {
            warn!("Could not save index {}: {}", index_path.display(), e);
        }
    }
    Ok(similarity)
}

/// A snapshot is current when its dataset digest matches the file on disk;
/// without a readable dataset the snapshot is all there is
fn snapshot_is_current(similarity: &WalletSimilarity, dataset_path: &str) -> bool {
    match dataset::file_digest(dataset_path) {
        Ok(digest) => similarity.dataset_digest() == Some(digest.as_str()),
        Err(e) => {
            warn!("Cannot fingerprint dataset {}: {}", dataset_path, e);
            true
        }
    }
}

fn build_similarity(config: &Config) -> Result<WalletSimilarity> {
    let dataset = Dataset::load(&config.similarity.dataset_path)
        .with_context(|| format!("Failed to load dataset {}", config.similarity.dataset_path))?;
    if dataset.is_empty() {
        warn!("Dataset {} has no wallets", config.similarity.dataset_path);
    }

    let embedder = Arc::new(HashingEmbedder::new(config.similarity.dimensions));
    let mut similarity = WalletSimilarity::from_dataset(&dataset, embedder);
    similarity.build_index()?;
    Ok(similarity)
}

fn print_neighbors(neighbors: &[SimilarWallet]) {
    println!("{:<44} {:<16} {:>6} {:>10}", "ADDRESS", "LABEL", "TXS", "DISTANCE");
    for n in neighbors {
        println!(
            "{:<44} {:<16} {:>6} {:>10.4}",
            n.address, n.label, n.transaction_count, n.distance
        );
    }
}
