//! Wallet similarity engine
//!
//! Keeps one description and one embedding per labeled wallet and answers
//! "which known wallets look like this one" queries, either for an indexed
//! address or for an unseen transaction history.
//!
//! Addresses are matched case-insensitively.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dataset::{Dataset, WalletRecord};
use crate::error::{Error, Result};
use crate::similarity::description::describe_wallet;
use crate::similarity::embedding::Embedder;
use crate::similarity::index::FlatIndex;
use crate::wallet::{normalize_address, ActivityProfile, WalletTransaction};

/// Bumped whenever the snapshot layout changes
const SNAPSHOT_VERSION: u32 = 2;

/// Indexed wallet metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedWallet {
    pub address: String,
    pub label: String,
    pub transaction_count: usize,
    pub description: String,
}

impl IndexedWallet {
    fn from_record(record: &WalletRecord) -> Self {
        let profile = ActivityProfile::from_transactions(&record.transactions);
        Self {
            address: normalize_address(&record.address),
            label: record.label.clone(),
            transaction_count: record.transactions.len(),
            description: describe_wallet(&profile),
        }
    }
}

/// A known wallet similar to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarWallet {
    pub address: String,
    pub label: String,
    pub transaction_count: usize,
    pub description: String,
    /// Squared L2 distance between description embeddings
    pub distance: f32,
}

/// On-disk index snapshot
#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    embedder: String,
    dataset_digest: Option<String>,
    entries: Vec<IndexedWallet>,
    index: FlatIndex,
}

/// Nearest-neighbor search over labeled wallet descriptions
pub struct WalletSimilarity {
    embedder: Arc<dyn Embedder>,
    entries: Vec<IndexedWallet>,
    positions: HashMap<String, usize>,
    index: FlatIndex,
    /// Digest of the dataset the entries were described from
    dataset_digest: Option<String>,
}

impl WalletSimilarity {
    /// Empty engine
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let index = FlatIndex::new(embedder.dimensions());
        Self {
            embedder,
            entries: Vec::new(),
            positions: HashMap::new(),
            index,
            dataset_digest: None,
        }
    }

    /// Describe every wallet in the dataset; call [`build_index`] to embed
    ///
    /// [`build_index`]: WalletSimilarity::build_index
    pub fn from_dataset(dataset: &Dataset, embedder: Arc<dyn Embedder>) -> Self {
        let mut engine = Self::new(embedder);
        engine.dataset_digest = dataset.digest().map(str::to_string);
        for record in dataset.records() {
            let entry = IndexedWallet::from_record(record);
            engine.positions.insert(entry.address.clone(), engine.entries.len());
            engine.entries.push(entry);
        }
        debug!(wallets = engine.entries.len(), "Created wallet descriptions");
        engine
    }

    /// Embed all descriptions and rebuild the index from scratch
    pub fn build_index(&mut self) -> Result<()> {
        let descriptions: Vec<String> = self.entries.iter().map(|e| e.description.clone()).collect();
        let embeddings = self.embedder.embed_batch(&descriptions)?;

        let mut index = FlatIndex::new(self.embedder.dimensions());
        for embedding in &embeddings {
            index.add(embedding)?;
        }
        self.index = index;

        info!(
            wallets = self.index.len(),
            dimensions = self.index.dimensions(),
            embedder = self.embedder.name(),
            "Built similarity index"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_built(&self) -> bool {
        self.index.len() == self.entries.len()
    }

    pub fn dataset_digest(&self) -> Option<&str> {
        self.dataset_digest.as_deref()
    }

    fn position(&self, address: &str) -> Option<usize> {
        self.positions.get(&normalize_address(address)).copied()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.position(address).is_some()
    }

    pub fn get(&self, address: &str) -> Option<&IndexedWallet> {
        self.position(address).map(|i| &self.entries[i])
    }

    fn ensure_built(&self) -> Result<()> {
        if self.is_built() {
            Ok(())
        } else {
            Err(Error::Index(format!(
                "index holds {} vectors for {} wallets; run build_index first",
                self.index.len(),
                self.entries.len()
            )))
        }
    }

    /// Up to `k` wallets most similar to an indexed wallet, excluding itself
    ///
    /// Unknown addresses yield an empty list.
    pub fn find_similar_wallets(&self, address: &str, k: usize) -> Result<Vec<SimilarWallet>> {
        self.ensure_built()?;
        let Some(position) = self.position(address) else {
            return Ok(Vec::new());
        };
        let query = self
            .index
            .vector(position)
            .ok_or_else(|| Error::Index(format!("missing vector for {}", address)))?
            .to_vec();

        self.search(&query, k, |candidate| candidate != position)
    }

    /// Up to `k` wallets most similar to an arbitrary history
    ///
    /// An indexed wallet with the same address is never returned.
    pub fn find_similar_to_history(
        &self,
        address: &str,
        transactions: &[WalletTransaction],
        k: usize,
    ) -> Result<Vec<SimilarWallet>> {
        self.ensure_built()?;
        let profile = ActivityProfile::from_transactions(transactions);
        let query = self.embedder.embed(&describe_wallet(&profile))?;
        let own = self.position(address);

        self.search(&query, k, |candidate| Some(candidate) != own)
    }

    fn search<F>(&self, query: &[f32], k: usize, keep: F) -> Result<Vec<SimilarWallet>>
    where
        F: Fn(usize) -> bool,
    {
        // One extra hit covers the excluded wallet
        let hits = self.index.search(query, k.saturating_add(1))?;
        Ok(hits
            .into_iter()
            .filter(|hit| keep(hit.position))
            .take(k)
            .map(|hit| {
                let entry = &self.entries[hit.position];
                SimilarWallet {
                    address: entry.address.clone(),
                    label: entry.label.clone(),
                    transaction_count: entry.transaction_count,
                    description: entry.description.clone(),
                    distance: hit.distance,
                }
            })
            .collect())
    }

    /// Insert a wallet or replace an existing one
    pub fn upsert_wallet(&mut self, record: &WalletRecord) -> Result<()> {
        self.ensure_built()?;
        let entry = IndexedWallet::from_record(record);
        let embedding = self.embedder.embed(&entry.description)?;
        let address = entry.address.clone();

        match self.positions.get(&address) {
            Some(&position) => {
                self.index.set(position, &embedding)?;
                self.entries[position] = entry;
            }
            None => {
                let position = self.index.add(&embedding)?;
                self.positions.insert(address.clone(), position);
                self.entries.push(entry);
            }
        }

        debug!(address = %address, label = %record.label, "Upserted wallet");
        Ok(())
    }

    /// Remove a wallet; returns whether it was indexed
    pub fn remove_wallet(&mut self, address: &str) -> Result<bool> {
        self.ensure_built()?;
        let Some(position) = self.positions.remove(&normalize_address(address)) else {
            return Ok(false);
        };

        self.index.swap_remove(position)?;
        self.entries.swap_remove(position);
        if let Some(moved) = self.entries.get(position) {
            self.positions.insert(moved.address.clone(), position);
        }

        debug!(address = %address, "Removed wallet from index");
        Ok(true)
    }

    /// Distinct labels of indexed wallets, sorted
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.entries.iter().map(|e| e.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Persist descriptions and vectors
    pub fn save_index<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.ensure_built()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            embedder: self.embedder.name().to_string(),
            dataset_digest: self.dataset_digest.clone(),
            entries: self.entries.clone(),
            index: self.index.clone(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;

        info!(path = %path.display(), wallets = self.entries.len(), "Saved similarity index");
        Ok(())
    }

    /// Load a snapshot written by [`save_index`] with the same embedder setup
    ///
    /// [`save_index`]: WalletSimilarity::save_index
    pub fn load_index<P: AsRef<Path>>(path: P, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let snapshot: IndexSnapshot = bincode::deserialize_from(reader)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Index(format!(
                "snapshot version {} is not supported (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        if snapshot.embedder != embedder.name() || snapshot.index.dimensions() != embedder.dimensions() {
            return Err(Error::Index(format!(
                "snapshot built with {} ({} dims), configured embedder is {} ({} dims)",
                snapshot.embedder,
                snapshot.index.dimensions(),
                embedder.name(),
                embedder.dimensions()
            )));
        }
        if snapshot.entries.len() != snapshot.index.len() {
            return Err(Error::Index(format!(
                "snapshot has {} wallets but {} vectors",
                snapshot.entries.len(),
                snapshot.index.len()
            )));
        }

        let positions = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (normalize_address(&e.address), i))
            .collect();

        info!(path = %path.display(), wallets = snapshot.entries.len(), "Loaded similarity index");

        Ok(Self {
            embedder,
            entries: snapshot.entries,
            positions,
            index: snapshot.index,
            dataset_digest: snapshot.dataset_digest,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::similarity::embedding::HashingEmbedder;
    use tempfile::tempdir;

    pub(crate) const HUNTER_A: &str = "0xaaaa000000000000000000000000000000000001";
    pub(crate) const HUNTER_B: &str = "0xaaaa000000000000000000000000000000000002";
    pub(crate) const COLLECTOR: &str = "0xbbbb000000000000000000000000000000000003";

    fn claims(n: i64, value: f64) -> Vec<WalletTransaction> {
        (0..n)
            .map(|i| WalletTransaction::new(i * 60, value, "claim").with_to(format!("0xc{}", i)))
            .collect()
    }

    fn mints(n: i64) -> Vec<WalletTransaction> {
        (0..n)
            .map(|i| WalletTransaction::new(i * 3600, 0.08, "mint").with_to("0xopensea"))
            .collect()
    }

    pub(crate) fn sample_dataset() -> Dataset {
        Dataset::from_records(vec![
            WalletRecord::new(HUNTER_A, "drop_hunter", claims(30, 0.001)),
            WalletRecord::new(HUNTER_B, "drop_hunter", claims(30, 0.001)),
            WalletRecord::new(COLLECTOR, "nft_collector", mints(5)),
        ])
    }

    pub(crate) fn built_engine() -> WalletSimilarity {
        let mut engine =
            WalletSimilarity::from_dataset(&sample_dataset(), Arc::new(HashingEmbedder::new(64)));
        engine.build_index().unwrap();
        engine
    }

    #[test]
    fn test_requires_build() {
        let engine =
            WalletSimilarity::from_dataset(&sample_dataset(), Arc::new(HashingEmbedder::new(64)));
        assert_eq!(engine.len(), 3);
        assert!(!engine.is_built());
        assert!(engine.find_similar_wallets(HUNTER_A, 1).is_err());
    }

    #[test]
    fn test_find_similar_excludes_self() {
        let engine = built_engine();
        let similar = engine.find_similar_wallets(HUNTER_A, 1).unwrap();

        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].address, HUNTER_B);
        assert_eq!(similar[0].label, "drop_hunter");
        assert_eq!(similar[0].transaction_count, 30);
        assert!(similar[0].distance < 1e-6);

        let all = engine.find_similar_wallets(HUNTER_A, 10).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|w| w.address != HUNTER_A));
    }

    #[test]
    fn test_lookups_ignore_address_case() {
        let engine = built_engine();
        let shouted = HUNTER_A.to_uppercase().replacen("0X", "0x", 1);

        assert!(engine.contains(&shouted));
        assert_eq!(engine.get(&shouted).unwrap().address, HUNTER_A);

        let similar = engine.find_similar_wallets(&shouted, 5).unwrap();
        assert_eq!(similar[0].address, HUNTER_B);
        assert!(similar.iter().all(|w| w.address != HUNTER_A));

        // History queries still exclude the wallet itself
        let similar = engine.find_similar_to_history(&shouted, &claims(30, 0.001), 5).unwrap();
        assert!(similar.iter().all(|w| w.address != HUNTER_A));
    }

    #[test]
    fn test_unknown_address_is_empty() {
        let engine = built_engine();
        assert!(engine
            .find_similar_wallets("0xffff000000000000000000000000000000000000", 3)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_find_similar_to_history() {
        let engine = built_engine();
        let similar = engine
            .find_similar_to_history("0xdddd000000000000000000000000000000000004", &mints(5), 1)
            .unwrap();
        assert_eq!(similar[0].address, COLLECTOR);

        // The wallet itself is excluded even when queried by history
        let similar = engine.find_similar_to_history(COLLECTOR, &mints(5), 3).unwrap();
        assert!(similar.iter().all(|w| w.address != COLLECTOR));
        assert_eq!(similar.len(), 2);
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut engine = built_engine();

        let newcomer = "0xeeee000000000000000000000000000000000005";
        engine
            .upsert_wallet(&WalletRecord::new(newcomer, "nft_collector", mints(5)))
            .unwrap();
        assert_eq!(engine.len(), 4);
        assert!(engine.is_built());
        assert_eq!(engine.find_similar_wallets(COLLECTOR, 1).unwrap()[0].address, newcomer);

        // Relabel in place
        engine
            .upsert_wallet(&WalletRecord::new(newcomer, "regular_user", mints(5)))
            .unwrap();
        assert_eq!(engine.len(), 4);
        assert_eq!(engine.get(newcomer).unwrap().label, "regular_user");

        assert!(engine.remove_wallet(HUNTER_A).unwrap());
        assert!(!engine.remove_wallet(HUNTER_A).unwrap());
        assert_eq!(engine.len(), 3);
        assert!(engine.is_built());
        // The wallet moved into the freed slot is still addressable
        assert_eq!(engine.get(newcomer).unwrap().address, newcomer);
        assert_eq!(engine.find_similar_wallets(COLLECTOR, 1).unwrap()[0].address, newcomer);
        assert!(engine.find_similar_wallets(HUNTER_B, 1).unwrap()[0].address != HUNTER_A);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("index.bin");
        let engine = built_engine();
        engine.save_index(&path).unwrap();

        let loaded = WalletSimilarity::load_index(&path, Arc::new(HashingEmbedder::new(64))).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.labels(), vec!["drop_hunter", "nft_collector"]);
        assert_eq!(
            loaded.find_similar_wallets(HUNTER_A, 1).unwrap(),
            engine.find_similar_wallets(HUNTER_A, 1).unwrap()
        );

        let mismatch = WalletSimilarity::load_index(&path, Arc::new(HashingEmbedder::new(32)));
        assert!(matches!(mismatch, Err(Error::Index(_))));
    }

    #[test]
    fn test_snapshot_keeps_dataset_digest() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("data.csv");
        std::fs::write(
            &csv,
            "address,label,timestamp,value\n0xaaaa000000000000000000000000000000000001,drop_hunter,1,0.1\n",
        )
        .unwrap();
        let dataset = Dataset::load(&csv).unwrap();

        let mut engine = WalletSimilarity::from_dataset(&dataset, Arc::new(HashingEmbedder::new(16)));
        engine.build_index().unwrap();
        assert_eq!(engine.dataset_digest(), dataset.digest());

        let path = dir.path().join("index.bin");
        engine.save_index(&path).unwrap();
        let loaded = WalletSimilarity::load_index(&path, Arc::new(HashingEmbedder::new(16))).unwrap();
        assert_eq!(loaded.dataset_digest(), dataset.digest());
        assert!(built_engine().dataset_digest().is_none());
    }
}
