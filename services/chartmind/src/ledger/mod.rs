//! Feedback ledger - append-only outcome log with accuracy aggregates
//!
//! Entries are persisted as JSON lines. A single writer appends to the file
//! while an in-memory mirror answers aggregate queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::types::{EngineError, Market, Outcome, Result};

/// One reported outcome. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub signal_id: String,
    pub market: Market,
    pub pair: String,
    pub result: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEntry {
    /// Build an entry from user input, validating the result label
    pub fn new(
        signal_id: &str,
        market: Market,
        pair: &str,
        result: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let result = Outcome::parse(result)?;
        if signal_id.trim().is_empty() {
            return Err(EngineError::Validation("signal_id is required".to_string()));
        }
        Ok(Self {
            signal_id: signal_id.to_string(),
            market,
            pair: pair.to_string(),
            result,
            timestamp,
        })
    }

    pub fn group_key(&self) -> String {
        format!("{}|{}", self.market, self.pair)
    }
}

/// Optional filters for accuracy queries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccuracyFilter {
    pub signal_id: Option<String>,
    pub market: Option<Market>,
    pub pair: Option<String>,
}

impl AccuracyFilter {
    pub fn market_pair(market: Market, pair: &str) -> Self {
        Self {
            signal_id: None,
            market: Some(market),
            pair: Some(pair.to_string()),
        }
    }

    fn matches(&self, entry: &FeedbackEntry) -> bool {
        self.signal_id.as_ref().map_or(true, |id| *id == entry.signal_id)
            && self.market.map_or(true, |m| m == entry.market)
            && self.pair.as_ref().map_or(true, |p| *p == entry.pair)
    }
}

/// Win percentage, rounded to 2 decimals; 0.0 for an empty set
pub fn win_rate<'a>(entries: impl IntoIterator<Item = &'a FeedbackEntry>) -> f64 {
    let (wins, total) = entries.into_iter().fold((0usize, 0usize), |(w, t), e| {
        (w + usize::from(e.result.is_win()), t + 1)
    });
    if total == 0 {
        return 0.0;
    }
    (wins as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

/// Open log file plus whether its last line may be unterminated
struct LedgerWriter {
    file: File,
    needs_newline: bool,
}

pub struct FeedbackLedger {
    path: Option<PathBuf>,
    /// Serialises appends
    writer: Mutex<Option<LedgerWriter>>,
    entries: RwLock<Vec<FeedbackEntry>>,
}

impl FeedbackLedger {
    /// Ledger without file backing
    pub fn in_memory() -> Self {
        Self {
            path: None,
            writer: Mutex::new(None),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Open (or create) a JSON-lines ledger, loading existing entries
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::Persistence(format!("create {}: {}", parent.display(), e))
            })?;
        }

        let (entries, torn_tail) = match fs::read_to_string(&path).await {
            Ok(contents) => (
                parse_lines(&contents),
                !contents.is_empty() && !contents.ends_with('\n'),
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), false),
            Err(e) => {
                return Err(EngineError::Persistence(format!(
                    "read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| EngineError::Persistence(format!("open {}: {}", path.display(), e)))?;

        info!("Feedback ledger at {} ({} entries)", path.display(), entries.len());

        Ok(Self {
            path: Some(path),
            writer: Mutex::new(Some(LedgerWriter {
                file,
                // a partial last line is terminated by the next append
                needs_newline: torn_tail,
            })),
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist an entry, then expose it to queries
    pub async fn append(&self, entry: FeedbackEntry) -> Result<()> {
        let mut writer = self.writer.lock().await;

        if let Some(writer) = writer.as_mut() {
            let json = serde_json::to_string(&entry)
                .map_err(|e| EngineError::Persistence(e.to_string()))?;
            let mut line = String::with_capacity(json.len() + 2);
            if writer.needs_newline {
                line.push('\n');
            }
            line.push_str(&json);
            line.push('\n');

            if let Err(e) = write_line(&mut writer.file, &line).await {
                // a fragment may be left behind; fence it off on the next append
                writer.needs_newline = true;
                warn!("Ledger append failed for {}: {}", entry.signal_id, e);
                return Err(EngineError::Persistence(e.to_string()));
            }
            writer.needs_newline = false;
        }

        debug!("Ledger append: {} {} {:?}", entry.signal_id, entry.group_key(), entry.result);
        self.entries.write().await.push(entry);
        Ok(())
    }

    /// Swap the open log handle, keeping the newline state
    #[cfg(test)]
    pub(crate) async fn replace_file(&self, file: File) {
        if let Some(writer) = self.writer.lock().await.as_mut() {
            writer.file = file;
        }
    }

    /// Snapshot of every entry in append order
    pub async fn entries(&self) -> Vec<FeedbackEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn accuracy(&self, filter: &AccuracyFilter) -> f64 {
        let entries = self.entries.read().await;
        win_rate(entries.iter().filter(|e| filter.matches(e)))
    }

    /// Win rate per "market|pair" group
    pub async fn stats_by_market_pair(&self) -> BTreeMap<String, f64> {
        let entries = self.entries.read().await;
        let mut groups: BTreeMap<String, Vec<&FeedbackEntry>> = BTreeMap::new();
        for entry in entries.iter() {
            groups.entry(entry.group_key()).or_default().push(entry);
        }
        groups
            .into_iter()
            .map(|(key, group)| (key, win_rate(group)))
            .collect()
    }

    /// Entries for one market and pair
    pub async fn history(&self, market: Market, pair: &str) -> Vec<FeedbackEntry> {
        let filter = AccuracyFilter::market_pair(market, pair);
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }
}

async fn write_line(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

fn parse_lines(contents: &str) -> Vec<FeedbackEntry> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable ledger line {}: {}", idx + 1, e);
                None
            }
        })
        .collect()
}
