//! Storage collaborator contract and two reference implementations.
//!
//! The engine never assumes it knows durable identifiers: a store assigns
//! product ids, de-duplicates products by URL and reviews by their content
//! hash. Re-inserting an existing review is a no-op, not an update.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::records::{ProductRecord, ReviewRecord};
use crate::result::ScrapeMethod;
use crate::StoreError;

/// Audit record for one scrape invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSession {
    pub url: String,
    pub method: ScrapeMethod,
    pub success: bool,
    pub error: Option<String>,
    pub reviews_extracted: usize,
    pub new_reviews_saved: usize,
    pub duration_secs: f64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: Uuid,
    pub record: ProductRecord,
    pub first_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredReview {
    product_id: Uuid,
    record: ReviewRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredSession {
    id: Uuid,
    session: ScrapeSession,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub products: usize,
    pub reviews: usize,
    pub sessions: usize,
    pub successful_sessions: usize,
    pub verified_reviews: usize,
    pub average_rating: Option<f64>,
}

pub trait ScrapeStore {
    /// Inserts or updates the product keyed by its URL and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing medium cannot be written.
    fn save_product(&mut self, product: &ProductRecord) -> Result<Uuid, StoreError>;

    /// Inserts reviews not already present and returns how many were new.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownProduct` for an unsaved `product_id`, or an
    /// I/O error from the backing medium.
    fn save_reviews(&mut self, product_id: Uuid, reviews: &[ReviewRecord])
        -> Result<usize, StoreError>;

    /// Appends a session audit record and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing medium cannot be written.
    fn record_session(&mut self, session: ScrapeSession) -> Result<Uuid, StoreError>;

    fn product_by_url(&self, url: &str) -> Option<StoredProduct>;

    fn reviews_for_product(&self, product_id: Uuid) -> Vec<ReviewRecord>;

    fn summary(&self) -> StoreSummary;
}

/// Process-local store. Also the in-memory image behind [`JsonFileStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    products: BTreeMap<String, StoredProduct>,
    reviews: BTreeMap<String, StoredReview>,
    sessions: Vec<StoredSession>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScrapeStore for MemoryStore {
    fn save_product(&mut self, product: &ProductRecord) -> Result<Uuid, StoreError> {
        if let Some(existing) = self.products.get_mut(&product.url) {
            merge_product(&mut existing.record, product);
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        self.products.insert(
            product.url.clone(),
            StoredProduct {
                id,
                record: product.clone(),
                first_seen: product.scraped_at,
            },
        );
        Ok(id)
    }

    fn save_reviews(
        &mut self,
        product_id: Uuid,
        reviews: &[ReviewRecord],
    ) -> Result<usize, StoreError> {
        if !self.products.values().any(|p| p.id == product_id) {
            return Err(StoreError::UnknownProduct(product_id));
        }
        let mut inserted = 0;
        for review in reviews {
            if self.reviews.contains_key(&review.review_id) {
                tracing::debug!(review_id = %review.review_id, "review already stored; skipping");
                continue;
            }
            self.reviews.insert(
                review.review_id.clone(),
                StoredReview {
                    product_id,
                    record: review.clone(),
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    fn record_session(&mut self, session: ScrapeSession) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.sessions.push(StoredSession { id, session });
        Ok(id)
    }

    fn product_by_url(&self, url: &str) -> Option<StoredProduct> {
        self.products.get(url).cloned()
    }

    fn reviews_for_product(&self, product_id: Uuid) -> Vec<ReviewRecord> {
        self.reviews
            .values()
            .filter(|r| r.product_id == product_id)
            .map(|r| r.record.clone())
            .collect()
    }

    fn summary(&self) -> StoreSummary {
        let ratings: Vec<f64> = self
            .reviews
            .values()
            .filter_map(|r| r.record.rating)
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };
        StoreSummary {
            products: self.products.len(),
            reviews: self.reviews.len(),
            sessions: self.sessions.len(),
            successful_sessions: self.sessions.iter().filter(|s| s.session.success).count(),
            verified_reviews: self
                .reviews
                .values()
                .filter(|r| r.record.verified_purchase)
                .count(),
            average_rating,
        }
    }
}

/// A newer scrape refreshes fields it found; fields it missed keep their
/// previously stored values.
fn merge_product(existing: &mut ProductRecord, incoming: &ProductRecord) {
    fn take<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
        if incoming.is_some() {
            slot.clone_from(incoming);
        }
    }
    take(&mut existing.title, &incoming.title);
    take(&mut existing.brand, &incoming.brand);
    take(&mut existing.price, &incoming.price);
    take(&mut existing.rating, &incoming.rating);
    take(&mut existing.review_count, &incoming.review_count);
    take(&mut existing.description, &incoming.description);
    existing.scraped_at = incoming.scraped_at;
}

/// A [`MemoryStore`] persisted as a JSON snapshot after every write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Opens the snapshot at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file exists but cannot be read, and
    /// `StoreError::Corrupt` if it is not a valid snapshot.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let inner = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(e) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        Ok(Self { path, inner })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the snapshot via a sibling temp file and an atomic rename.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` on any filesystem failure.
    pub fn flush(&self) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(&self.inner).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            source: std::io::Error::other(e),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl ScrapeStore for JsonFileStore {
    fn save_product(&mut self, product: &ProductRecord) -> Result<Uuid, StoreError> {
        let id = self.inner.save_product(product)?;
        self.flush()?;
        Ok(id)
    }

    fn save_reviews(
        &mut self,
        product_id: Uuid,
        reviews: &[ReviewRecord],
    ) -> Result<usize, StoreError> {
        let inserted = self.inner.save_reviews(product_id, reviews)?;
        if inserted > 0 {
            self.flush()?;
        }
        Ok(inserted)
    }

    fn record_session(&mut self, session: ScrapeSession) -> Result<Uuid, StoreError> {
        let id = self.inner.record_session(session)?;
        self.flush()?;
        Ok(id)
    }

    fn product_by_url(&self, url: &str) -> Option<StoredProduct> {
        self.inner.product_by_url(url)
    }

    fn reviews_for_product(&self, product_id: Uuid) -> Vec<ReviewRecord> {
        self.inner.reviews_for_product(product_id)
    }

    fn summary(&self) -> StoreSummary {
        self.inner.summary()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
