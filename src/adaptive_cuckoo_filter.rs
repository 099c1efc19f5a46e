//! Adaptive cuckoo filter with distinct-negative-query cardinality estimation.
//!
//! Four single-cell tables, one selector bit per cell. Flipping a cell's
//! selector on a reported false positive swaps the cell to the alternate
//! fingerprint hash, and the population of flipped selectors doubles as the
//! signal for estimating how many distinct absent items have been queried.

use log::debug;
use murmurhash3::murmurhash3_x64_128 as mmh3;
use rand::rngs::OsRng;
use rand::TryRngCore;
use thiserror::Error;

const NUM_TABLES: usize = 4;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("bucket count per table must be positive")]
    InvalidBucketCount,
    #[error("fingerprint bits must be in [4, 32], got {0}")]
    InvalidFingerprintBits(u32),
    #[error("max kicks must be positive")]
    InvalidMaxKicks,
    #[error("failed to draw hash seeds from the OS entropy source: {0}")]
    Entropy(#[from] rand::rand_core::OsError),
    #[error("selector-1 fraction {0:.4} has saturated the estimator; cardinality too large")]
    EstimatorSaturated(f64),
    #[error("selector-1 fraction {0:.4} is outside [0, 0.5); filter state is corrupt")]
    EstimatorInvariant(f64),
}

/// A fingerprint of 0 marks an empty slot; computed fingerprints of 0 are
/// stored as 1.
#[derive(Default, Clone, Copy)]
struct Cell {
    fingerprint: u32,
    selector: u8,
    occupied: bool,
    // Hash of the original inserted key. Displacement re-derives candidate
    // buckets from this tag once the key itself is gone, and adaptation
    // leaves it untouched.
    relocation_tag: u32,
}

pub struct AdaptiveCuckooFilter {
    tables: [Vec<Cell>; NUM_TABLES],
    num_buckets: usize,
    fingerprint_bits: u32,
    fingerprint_mask: u32,
    num_items: usize,
    max_kicks: usize,
    table_seeds: [u32; NUM_TABLES],
    fingerprint_seeds: [u32; 2],
    relocation_seed: u32,
}

fn hash(data: &[u8], seed: u32) -> u64 {
    mmh3(data, u64::from(seed)).0
}

fn draw_seed() -> Result<u32, FilterError> {
    let mut buf = [0u8; 4];
    OsRng.try_fill_bytes(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

impl AdaptiveCuckooFilter {
    /// Create a filter with `num_buckets` cells per table, `fingerprint_bits`
    /// wide fingerprints and at most `max_kicks` displacements per insert.
    /// The seven hash seeds are drawn fresh from the OS entropy source.
    pub fn new(
        num_buckets: usize,
        fingerprint_bits: u32,
        max_kicks: usize,
    ) -> Result<Self, FilterError> {
        if num_buckets == 0 {
            return Err(FilterError::InvalidBucketCount);
        }
        if !(4..=32).contains(&fingerprint_bits) {
            return Err(FilterError::InvalidFingerprintBits(fingerprint_bits));
        }
        if max_kicks == 0 {
            return Err(FilterError::InvalidMaxKicks);
        }

        let mut table_seeds = [0u32; NUM_TABLES];
        for seed in &mut table_seeds {
            *seed = draw_seed()?;
        }
        let mut fingerprint_seeds = [0u32; 2];
        for seed in &mut fingerprint_seeds {
            *seed = draw_seed()?;
        }
        let relocation_seed = draw_seed()?;

        Ok(AdaptiveCuckooFilter {
            tables: std::array::from_fn(|_| vec![Cell::default(); num_buckets]),
            num_buckets,
            fingerprint_bits,
            fingerprint_mask: ((1u64 << fingerprint_bits) - 1) as u32,
            num_items: 0,
            max_kicks,
            table_seeds,
            fingerprint_seeds,
            relocation_seed,
        })
    }

    fn fingerprint(&self, item: &[u8], selector: u8) -> u32 {
        let seed = self.fingerprint_seeds[usize::from(selector & 1)];
        let fp = (hash(item, seed) as u32) & self.fingerprint_mask;
        if fp == 0 {
            1
        } else {
            fp
        }
    }

    fn bucket_index(&self, item: &[u8], table: usize) -> usize {
        (hash(item, self.table_seeds[table]) % self.num_buckets as u64) as usize
    }

    // Candidate bucket for a displaced cell whose original key is no longer
    // in hand; hashes the tag with the same per-table seed.
    fn bucket_index_from_tag(&self, tag: u32, table: usize) -> usize {
        (hash(&tag.to_le_bytes(), self.table_seeds[table]) % self.num_buckets as u64) as usize
    }

    fn relocation_tag(&self, item: &[u8]) -> u32 {
        hash(item, self.relocation_seed) as u32
    }

    /// Insert an item. Returns false once `max_kicks` displacements fail to
    /// free a cell; evictions performed along the way are not rolled back,
    /// and the item count only moves on success.
    pub fn insert(&mut self, item: &[u8]) -> bool {
        let fp0 = self.fingerprint(item, 0);
        let tag = self.relocation_tag(item);

        let mut candidates = [0usize; NUM_TABLES];
        for (table, slot) in candidates.iter_mut().enumerate() {
            *slot = self.bucket_index(item, table);
        }

        for table in 0..NUM_TABLES {
            let cell = &mut self.tables[table][candidates[table]];
            if !cell.occupied {
                *cell = Cell {
                    fingerprint: fp0,
                    selector: 0,
                    occupied: true,
                    relocation_tag: tag,
                };
                self.num_items += 1;
                return true;
            }
        }

        // All four candidate cells taken: evict, then walk the victim chain,
        // carrying only (fingerprint, selector, tag) payloads.
        let mut current_fp = fp0;
        let mut current_selector = 0u8;
        let mut current_tag = tag;
        let mut kick_table = (hash(item, self.fingerprint_seeds[1]) % NUM_TABLES as u64) as usize;

        for kick in 0..self.max_kicks {
            let kick_idx = if kick == 0 {
                candidates[kick_table]
            } else {
                self.bucket_index_from_tag(current_tag, kick_table)
            };

            let victim = self.tables[kick_table][kick_idx];
            let cell = &mut self.tables[kick_table][kick_idx];
            cell.fingerprint = current_fp;
            cell.selector = current_selector;
            cell.relocation_tag = current_tag;

            current_fp = victim.fingerprint;
            current_selector = victim.selector;
            current_tag = victim.relocation_tag;

            // Offer the victim its candidate cell in each of the other three
            // tables, starting one past the table it was just evicted from.
            for offset in 1..NUM_TABLES {
                let next_table = (kick_table + offset) % NUM_TABLES;
                let next_idx = self.bucket_index_from_tag(current_tag, next_table);
                let cell = &mut self.tables[next_table][next_idx];
                if !cell.occupied {
                    *cell = Cell {
                        fingerprint: current_fp,
                        selector: current_selector,
                        occupied: true,
                        relocation_tag: current_tag,
                    };
                    self.num_items += 1;
                    return true;
                }
            }

            // Next victim table, chosen from the three we did not just
            // vacate, deterministically from the tag and the kick counter.
            let hop = (hash(&current_tag.to_le_bytes(), kick as u32) % (NUM_TABLES as u64 - 1))
                as usize;
            kick_table = (kick_table + 1 + hop) % NUM_TABLES;
        }

        debug!(
            "insert gave up after {} kicks, occupancy {:.3}",
            self.max_kicks,
            self.occupancy()
        );
        false
    }

    /// Approximate membership: true means possibly present, false means
    /// definitely absent (for items never displaced).
    pub fn lookup(&self, item: &[u8]) -> bool {
        for table in 0..NUM_TABLES {
            let cell = &self.tables[table][self.bucket_index(item, table)];
            if cell.occupied && cell.fingerprint == self.fingerprint(item, cell.selector) {
                return true;
            }
        }
        false
    }

    /// Remove an item. The stored relocation tag must also match, which keeps
    /// a fingerprint collision from deleting an unrelated occupant.
    pub fn delete(&mut self, item: &[u8]) -> bool {
        let tag = self.relocation_tag(item);
        for table in 0..NUM_TABLES {
            let idx = self.bucket_index(item, table);
            let cell = self.tables[table][idx];
            if !cell.occupied {
                continue;
            }
            if cell.fingerprint == self.fingerprint(item, cell.selector)
                && cell.relocation_tag == tag
            {
                self.tables[table][idx] = Cell::default();
                self.num_items -= 1;
                return true;
            }
        }
        false
    }

    /// Remove the false positive `queried` at the cell holding `actual`, the
    /// truly stored key the caller's oracle blames for the collision. Both
    /// claims are verified against the cell before its selector is flipped
    /// and its fingerprint rewritten under the other fingerprint seed.
    pub fn adapt(&mut self, queried: &[u8], actual: &[u8]) -> bool {
        if queried == actual {
            return false;
        }

        let tag = self.relocation_tag(actual);
        for table in 0..NUM_TABLES {
            let idx = self.bucket_index(actual, table);
            let cell = self.tables[table][idx];
            if !cell.occupied {
                continue;
            }
            if cell.fingerprint != self.fingerprint(actual, cell.selector)
                || cell.relocation_tag != tag
            {
                continue;
            }
            if cell.fingerprint != self.fingerprint(queried, cell.selector) {
                continue;
            }

            let new_selector = 1 - cell.selector;
            let new_fp = self.fingerprint(actual, new_selector);
            let slot = &mut self.tables[table][idx];
            slot.selector = new_selector;
            slot.fingerprint = new_fp;
            debug!(
                "adapted table {} bucket {}: selector {} -> {}",
                table, idx, cell.selector, new_selector
            );
            return true;
        }
        false
    }

    /// Fraction of cells occupied across all four tables, in [0, 1].
    pub fn occupancy(&self) -> f64 {
        self.num_items as f64 / (NUM_TABLES * self.num_buckets) as f64
    }

    pub fn len(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    /// Estimate the number of distinct absent items whose queries have
    /// adapted this filter, by inverting the selector-1 fraction:
    /// `-b * 2^(f-1) * ln(1 - 2*p1)`. Errs once `p1` reaches 0.5, where the
    /// selector distribution carries no usable signal.
    pub fn estimate_cardinality(&self) -> Result<f64, FilterError> {
        if self.num_items == 0 {
            return Ok(0.0);
        }

        let selector_ones = self
            .tables
            .iter()
            .flatten()
            .filter(|cell| cell.occupied && cell.selector == 1)
            .count();
        let p1 = selector_ones as f64 / self.num_items as f64;

        if p1 >= 0.5 {
            return Err(FilterError::EstimatorSaturated(p1));
        }
        if p1 < 0.0 {
            return Err(FilterError::EstimatorInvariant(p1));
        }
        let log_term = (1.0 - 2.0 * p1).ln();
        if !log_term.is_finite() {
            return Err(FilterError::EstimatorInvariant(p1));
        }

        let buckets = self.num_buckets as f64;
        let half_fingerprint_space = 2f64.powi(self.fingerprint_bits as i32 - 1);
        Ok(-buckets * half_fingerprint_space * log_term)
    }
}
