//! Time-ordered 64-bit oids for primary keys and the prefixed public ids
//! exposed on the wire.
//!
//! An oid packs, from the most significant bit down: 41 bits of milliseconds
//! since [`EPOCH_MS`], a 10-bit node (5 bits datacenter, 5 bits worker) and a
//! 12-bit per-millisecond sequence.

use std::cmp::Ordering;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::{Alphanumeric, DistString};
use thiserror::Error;

/// 2022-01-01T00:00:00Z in milliseconds.
pub const EPOCH_MS: u64 = 1_640_995_200_000;

const NODE_PART_BITS: u32 = 5;
const NODE_PART_LIMIT: u64 = 1 << NODE_PART_BITS;
const NODE_BITS: u32 = 2 * NODE_PART_BITS;
const SEQUENCE_BITS: u32 = 12;
const SEQUENCES_PER_MS: u16 = 1 << SEQUENCE_BITS;

const PUBLIC_ID_SUFFIX_LEN: usize = 20;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdError {
    #[error("worker id {0} out of range (0..=31)")]
    InvalidWorker(u64),
    #[error("datacenter id {0} out of range (0..=31)")]
    InvalidDatacenter(u64),
    #[error("system clock is before the id epoch")]
    ClockBeforeEpoch,
    #[error("clock moved backwards by {0}ms")]
    ClockMovedBackwards(u64),
    #[error("id generator lock poisoned")]
    Poisoned,
}

pub struct IdGenerator {
    node: u64,
    last_ms: u64,
    sequence: u16,
}

impl IdGenerator {
    pub fn new(worker_id: u64, datacenter_id: u64) -> Result<Self, IdError> {
        if worker_id >= NODE_PART_LIMIT {
            return Err(IdError::InvalidWorker(worker_id));
        }
        if datacenter_id >= NODE_PART_LIMIT {
            return Err(IdError::InvalidDatacenter(datacenter_id));
        }

        Ok(Self {
            node: (datacenter_id << NODE_PART_BITS) | worker_id,
            last_ms: 0,
            sequence: 0,
        })
    }

    pub fn next_id(&mut self) -> Result<i64, IdError> {
        let now = elapsed_ms()?;

        let (ms, sequence) = match now.cmp(&self.last_ms) {
            Ordering::Less => return Err(IdError::ClockMovedBackwards(self.last_ms - now)),
            Ordering::Greater => (now, 0),
            Ordering::Equal if self.sequence + 1 < SEQUENCES_PER_MS => (now, self.sequence + 1),
            Ordering::Equal => (wait_until_after(now)?, 0),
        };

        self.last_ms = ms;
        self.sequence = sequence;
        Ok(compose(ms, self.node, sequence))
    }
}

fn compose(ms: u64, node: u64, sequence: u16) -> i64 {
    ((ms << (NODE_BITS + SEQUENCE_BITS)) | (node << SEQUENCE_BITS) | u64::from(sequence)) as i64
}

/// Milliseconds since [`EPOCH_MS`].
fn elapsed_ms() -> Result<u64, IdError> {
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| IdError::ClockBeforeEpoch)?
        .as_millis() as u64;
    unix_ms
        .checked_sub(EPOCH_MS)
        .ok_or(IdError::ClockBeforeEpoch)
}

fn wait_until_after(ms: u64) -> Result<u64, IdError> {
    loop {
        let now = elapsed_ms()?;
        if now > ms {
            return Ok(now);
        }
        std::hint::spin_loop();
    }
}

/// Generator shared between request handlers.
pub struct SharedIdGenerator(Mutex<IdGenerator>);

impl SharedIdGenerator {
    pub fn new(worker_id: u64, datacenter_id: u64) -> Result<Self, IdError> {
        Ok(Self(Mutex::new(IdGenerator::new(worker_id, datacenter_id)?)))
    }

    pub fn next_id(&self) -> Result<i64, IdError> {
        self.0.lock().map_err(|_| IdError::Poisoned)?.next_id()
    }

    /// Allocates an oid together with its public id.
    pub fn next_pair(&self, prefix: &str) -> Result<(i64, String), IdError> {
        let oid = self.next_id()?;
        Ok((oid, public_id(prefix, oid)))
    }
}

/// `<prefix>_<hex oid><random alphanumerics>`.
pub fn public_id(prefix: &str, oid: i64) -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), PUBLIC_ID_SUFFIX_LEN);
    format!("{}_{:x}{}", prefix, oid, suffix)
}
