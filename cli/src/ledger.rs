//! Local ledger: the chain and harness side of the protocol
//!
//! The core keeps nothing between calls. This ledger plays everything around
//! it: it persists `(positions_root, liquidity)`, keeps the position records
//! and the full tree needed to produce witnesses, and writes a transcript of
//! every accepted or rejected invocation.
//!
//! Writes are optimistic: the file carries a version counter and a save whose
//! loaded version no longer matches the file is rejected as `StaleState`.

use chrono::{DateTime, Utc};
use log::{debug, info};
use perp_core::store::empty_root;
use perp_core::{
    Amount, CloseOutcome, Commitment, MerkleMap, OpenOrder, Owner, PerpError, PerpState, Perpetual,
    PositionRecord, SlotDerivation, SlotKey, SparsePathStore, EMPTY_SLOT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{format_owner, parse_owner};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transition rejected: {0}")]
    Rejected(PerpError),

    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger file is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ledger not initialized (run `perp init`)")]
    NotInitialized,

    #[error("ledger already initialized (pass --force to re-initialize)")]
    AlreadyInitialized,

    #[error("no open position at slot {0}")]
    UnknownPosition(String),

    #[error("ledger changed on disk: loaded version {expected}, found {found}")]
    StaleState { expected: u64, found: u64 },

    #[error("invalid {what}: {value}")]
    Parse { what: &'static str, value: String },
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// One harness invocation, accepted or rejected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub at: DateTime<Utc>,
    pub method: String,
    pub caller: Option<String>,
    pub accepted: bool,
    pub detail: String,
}

/// Position record as persisted next to its slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPosition {
    pub slot: String,
    pub owner: String,
    pub collateral: Amount,
    pub size: Amount,
    pub entry_price: Amount,
    pub is_long: bool,
    pub nonce: u64,
}

impl StoredPosition {
    fn from_record(slot: &SlotKey, record: &PositionRecord, nonce: u64) -> Self {
        StoredPosition {
            slot: format_slot(slot),
            owner: format_owner(&record.owner),
            collateral: record.collateral,
            size: record.size,
            entry_price: record.entry_price,
            is_long: record.is_long,
            nonce,
        }
    }

    /// Record as committed in the tree (always open: closed ones are dropped)
    pub fn record(&self) -> LedgerResult<PositionRecord> {
        let owner = parse_owner(&self.owner).map_err(|_| LedgerError::Parse {
            what: "owner",
            value: self.owner.clone(),
        })?;
        Ok(PositionRecord::open(owner, self.collateral, self.size, self.entry_price, self.is_long))
    }
}

/// On-disk layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerFile {
    version: u64,
    initialized: bool,
    positions_root: String,
    liquidity: Amount,
    positions: Vec<StoredPosition>,
    nonces: BTreeMap<String, u64>,
    transcript: Vec<TranscriptEntry>,
}

/// What a successful open committed
#[derive(Debug, Clone)]
pub struct OpenReceipt {
    pub slot: SlotKey,
    pub nonce: u64,
    pub position: PositionRecord,
    pub state: PerpState,
}

/// Result of a consistency audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub stored_root: Commitment,
    pub rebuilt_root: Commitment,
    pub positions: usize,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.stored_root == self.rebuilt_root
    }
}

pub struct Ledger {
    path: PathBuf,
    version: u64,
    initialized: bool,
    state: PerpState,
    tree: MerkleMap,
    positions: BTreeMap<SlotKey, StoredPosition>,
    nonces: BTreeMap<Owner, u64>,
    transcript: Vec<TranscriptEntry>,
    max_transcript: usize,
    machine: Perpetual<SparsePathStore>,
}

impl Ledger {
    /// Open the ledger at `path`, or an empty uninitialized one if absent
    pub fn load(path: &Path, max_transcript: usize) -> LedgerResult<Self> {
        let file = if path.exists() {
            let data = fs::read_to_string(path)?;
            serde_json::from_str::<LedgerFile>(&data)?
        } else {
            LedgerFile::default()
        };

        let positions_root = if file.positions_root.is_empty() {
            EMPTY_SLOT
        } else {
            parse_commitment(&file.positions_root)?
        };

        let mut tree = MerkleMap::new();
        let mut positions = BTreeMap::new();
        for stored in file.positions {
            let slot = parse_slot(&stored.slot)?;
            tree.set(slot, stored.record()?.commitment());
            positions.insert(slot, stored);
        }

        let mut nonces = BTreeMap::new();
        for (owner, nonce) in file.nonces {
            let owner = parse_owner(&owner).map_err(|_| LedgerError::Parse { what: "owner", value: owner })?;
            nonces.insert(owner, nonce);
        }

        debug!("loaded ledger {} (version {}, {} positions)", path.display(), file.version, positions.len());

        Ok(Ledger {
            path: path.to_path_buf(),
            version: file.version,
            initialized: file.initialized,
            state: PerpState::new(positions_root, file.liquidity),
            tree,
            positions,
            nonces,
            transcript: file.transcript,
            max_transcript,
            machine: Perpetual::new(SparsePathStore),
        })
    }

    /// Persist, refusing if someone else saved since `load`
    pub fn save(&mut self) -> LedgerResult<()> {
        if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            let on_disk: LedgerFile = serde_json::from_str(&data)?;
            if on_disk.version != self.version {
                return Err(LedgerError::StaleState {
                    expected: self.version,
                    found: on_disk.version,
                });
            }
        }

        let excess = self.transcript.len().saturating_sub(self.max_transcript);
        self.transcript.drain(..excess);

        let file = LedgerFile {
            version: self.version + 1,
            initialized: self.initialized,
            positions_root: self.state.positions_root.to_string(),
            liquidity: self.state.liquidity(),
            positions: self.positions.values().cloned().collect(),
            nonces: self
                .nonces
                .iter()
                .map(|(owner, nonce)| (format_owner(owner), *nonce))
                .collect(),
            transcript: self.transcript.clone(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        fs::rename(&tmp, &self.path)?;

        self.version = file.version;
        debug!("saved ledger {} (version {})", self.path.display(), self.version);
        Ok(())
    }

    pub fn state(&self) -> PerpState {
        self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn position(&self, slot: &SlotKey) -> Option<&StoredPosition> {
        self.positions.get(slot)
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Next nonce `owner` would open with
    pub fn next_nonce(&self, owner: &Owner) -> u64 {
        self.nonces.get(owner).copied().unwrap_or(0)
    }

    /// System initialization plus `init_state`
    ///
    /// Starts the pool at zero and points the root at `initial_root`
    /// (the empty-tree root by default). Re-initializing needs `force`.
    pub fn init(&mut self, initial_root: Option<Commitment>, force: bool) -> LedgerResult<PerpState> {
        if self.initialized && !force {
            return Err(LedgerError::AlreadyInitialized);
        }
        let root = initial_root.unwrap_or_else(empty_root);

        self.state = self.machine.init_state(PerpState::genesis(), root);
        self.tree = MerkleMap::new();
        self.positions.clear();
        self.nonces.clear();
        self.initialized = true;

        self.record("init_state", None, true, format!("root {}", root));
        info!("initialized ledger with root {}", root);
        Ok(self.state)
    }

    /// Deposits are anonymous; `caller` only labels the transcript entry
    pub fn deposit(&mut self, caller: Option<Owner>, amount: Amount) -> LedgerResult<PerpState> {
        self.require_initialized()?;
        match self.machine.deposit(self.state, amount) {
            Ok(next) => {
                self.state = next;
                self.record("deposit", caller.as_ref(), true, format!("amount {}", amount));
                Ok(next)
            }
            Err(e) => Err(self.reject("deposit", caller.as_ref(), e, format!("amount {}", amount))),
        }
    }

    /// Open a position in the slot `slots` derives for the caller's next nonce
    pub fn open(&mut self, caller: Owner, order: OpenOrder, slots: &dyn SlotDerivation) -> LedgerResult<OpenReceipt> {
        self.require_initialized()?;
        let nonce = self.next_nonce(&caller);
        let slot = slots.derive(&caller, nonce);
        let witness = self.tree.witness(&slot);
        let detail = format!(
            "slot {} amount {} size {} price {} {}",
            format_slot(&slot),
            order.amount,
            order.size,
            order.price,
            side_label(order.is_long)
        );

        let outcome = match self.machine.open_position(self.state, caller, order, &witness) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.reject("open_position", Some(&caller), e, detail)),
        };

        self.tree.set(slot, outcome.position.commitment());
        self.positions
            .insert(slot, StoredPosition::from_record(&slot, &outcome.position, nonce));
        self.nonces.insert(caller, nonce + 1);
        self.state = outcome.state;
        self.record("open_position", Some(&caller), true, detail);

        Ok(OpenReceipt {
            slot,
            nonce,
            position: outcome.position,
            state: outcome.state,
        })
    }

    /// Close the position stored at `slot`
    pub fn close(&mut self, caller: Owner, slot: SlotKey, close_price: Amount) -> LedgerResult<CloseOutcome> {
        self.require_initialized()?;
        let stored = self
            .positions
            .get(&slot)
            .ok_or_else(|| LedgerError::UnknownPosition(format_slot(&slot)))?;
        let record = stored.record()?;
        let witness = self.tree.witness(&slot);
        let detail = format!("slot {} close price {}", format_slot(&slot), close_price);

        let outcome = match self.machine.close_position(self.state, caller, &record, close_price, &witness) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.reject("close_position", Some(&caller), e, detail)),
        };

        self.tree.set(slot, EMPTY_SLOT);
        self.positions.remove(&slot);
        self.state = outcome.state;
        self.record(
            "close_position",
            Some(&caller),
            true,
            format!("{} payout {}", detail, outcome.payout),
        );
        Ok(outcome)
    }

    /// Rebuild the tree from stored records and compare with the stored root
    pub fn verify(&self) -> LedgerResult<VerifyReport> {
        let mut rebuilt = MerkleMap::new();
        for (slot, stored) in self.positions.iter() {
            rebuilt.set(*slot, stored.record()?.commitment());
        }
        Ok(VerifyReport {
            stored_root: self.state.positions_root,
            rebuilt_root: rebuilt.root(),
            positions: self.positions.len(),
        })
    }

    fn require_initialized(&self) -> LedgerResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(LedgerError::NotInitialized)
        }
    }

    fn record(&mut self, method: &str, caller: Option<&Owner>, accepted: bool, detail: String) {
        self.transcript.push(TranscriptEntry {
            at: Utc::now(),
            method: method.to_string(),
            caller: caller.map(format_owner),
            accepted,
            detail,
        });
    }

    fn reject(&mut self, method: &str, caller: Option<&Owner>, err: PerpError, detail: String) -> LedgerError {
        self.record(method, caller, false, format!("{} ({})", detail, err));
        LedgerError::Rejected(err)
    }
}

pub fn side_label(is_long: bool) -> &'static str {
    if is_long {
        "long"
    } else {
        "short"
    }
}

pub fn format_slot(slot: &SlotKey) -> String {
    hex::encode(slot.0)
}

pub fn parse_slot(s: &str) -> LedgerResult<SlotKey> {
    parse_bytes32(s, "slot").map(SlotKey::from_bytes)
}

pub fn parse_commitment(s: &str) -> LedgerResult<Commitment> {
    parse_bytes32(s, "commitment").map(Commitment::from_bytes)
}

fn parse_bytes32(s: &str, what: &'static str) -> LedgerResult<[u8; 32]> {
    let invalid = || LedgerError::Parse {
        what,
        value: s.to_string(),
    };
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}
