//! Harness configuration and identity management

use anyhow::{Context, Result};
use perp_core::Owner;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "perp.toml";

/// How the harness picks a tree slot for a new position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotPolicy {
    /// `sha256(tag || owner || nonce)` with a per-owner nonce
    OwnerNonce,
    /// Slot passed explicitly with `--slot`
    Caller,
}

/// Contents of `perp.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub ledger_path: String,
    pub identity_path: String,
    pub slot_derivation: SlotPolicy,
    pub max_transcript_entries: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            ledger_path: "~/.config/perp/ledger.json".to_string(),
            identity_path: "~/.config/perp/id.json".to_string(),
            slot_derivation: SlotPolicy::OwnerNonce,
            max_transcript_entries: 1000,
        }
    }
}

/// Resolved harness configuration
pub struct HarnessConfig {
    pub ledger_path: PathBuf,
    pub identity_path: PathBuf,
    pub slot_policy: SlotPolicy,
    pub max_transcript_entries: usize,
}

impl HarnessConfig {
    /// Load `config_path` (if present) and apply CLI overrides
    ///
    /// A missing default config file is not an error; a missing explicit one is.
    pub fn new(
        config_path: Option<PathBuf>,
        ledger_path: Option<PathBuf>,
        identity_path: Option<PathBuf>,
    ) -> Result<Self> {
        let file = match config_path {
            Some(path) => load_file_config(&path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    load_file_config(path)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let ledger_path = match ledger_path {
            Some(p) => p,
            None => expand_path(&file.ledger_path)?,
        };
        let identity_path = match identity_path {
            Some(p) => p,
            None => expand_path(&file.identity_path)?,
        };

        Ok(Self {
            ledger_path,
            identity_path,
            slot_policy: file.slot_derivation,
            max_transcript_entries: file.max_transcript_entries,
        })
    }

    /// Identity of the caller, loaded from `identity_path`
    pub fn identity(&self) -> Result<Owner> {
        load_identity(&self.identity_path)
    }

    /// Identity if one has been created; operations without an owner run without it
    pub fn optional_identity(&self) -> Result<Option<Owner>> {
        if !self.identity_path.exists() {
            return Ok(None);
        }
        load_identity(&self.identity_path).map(Some)
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&data).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("Failed to expand path: {}", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Load an identity from a JSON file of 32 bytes
pub fn load_identity(path: &Path) -> Result<Owner> {
    if !path.exists() {
        anyhow::bail!(
            "Identity file not found: {}\n\
             Create one with: perp keygen --out {}",
            path.display(),
            path.display()
        );
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read identity file: {}", path.display()))?;

    let bytes: Vec<u8> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse identity JSON: {}", path.display()))?;

    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow::anyhow!("Identity must be 32 bytes, found {} in {}", v.len(), path.display()))?;

    Ok(Owner::from_bytes(bytes))
}

/// Write a fresh identity file
///
/// Local test identities only: real principals come from the wallet layer.
pub fn generate_identity(path: &Path, force: bool) -> Result<Owner> {
    if path.exists() && !force {
        anyhow::bail!("Identity file already exists: {} (pass --force to overwrite)", path.display());
    }

    let mut hasher = Sha256::new();
    hasher.update(chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hasher.update(std::process::id().to_be_bytes());
    hasher.update(path.display().to_string().as_bytes());
    let owner = Owner::from_bytes(hasher.finalize().into());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string(&owner.as_bytes().to_vec())?;
    fs::write(path, json).with_context(|| format!("Failed to write identity file: {}", path.display()))?;

    Ok(owner)
}

/// Base58 rendering of an identity
pub fn format_owner(owner: &Owner) -> String {
    bs58::encode(owner.as_bytes()).into_string()
}

/// Parse a base58 identity
pub fn parse_owner(s: &str) -> Result<Owner> {
    let bytes = bs58::decode(s)
        .into_vec()
        .with_context(|| format!("Invalid base58 identity: {}", s))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("Identity must decode to 32 bytes: {}", s))?;
    Ok(Owner::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_defaults_fill_missing_keys() {
        let cfg: FileConfig = toml::from_str("slot_derivation = \"caller\"").unwrap();
        assert_eq!(cfg.slot_derivation, SlotPolicy::Caller);
        assert_eq!(cfg.max_transcript_entries, 1000);
    }

    #[test]
    fn test_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("perp.toml");
        fs::write(&cfg_path, "ledger_path = \"/nowhere/ledger.json\"\nmax_transcript_entries = 5\n").unwrap();

        let ledger = dir.path().join("ledger.json");
        let cfg = HarnessConfig::new(Some(cfg_path), Some(ledger.clone()), None).unwrap();
        assert_eq!(cfg.ledger_path, ledger);
        assert_eq!(cfg.max_transcript_entries, 5);
        assert_eq!(cfg.slot_policy, SlotPolicy::OwnerNonce);
    }

    #[test]
    fn test_identity_roundtrip_and_base58() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/id.json");
        let owner = generate_identity(&path, false).unwrap();
        assert_eq!(load_identity(&path).unwrap(), owner);
        assert_eq!(parse_owner(&format_owner(&owner)).unwrap(), owner);

        // Refuses to clobber without --force
        assert!(generate_identity(&path, false).is_err());
        assert!(generate_identity(&path, true).is_ok());
    }

    #[test]
    fn test_optional_identity_absent_then_present() {
        let dir = tempfile::tempdir().unwrap();
        let id_path = dir.path().join("id.json");
        let cfg = HarnessConfig::new(None, Some(dir.path().join("ledger.json")), Some(id_path.clone())).unwrap();
        assert_eq!(cfg.optional_identity().unwrap(), None);
        assert!(cfg.identity().is_err());

        let owner = generate_identity(&id_path, false).unwrap();
        assert_eq!(cfg.optional_identity().unwrap(), Some(owner));
    }

    #[test]
    fn test_short_identity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");
        fs::write(&path, "[1,2,3]").unwrap();
        let err = load_identity(&path).unwrap_err().to_string();
        assert!(err.contains("32 bytes"));
    }
}
