// src/transaction/journal.rs

//! Append-only switch journal for crash recovery
//!
//! Each record is a single line with a CRC32 checksum:
//!
//! Format: `{crc32_hex}|{json}\n`
//!
//! Step records are written before the step touches the disk, and as
//! barriers, so after a crash the journal always names every step that may
//! have happened.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{SwitchState, SwitchStep};

/// A record in the switch journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JournalRecord {
    /// Switch started
    Begin {
        tx_uuid: String,
        pack: String,
        root: PathBuf,
        timestamp: DateTime<Utc>,
    },

    /// About to move the live directory to the holding location
    Staged { live_existed: bool },

    /// About to assemble the pack and rename it into the live location
    Applied,

    /// Component materialized by the installer
    Installed { component: String },

    /// Component dropped from the active set (not in catalog)
    Dropped { component: String },

    /// About to move a disabled entry into the trash
    DisabledPruned { component: String },

    /// Entry deleted from the live directory
    LivePruned { component: String },

    /// Manifest written; point of no return
    Committed { components: usize },

    /// Switch complete
    Done { duration_ms: u64, success: bool },
}

impl JournalRecord {
    /// The engine phase this record belongs to
    pub fn to_state(&self) -> SwitchState {
        match self {
            Self::Begin { .. } => SwitchState::PreCheck,
            Self::Staged { .. } => SwitchState::Staging,
            Self::Applied => SwitchState::Applying,
            Self::Installed { .. } | Self::Dropped { .. } => SwitchState::Installing,
            Self::DisabledPruned { .. } | Self::LivePruned { .. } => SwitchState::Pruning,
            Self::Committed { .. } => SwitchState::Committing,
            Self::Done { .. } => SwitchState::Idle,
        }
    }

    /// Step with a compensation, if this record announces one
    pub fn to_step(&self) -> Option<SwitchStep> {
        match self {
            Self::Staged { live_existed } => Some(SwitchStep::LiveStaged {
                live_existed: *live_existed,
            }),
            Self::Applied => Some(SwitchStep::PackApplied),
            Self::DisabledPruned { component } => Some(SwitchStep::DisabledPruned {
                component: component.clone(),
            }),
            _ => None,
        }
    }

    /// Check if this is a phase barrier record
    pub fn is_barrier(&self) -> bool {
        matches!(
            self,
            Self::Begin { .. }
                | Self::Staged { .. }
                | Self::Applied
                | Self::DisabledPruned { .. }
                | Self::Committed { .. }
                | Self::Done { .. }
        )
    }
}

/// Append-only switch journal with fsync barriers
#[derive(Debug)]
pub struct SwitchJournal {
    path: PathBuf,
    file: File,
    tx_uuid: String,
    sequence: u64,
}

impl SwitchJournal {
    /// Create a new journal for a switch
    pub fn create(journal_dir: &Path, tx_uuid: &str) -> Result<Self> {
        fs::create_dir_all(journal_dir)?;

        let path = journal_dir.join(format!("tx-{}.journal", tx_uuid));
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            file,
            tx_uuid: tx_uuid.to_string(),
            sequence: 0,
        })
    }

    /// Open an existing journal for recovery
    pub fn open(path: PathBuf) -> Result<Self> {
        let tx_uuid = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("tx-"))
            .ok_or_else(|| Error::Journal(format!("invalid journal filename {}", path.display())))?
            .to_string();

        let sequence = {
            let file = File::open(&path)?;
            BufReader::new(file).lines().count() as u64
        };

        let file = OpenOptions::new().append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            tx_uuid,
            sequence,
        })
    }

    pub fn tx_uuid(&self) -> &str {
        &self.tx_uuid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written, including ones found on open
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Write a record to the journal (does NOT fsync)
    pub fn write(&mut self, record: &JournalRecord) -> Result<()> {
        self.sequence += 1;
        let json = serde_json::to_string(record)
            .map_err(|e| Error::Journal(format!("failed to serialize record: {}", e)))?;
        let crc = crc32fast::hash(json.as_bytes());
        writeln!(self.file, "{:08x}|{}", crc, json)?;
        Ok(())
    }

    /// Write a record and fsync
    pub fn write_barrier(&mut self, record: &JournalRecord) -> Result<()> {
        self.write(record)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Read all valid records; reading stops at the first corrupted line
    pub fn read_all(&self) -> Result<Vec<JournalRecord>> {
        read_records(&self.path)
    }

    /// Last phase barrier reached
    pub fn last_phase(&self) -> Result<SwitchState> {
        let records = self.read_all()?;
        Ok(records
            .iter()
            .rev()
            .find(|r| r.is_barrier())
            .map(JournalRecord::to_state)
            .unwrap_or(SwitchState::PreCheck))
    }

    /// Move the journal into `archive/` after a completed switch
    pub fn archive(self) -> Result<()> {
        let archive_dir = self
            .path
            .parent()
            .unwrap_or(Path::new("."))
            .join("archive");
        fs::create_dir_all(&archive_dir)?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| Error::Journal(format!("invalid journal path {}", self.path.display())))?;
        fs::rename(&self.path, archive_dir.join(file_name))?;
        Ok(())
    }

    /// Delete the journal (rolled-back switches)
    pub fn delete(self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<JournalRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.is_empty() {
            continue;
        }

        let Some((crc_hex, json)) = line.split_once('|') else {
            log::warn!("Malformed journal line {}: missing delimiter", line_num + 1);
            continue;
        };

        let expected_crc = u32::from_str_radix(crc_hex, 16).map_err(|_| {
            Error::Journal(format!("invalid CRC32 at line {}: {}", line_num + 1, crc_hex))
        })?;

        let actual_crc = crc32fast::hash(json.as_bytes());
        if expected_crc != actual_crc {
            log::warn!(
                "CRC mismatch at line {}: expected {:08x}, got {:08x}",
                line_num + 1,
                expected_crc,
                actual_crc
            );
            // A torn write can only be the tail
            break;
        }

        let record: JournalRecord = serde_json::from_str(json).map_err(|e| {
            Error::Journal(format!("failed to parse record at line {}: {}", line_num + 1, e))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Journals in `journal_dir` without a `Done` record
pub fn find_incomplete_journals(journal_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut journals = Vec::new();

    if !journal_dir.exists() {
        return Ok(journals);
    }

    for entry in fs::read_dir(journal_dir)? {
        let path = entry?.path();

        let is_journal = path.is_file()
            && path.extension().is_some_and(|e| e == "journal")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("tx-"));
        if !is_journal {
            continue;
        }

        // Unreadable journals count as incomplete so recovery reports them
        let done = read_records(&path)
            .map(|records| records.iter().any(|r| matches!(r, JournalRecord::Done { .. })))
            .unwrap_or(false);
        if !done {
            journals.push(path);
        }
    }

    journals.sort();
    Ok(journals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn begin(tx_uuid: &str) -> JournalRecord {
        JournalRecord::Begin {
            tx_uuid: tx_uuid.to_string(),
            pack: "survival".to_string(),
            root: PathBuf::from("/srv/packs"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_journal_create_and_write() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = SwitchJournal::create(temp_dir.path(), "uuid-1").unwrap();

        journal.write(&begin("uuid-1")).unwrap();
        journal
            .write_barrier(&JournalRecord::Staged { live_existed: true })
            .unwrap();
        journal
            .write(&JournalRecord::Installed {
                component: "maps".to_string(),
            })
            .unwrap();

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0], JournalRecord::Begin { .. }));
        assert_eq!(records[1], JournalRecord::Staged { live_existed: true });
        assert_eq!(journal.sequence(), 3);
    }

    #[test]
    fn test_journal_stops_at_corrupted_line() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = SwitchJournal::create(temp_dir.path(), "uuid-crc").unwrap();
        journal.write_barrier(&begin("uuid-crc")).unwrap();
        journal.write_barrier(&JournalRecord::Applied).unwrap();

        // Flip the payload of the second line without fixing its checksum
        let content = fs::read_to_string(journal.path()).unwrap();
        let tampered = content.replacen("\"Applied\"", "\"Applyed\"", 1);
        fs::write(journal.path(), tampered).unwrap();

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_journal_last_phase() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = SwitchJournal::create(temp_dir.path(), "uuid-phase").unwrap();

        journal.write_barrier(&begin("uuid-phase")).unwrap();
        assert_eq!(journal.last_phase().unwrap(), SwitchState::PreCheck);

        journal.write_barrier(&JournalRecord::Applied).unwrap();
        journal
            .write(&JournalRecord::Installed {
                component: "maps".to_string(),
            })
            .unwrap();
        assert_eq!(journal.last_phase().unwrap(), SwitchState::Applying);

        journal
            .write_barrier(&JournalRecord::Committed { components: 1 })
            .unwrap();
        assert_eq!(journal.last_phase().unwrap(), SwitchState::Committing);
    }

    #[test]
    fn test_journal_open_existing() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut journal = SwitchJournal::create(temp_dir.path(), "uuid-open").unwrap();
            journal.write(&begin("uuid-open")).unwrap();
        }

        let path = temp_dir.path().join("tx-uuid-open.journal");
        let journal = SwitchJournal::open(path).unwrap();

        assert_eq!(journal.tx_uuid(), "uuid-open");
        assert_eq!(journal.sequence(), 1);
        assert_eq!(journal.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_open_rejects_foreign_filename() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.journal");
        fs::write(&path, "").unwrap();
        assert!(matches!(SwitchJournal::open(path), Err(Error::Journal(_))));
    }

    #[test]
    fn test_find_incomplete_journals() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut journal = SwitchJournal::create(temp_dir.path(), "incomplete-1").unwrap();
            journal.write(&begin("incomplete-1")).unwrap();
        }
        {
            let mut journal = SwitchJournal::create(temp_dir.path(), "complete-1").unwrap();
            journal.write(&begin("complete-1")).unwrap();
            journal
                .write(&JournalRecord::Done {
                    duration_ms: 12,
                    success: true,
                })
                .unwrap();
        }
        fs::write(temp_dir.path().join("stray.txt"), "x").unwrap();

        let incomplete = find_incomplete_journals(temp_dir.path()).unwrap();
        assert_eq!(incomplete.len(), 1);
        assert!(incomplete[0].to_string_lossy().contains("incomplete-1"));
    }

    #[test]
    fn test_find_incomplete_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_incomplete_journals(&temp_dir.path().join("none")).unwrap().is_empty());
    }

    #[test]
    fn test_journal_archive() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = SwitchJournal::create(temp_dir.path(), "uuid-archive").unwrap();
        journal
            .write(&JournalRecord::Done {
                duration_ms: 100,
                success: true,
            })
            .unwrap();

        let original_path = journal.path().to_path_buf();
        journal.archive().unwrap();

        assert!(!original_path.exists());
        assert!(temp_dir.path().join("archive/tx-uuid-archive.journal").exists());
        assert!(find_incomplete_journals(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_record_to_step() {
        assert_eq!(
            JournalRecord::Staged { live_existed: false }.to_step(),
            Some(SwitchStep::LiveStaged { live_existed: false })
        );
        assert_eq!(JournalRecord::Applied.to_step(), Some(SwitchStep::PackApplied));
        assert_eq!(
            JournalRecord::LivePruned {
                component: "x".to_string()
            }
            .to_step(),
            None
        );
        assert_eq!(
            JournalRecord::Dropped {
                component: "x".to_string()
            }
            .to_state(),
            SwitchState::Installing
        );
    }
}
