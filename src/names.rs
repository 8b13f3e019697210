use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk format of the multiplexed input. Decides every artifact name, so the
/// patterns here must match the external tools and the remote layout bit-exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    Uimf,
    AgilentD,
}

impl DatasetKind {
    pub fn from_config(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "uimf" => Some(Self::Uimf),
            "agilent_d" | "d" => Some(Self::AgilentD),
            _ => None,
        }
    }
}

pub const CALIBRATION_LOG_NAME: &str = "CalibrationLog.txt";
pub const CHECKPOINT_SUFFIX: &str = ".tmp";

/// Staged multiplexed input: `<ds>.uimf` / `<ds>.d`.
pub fn staged_input(dataset: &str, kind: DatasetKind) -> String {
    match kind {
        DatasetKind::Uimf => format!("{dataset}.uimf"),
        DatasetKind::AgilentD => format!("{dataset}.d"),
    }
}

/// Renamed remote multiplexed input: `<ds>_encoded.uimf` / `<ds>_muxed.d`.
pub fn renamed_input(dataset: &str, kind: DatasetKind) -> String {
    match kind {
        DatasetKind::Uimf => format!("{dataset}_encoded.uimf"),
        DatasetKind::AgilentD => format!("{dataset}_muxed.d"),
    }
}

/// Decoded output: `<ds>_decoded.uimf` / `<ds>.d.deMP.d`.
pub fn decoded_output(dataset: &str, kind: DatasetKind) -> String {
    match kind {
        DatasetKind::Uimf => format!("{dataset}_decoded.uimf"),
        DatasetKind::AgilentD => format!("{dataset}.d.deMP.d"),
    }
}

/// Checkpoint artifact: decoded name plus the `.tmp` marker suffix.
pub fn checkpoint_name(dataset: &str, kind: DatasetKind) -> String {
    format!("{}{}", decoded_output(dataset, kind), CHECKPOINT_SUFFIX)
}

/// True if `name` already carries the renamed form for this dataset, meaning a
/// previous run got past the rename step.
pub fn is_renamed_form(name: &str, dataset: &str, kind: DatasetKind) -> bool {
    name == renamed_input(dataset, kind)
}

/// Remote dataset directory: `join(storage_volume, storage_path, dataset_dir)`.
pub fn remote_dataset_dir(storage_volume: &str, storage_path: &str, dataset_dir: &str) -> PathBuf {
    Path::new(storage_volume).join(storage_path).join(dataset_dir)
}
