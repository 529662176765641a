use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::str::FromStr;

use crate::domain::table_diff::SqlValue;
use crate::domain::value_objects::Fingerprint;

/// Cell separator fed to the digest after every value, so that `('ab', 'c')`
/// and `('a', 'bc')` do not collide.
const CELL_SEPARATOR: u8 = 0x1f;

/// How rows are combined into a table fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// One streaming SHA-256 over every cell, rows visited in ascending order
    /// of the non-ignored columns.
    #[default]
    Ordered,
    /// SHA-256 per row, combined by addition modulo 2^256. Independent of
    /// visiting order, ties included.
    Multiset,
}

impl FromStr for FingerprintMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ordered" => Ok(Self::Ordered),
            "multiset" => Ok(Self::Multiset),
            other => Err(format!("unknown fingerprint mode `{other}` (expected ordered or multiset)")),
        }
    }
}

/// Incremental fingerprint of a table scan.
///
/// Feed every visited row with [`push_row`](Self::push_row), then call
/// [`finish`](Self::finish). A scan that saw no rows has no fingerprint.
pub struct FingerprintBuilder {
    mode: FingerprintMode,
    ordered: Sha256,
    sum: [u8; 32],
    rows: u64,
}

impl FingerprintBuilder {
    pub fn new(mode: FingerprintMode) -> Self {
        Self {
            mode,
            ordered: Sha256::new(),
            sum: [0u8; 32],
            rows: 0,
        }
    }

    pub fn push_row(&mut self, row: &[SqlValue]) {
        self.rows += 1;
        match self.mode {
            FingerprintMode::Ordered => feed_cells(&mut self.ordered, row),
            FingerprintMode::Multiset => {
                let mut hasher = Sha256::new();
                feed_cells(&mut hasher, row);
                add_mod_2_256(&mut self.sum, &digest_bytes(hasher));
            }
        }
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn finish(self) -> Option<Fingerprint> {
        if self.rows == 0 {
            return None;
        }
        let bytes = match self.mode {
            FingerprintMode::Ordered => digest_bytes(self.ordered),
            FingerprintMode::Multiset => self.sum,
        };
        Some(Fingerprint(to_hex(&bytes)))
    }
}

fn feed_cells(hasher: &mut Sha256, row: &[SqlValue]) {
    for cell in row {
        hasher.update(cell.digest_bytes());
        hasher.update([CELL_SEPARATOR]);
    }
}

fn digest_bytes(hasher: Sha256) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Big-endian addition with carry, discarding the final overflow.
fn add_mod_2_256(acc: &mut [u8; 32], digest: &[u8; 32]) {
    let mut carry = 0u16;
    for i in (0..32).rev() {
        let s = acc[i] as u16 + digest[i] as u16 + carry;
        acc[i] = (s & 0xff) as u8;
        carry = s >> 8;
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Fingerprint a slice of in-memory rows. Used by tests and by callers that
/// already hold the rows.
pub fn fingerprint(rows: &[Vec<SqlValue>], mode: FingerprintMode) -> Option<Fingerprint> {
    let mut builder = FingerprintBuilder::new(mode);
    for row in rows {
        builder.push_row(row);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, v: &str) -> Vec<SqlValue> {
        vec![SqlValue::Integer(id), SqlValue::Text(v.to_string())]
    }

    #[test]
    fn same_rows_same_fingerprint() {
        let rows = vec![row(1, "a"), row(2, "b")];
        assert_eq!(
            fingerprint(&rows, FingerprintMode::Ordered),
            fingerprint(&rows, FingerprintMode::Ordered)
        );
    }

    #[test]
    fn different_rows_different_fingerprint() {
        assert_ne!(
            fingerprint(&[row(1, "a")], FingerprintMode::Ordered),
            fingerprint(&[row(1, "CHANGED")], FingerprintMode::Ordered)
        );
    }

    #[test]
    fn empty_scan_has_no_fingerprint() {
        assert_eq!(fingerprint(&[], FingerprintMode::Ordered), None);
        assert_eq!(fingerprint(&[], FingerprintMode::Multiset), None);
    }

    #[test]
    fn separator_prevents_concatenation_collisions() {
        let a = vec![vec![SqlValue::Text("ab".into()), SqlValue::Text("c".into())]];
        let b = vec![vec![SqlValue::Text("a".into()), SqlValue::Text("bc".into())]];
        assert_ne!(
            fingerprint(&a, FingerprintMode::Ordered),
            fingerprint(&b, FingerprintMode::Ordered)
        );
    }

    #[test]
    fn ordered_mode_depends_on_visit_order() {
        assert_ne!(
            fingerprint(&[row(1, "a"), row(2, "b")], FingerprintMode::Ordered),
            fingerprint(&[row(2, "b"), row(1, "a")], FingerprintMode::Ordered)
        );
    }

    #[test]
    fn multiset_mode_is_order_independent() {
        let forward = vec![row(1, "a"), row(2, "b"), row(2, "b")];
        let shuffled = vec![row(2, "b"), row(1, "a"), row(2, "b")];
        assert_eq!(
            fingerprint(&forward, FingerprintMode::Multiset),
            fingerprint(&shuffled, FingerprintMode::Multiset)
        );
    }

    #[test]
    fn multiset_mode_counts_duplicates() {
        let once = vec![row(1, "a")];
        let twice = vec![row(1, "a"), row(1, "a")];
        assert_ne!(
            fingerprint(&once, FingerprintMode::Multiset),
            fingerprint(&twice, FingerprintMode::Multiset)
        );
    }

    #[test]
    fn add_wraps_at_256_bits() {
        let mut acc = [0xffu8; 32];
        let mut one = [0u8; 32];
        one[31] = 1;
        add_mod_2_256(&mut acc, &one);
        assert_eq!(acc, [0u8; 32]);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Multiset".parse::<FingerprintMode>(), Ok(FingerprintMode::Multiset));
        assert!("sorted".parse::<FingerprintMode>().is_err());
    }
}
