use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Lowercase hex of a 32-byte digest.
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Digest over named fields. Fields are fed to the hasher sorted by name, so the
/// result does not depend on the order they were added in.
#[derive(Debug, Default)]
pub struct FieldDigest {
    fields: BTreeMap<&'static str, String>,
}

impl FieldDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.insert(name, value.into());
        self
    }

    pub fn finish(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.fields {
            // Length prefixes keep `a=bc` and `ab=c` apart.
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        let hash: [u8; 32] = hasher.finalize().into();
        to_hex(&hash)
    }
}
