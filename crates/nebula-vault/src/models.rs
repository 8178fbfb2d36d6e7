//! Persisted vault records

use crate::security::EncryptedSecret;
use chrono::{DateTime, Utc};
use nebula_core::Pubkey;
use serde::{Deserialize, Serialize};

/// One stored wallet.
///
/// Field names are fixed by the on-disk format:
/// `{ id, name, publicKey, encryptedMnemonic, createdAt }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    /// UUID v4
    pub id: String,
    /// Display name
    pub name: String,
    /// Account-0 address
    pub public_key: Pubkey,
    /// Base64 of the sealed recovery phrase
    pub encrypted_mnemonic: String,
    /// Creation time (ISO-8601, UTC)
    pub created_at: DateTime<Utc>,
}

impl VaultEntry {
    /// Decode the sealed phrase
    pub fn encrypted_secret(&self) -> nebula_core::Result<EncryptedSecret> {
        EncryptedSecret::from_base64(&self.encrypted_mnemonic)
    }

    /// Public projection without the sealed blob
    pub fn summary(&self) -> VaultEntrySummary {
        let readable = self
            .encrypted_secret()
            .map(|secret| secret.is_well_formed())
            .unwrap_or(false);
        VaultEntrySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            public_key: self.public_key,
            created_at: self.created_at,
            readable,
        }
    }
}

/// Wallet listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntrySummary {
    /// UUID v4
    pub id: String,
    /// Display name
    pub name: String,
    /// Account-0 address
    pub public_key: Pubkey,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Sealed blob is structurally intact. Says nothing about the password.
    pub readable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(encrypted: &str) -> VaultEntry {
        VaultEntry {
            id: "3f1c2a4e-9d1b-4c55-a1a0-2b9c7a8f0e11".to_string(),
            name: "Main".to_string(),
            public_key: "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk".parse().unwrap(),
            encrypted_mnemonic: encrypted.to_string(),
            created_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(entry("AAAA")).unwrap();
        let object = json.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["createdAt", "encryptedMnemonic", "id", "name", "publicKey"]);
        assert_eq!(object["publicKey"], "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk");
        assert_eq!(object["createdAt"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_reads_browser_timestamps() {
        let json = r#"{
            "id": "a",
            "name": "Imported",
            "publicKey": "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk",
            "encryptedMnemonic": "AAAA",
            "createdAt": "2024-05-01T12:00:00.000Z"
        }"#;
        let parsed: VaultEntry = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.name, "Imported");
    }

    #[test]
    fn test_summary_readable_flag() {
        let intact = base64_of(&[0u8; 60]);
        assert!(entry(&intact).summary().readable);
        assert!(!entry("AAAA").summary().readable);
        assert!(!entry("***").summary().readable);
    }

    fn base64_of(bytes: &[u8]) -> String {
        EncryptedSecret::from_bytes(bytes.to_vec()).to_base64()
    }
}
