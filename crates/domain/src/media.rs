//! `MediaRef`: where a piece of binary content lives, plus the integrity
//! metadata (digest, size, mime type) computed from the bytes we actually
//! received.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where the bytes of a [`MediaRef`] live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Remote content addressed by URL.
    Url,
    /// Content held by a file store, addressed by opaque id.
    FileId,
    /// Content carried inline as base64.
    Data,
}

/// Descriptor for binary content.
///
/// Exactly one of `url` / `file_id` / `data_base64` is populated and it
/// always agrees with `kind`. Decoding rejects values that break this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMediaRef")]
pub struct MediaRef {
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_base64: Option<String>,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Lower-case hex SHA-256 of the raw bytes. Empty for by-reference
    /// media whose bytes never passed through this process.
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl MediaRef {
    /// Build an inline (`kind = data`) reference. Digest and size are
    /// computed from `bytes`; nothing is taken on trust from the caller.
    pub fn inline(bytes: &[u8], mime_type: impl Into<String>, filename: Option<String>) -> Self {
        Self {
            kind: MediaKind::Data,
            url: None,
            file_id: None,
            data_base64: Some(STANDARD.encode(bytes)),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            sha256: sha256_hex(bytes),
            filename,
        }
    }

    /// Build a by-URL reference.
    pub fn url(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Url,
            url: Some(url.into()),
            file_id: None,
            data_base64: None,
            mime_type: mime_type.into(),
            size_bytes: 0,
            sha256: String::new(),
            filename: None,
        }
    }

    /// Build a by-file-id reference.
    pub fn file_id(file_id: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::FileId,
            url: None,
            file_id: Some(file_id.into()),
            data_base64: None,
            mime_type: mime_type.into(),
            size_bytes: 0,
            sha256: String::new(),
            filename: None,
        }
    }

    /// Decode the inline payload, if this is a `data` reference.
    pub fn decode_data(&self) -> Option<Vec<u8>> {
        self.data_base64
            .as_deref()
            .and_then(|b64| STANDARD.decode(b64).ok())
    }

    /// Identity used for downstream dedup: identical digest and mime type
    /// mean identical content.
    pub fn dedup_key(&self) -> (&str, &str) {
        (self.sha256.as_str(), self.mime_type.as_str())
    }

    /// Check the one-locator-per-kind and digest-format invariants.
    pub fn validate(&self) -> Result<(), String> {
        let populated = [
            self.url.is_some(),
            self.file_id.is_some(),
            self.data_base64.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();
        if populated != 1 {
            return Err(format!(
                "exactly one of url/file_id/data_base64 must be set (found {populated})"
            ));
        }

        let consistent = match self.kind {
            MediaKind::Url => self.url.is_some(),
            MediaKind::FileId => self.file_id.is_some(),
            MediaKind::Data => self.data_base64.is_some(),
        };
        if !consistent {
            return Err(format!("locator does not match kind {:?}", self.kind));
        }

        if !self.sha256.is_empty() && !is_sha256_hex(&self.sha256) {
            return Err("sha256 must be 64 hex characters".into());
        }
        if self.kind == MediaKind::Data && self.sha256.is_empty() {
            return Err("inline media must carry its sha256".into());
        }
        Ok(())
    }
}

/// Lower-case hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

// ── serde shim ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawMediaRef {
    kind: MediaKind,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    data_base64: Option<String>,
    mime_type: String,
    #[serde(default)]
    size_bytes: u64,
    #[serde(default)]
    sha256: String,
    #[serde(default)]
    filename: Option<String>,
}

impl TryFrom<RawMediaRef> for MediaRef {
    type Error = String;

    fn try_from(raw: RawMediaRef) -> Result<Self, Self::Error> {
        let media = MediaRef {
            kind: raw.kind,
            url: raw.url,
            file_id: raw.file_id,
            data_base64: raw.data_base64,
            mime_type: raw.mime_type,
            size_bytes: raw.size_bytes,
            sha256: raw.sha256.to_ascii_lowercase(),
            filename: raw.filename,
        };
        media.validate()?;
        Ok(media)
    }
}
