//! Photo and voice evidence attached to issues.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_token, ParseEnumError};

/// Media type of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// A picture.
    Photo,
    /// A recorded voice note.
    Voice,
}

impl AttachmentKind {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Voice => "voice",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "photo" => Ok(Self::Photo),
            "voice" => Ok(Self::Voice),
            _ => Err(ParseEnumError::new("attachment kind", s, "photo, voice")),
        }
    }
}

/// Whether the evidence shows the problem or the finished repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentPhase {
    /// Taken when reporting.
    Before,
    /// Taken after the repair; required for verification.
    After,
}

impl AttachmentPhase {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl fmt::Display for AttachmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentPhase {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            _ => Err(ParseEnumError::new("attachment phase", s, "before, after")),
        }
    }
}

/// A stored reference to a photo or voice note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Issue the evidence belongs to.
    pub issue_id: i64,
    /// Media type.
    pub kind: AttachmentKind,
    /// Before or after the repair.
    pub phase: AttachmentPhase,
    /// Path or URI of the media.
    pub reference: String,
    /// BLAKE3 hash used to skip duplicate uploads.
    pub content_hash: String,
    /// Who uploaded it.
    pub uploaded_by: i64,
    /// Upload time.
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// Whether this attachment counts as proof of repair.
    #[must_use]
    pub fn is_after_photo(&self) -> bool {
        self.kind == AttachmentKind::Photo && self.phase == AttachmentPhase::After
    }
}

/// Input for attaching evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    /// Issue the evidence belongs to.
    pub issue_id: i64,
    /// Media type.
    pub kind: AttachmentKind,
    /// Before or after the repair.
    pub phase: AttachmentPhase,
    /// Path or URI of the media.
    pub reference: String,
    /// Hex-encoded BLAKE3 hash of the media.
    pub content_hash: String,
}

impl NewAttachment {
    /// Build an attachment, hashing `content` for deduplication.
    ///
    /// When the media bytes are unavailable (e.g. a remote URI), pass the
    /// reference itself as `content`.
    #[must_use]
    pub fn new(
        issue_id: i64,
        kind: AttachmentKind,
        phase: AttachmentPhase,
        reference: impl Into<String>,
        content: &[u8],
    ) -> Self {
        Self {
            issue_id,
            kind,
            phase,
            reference: reference.into(),
            content_hash: Self::compute_hash(content),
        }
    }

    /// Compute the BLAKE3 hash of the given content.
    #[must_use]
    pub fn compute_hash(content: &[u8]) -> String {
        blake3::hash(content).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_phase_parse() {
        assert_eq!("PHOTO".parse::<AttachmentKind>().unwrap(), AttachmentKind::Photo);
        assert_eq!("after".parse::<AttachmentPhase>().unwrap(), AttachmentPhase::After);
        assert!("video".parse::<AttachmentKind>().is_err());
        assert!("during".parse::<AttachmentPhase>().is_err());
    }

    #[test]
    fn test_hash_is_stable_and_content_sensitive() {
        let a = NewAttachment::compute_hash(b"jpeg bytes");
        let b = NewAttachment::compute_hash(b"jpeg bytes");
        let c = NewAttachment::compute_hash(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_new_attachment_hashes_content() {
        let new = NewAttachment::new(
            3,
            AttachmentKind::Photo,
            AttachmentPhase::After,
            "fixed.jpg",
            b"pixels",
        );
        assert_eq!(new.content_hash, NewAttachment::compute_hash(b"pixels"));
        assert_eq!(new.reference, "fixed.jpg");
    }

    #[test]
    fn test_is_after_photo() {
        let mut attachment = Attachment {
            id: 1,
            issue_id: 1,
            kind: AttachmentKind::Photo,
            phase: AttachmentPhase::After,
            reference: "a.jpg".to_string(),
            content_hash: String::new(),
            uploaded_by: 1,
            created_at: Utc::now(),
        };
        assert!(attachment.is_after_photo());
        attachment.kind = AttachmentKind::Voice;
        assert!(!attachment.is_after_photo());
        attachment.kind = AttachmentKind::Photo;
        attachment.phase = AttachmentPhase::Before;
        assert!(!attachment.is_after_photo());
    }
}
