//! Artifact naming rules
//!
//! Every artifact is addressed by its filename alone. The suffix decides the
//! kind, and for chunks the `_<index>` segment ties the chunk back to the video
//! it was cut from:
//!
//! - video: `<name>.mp4`
//! - manifest: `<name>.m3u8`
//! - chunk: `<name>_<index>.ts`, written with a 4-digit zero-padded index
//!
//! Matching is case-sensitive. Backends, bucket selection and the derivation
//! pipeline all go through this module.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

pub const VIDEO_EXTENSION: &str = ".mp4";
pub const MANIFEST_EXTENSION: &str = ".m3u8";
pub const CHUNK_EXTENSION: &str = ".ts";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),
}

/// The three kinds of artifact a video upload produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "artifact_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Video,
    Manifest,
    Chunk,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Video => VIDEO_EXTENSION,
            ArtifactKind::Manifest => MANIFEST_EXTENSION,
            ArtifactKind::Chunk => CHUNK_EXTENSION,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video",
            ArtifactKind::Manifest => "manifest",
            ArtifactKind::Chunk => "chunk",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(ArtifactKind::Video),
            "manifest" => Ok(ArtifactKind::Manifest),
            "chunk" => Ok(ArtifactKind::Chunk),
            _ => Err(anyhow::anyhow!("Invalid artifact kind: {}", s)),
        }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: ArtifactKind,
    /// Name of the video this artifact belongs to, without extension.
    pub owner: String,
}

/// Classify a filename by suffix and derive the owning video name.
pub fn classify(filename: &str) -> Result<Classified, NamingError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(NamingError::InvalidName(filename.to_string()));
    }

    let (kind, stem) = if let Some(stem) = filename.strip_suffix(VIDEO_EXTENSION) {
        (ArtifactKind::Video, stem)
    } else if let Some(stem) = filename.strip_suffix(MANIFEST_EXTENSION) {
        (ArtifactKind::Manifest, stem)
    } else if let Some(stem) = filename.strip_suffix(CHUNK_EXTENSION) {
        (ArtifactKind::Chunk, stem)
    } else {
        return Err(NamingError::UnsupportedFormat(filename.to_string()));
    };

    if stem.is_empty() {
        return Err(NamingError::InvalidName(filename.to_string()));
    }

    let owner = match kind {
        ArtifactKind::Chunk => chunk_owner(stem)
            .ok_or_else(|| NamingError::InvalidName(filename.to_string()))?,
        ArtifactKind::Video | ArtifactKind::Manifest => stem,
    };

    Ok(Classified {
        kind,
        owner: owner.to_string(),
    })
}

/// `alpha_0007` -> `alpha`; the index must be all digits.
fn chunk_owner(stem: &str) -> Option<&str> {
    let (owner, index) = stem.rsplit_once('_')?;
    if owner.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(owner)
}

/// Accept either `alpha` or `alpha.mp4` and return `alpha`.
pub fn video_stem(name: &str) -> Result<&str, NamingError> {
    let stem = name.strip_suffix(VIDEO_EXTENSION).unwrap_or(name);
    if stem.is_empty()
        || stem.contains('/')
        || stem.contains('\\')
        || stem.contains("..")
        || stem.contains('.')
    {
        return Err(NamingError::InvalidName(name.to_string()));
    }
    Ok(stem)
}

pub fn video_file(stem: &str) -> String {
    format!("{}{}", stem, VIDEO_EXTENSION)
}

pub fn manifest_file(stem: &str) -> String {
    format!("{}{}", stem, MANIFEST_EXTENSION)
}

pub fn chunk_file(stem: &str, index: u32) -> String {
    format!("{}_{:04}{}", stem, index, CHUNK_EXTENSION)
}

/// Segment filename pattern in ffmpeg's printf syntax.
pub fn chunk_template(stem: &str) -> String {
    format!("{}_%04d{}", stem, CHUNK_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_suffix() {
        let video = classify("alpha.mp4").unwrap();
        assert_eq!(video.kind, ArtifactKind::Video);
        assert_eq!(video.owner, "alpha");

        let manifest = classify("alpha.m3u8").unwrap();
        assert_eq!(manifest.kind, ArtifactKind::Manifest);
        assert_eq!(manifest.owner, "alpha");

        let chunk = classify("alpha_0007.ts").unwrap();
        assert_eq!(chunk.kind, ArtifactKind::Chunk);
        assert_eq!(chunk.owner, "alpha");
    }

    #[test]
    fn test_chunk_owner_keeps_inner_underscores() {
        let chunk = classify("my_clip_0001.ts").unwrap();
        assert_eq!(chunk.owner, "my_clip");
    }

    #[test]
    fn test_unsupported_suffix() {
        assert_eq!(
            classify("alpha.mov"),
            Err(NamingError::UnsupportedFormat("alpha.mov".to_string()))
        );
        assert!(matches!(
            classify("alpha"),
            Err(NamingError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_suffix_match_is_case_sensitive() {
        assert!(matches!(
            classify("alpha.MP4"),
            Err(NamingError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_path_traversal() {
        for name in ["../alpha.mp4", "a/b.m3u8", "a\\b_0001.ts", "..mp4"] {
            assert!(
                matches!(classify(name), Err(NamingError::InvalidName(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_chunks() {
        for name in ["alpha.ts", "alpha_.ts", "_0001.ts", "alpha_00x1.ts"] {
            assert!(
                matches!(classify(name), Err(NamingError::InvalidName(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_empty_stem() {
        assert!(matches!(classify(".mp4"), Err(NamingError::InvalidName(_))));
        assert!(matches!(classify(""), Err(NamingError::InvalidName(_))));
    }

    #[test]
    fn test_builders_match_classifier() {
        assert_eq!(video_file("alpha"), "alpha.mp4");
        assert_eq!(manifest_file("alpha"), "alpha.m3u8");
        assert_eq!(chunk_file("alpha", 7), "alpha_0007.ts");
        assert_eq!(chunk_template("alpha"), "alpha_%04d.ts");
        assert_eq!(classify(&chunk_file("alpha", 12)).unwrap().owner, "alpha");
    }

    #[test]
    fn test_video_stem() {
        assert_eq!(video_stem("alpha").unwrap(), "alpha");
        assert_eq!(video_stem("alpha.mp4").unwrap(), "alpha");
        assert!(video_stem("alpha.m3u8").is_err());
        assert!(video_stem("../alpha").is_err());
        assert!(video_stem("").is_err());
    }
}
