//! Audio reference resolution.
//!
//! Alarms carry an opaque audio reference chosen by the application. It is
//! resolved to something playable right before the session starts:
//!
//! | Reference                         | Resolved to                          |
//! |-----------------------------------|--------------------------------------|
//! | empty, `default_alarm_sound`      | bundled tone                         |
//! | `content://<authority>/<path>`    | `<content root>/<authority>/<path>`  |
//! | `file://[localhost]<path>`        | `<path>`, percent-decoded            |
//! | absolute path                     | the path itself                      |
//! | relative path                     | first match under the search dirs    |

use std::path::{Component, Path, PathBuf};

use super::error::SoundError;
use crate::types::DEFAULT_AUDIO_REF;

const CONTENT_SCHEME: &str = "content://";
const FILE_SCHEME: &str = "file://";

/// A playable audio source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAudio {
    /// A sound file on disk.
    File(PathBuf),
    /// The tone compiled into the binary.
    Bundled,
}

impl ResolvedAudio {
    #[must_use]
    pub fn is_bundled(&self) -> bool {
        matches!(self, Self::Bundled)
    }

    /// Returns a short description for logs and status output.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Bundled => "bundled".to_string(),
        }
    }
}

/// Resolves audio references against the configured locations.
#[derive(Debug, Clone, Default)]
pub struct AudioResolver {
    content_root: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
}

impl AudioResolver {
    pub fn new(content_root: Option<PathBuf>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            content_root,
            search_dirs,
        }
    }

    /// Resolves `audio_ref` to a playable source.
    ///
    /// # Errors
    ///
    /// Returns [`SoundError::InvalidReference`] for malformed references and
    /// [`SoundError::FileNotFound`] when the referenced file does not exist.
    pub fn resolve(&self, audio_ref: &str) -> Result<ResolvedAudio, SoundError> {
        let audio_ref = audio_ref.trim();

        if audio_ref.is_empty() || audio_ref == DEFAULT_AUDIO_REF {
            return Ok(ResolvedAudio::Bundled);
        }

        if let Some(rest) = audio_ref.strip_prefix(CONTENT_SCHEME) {
            return self.resolve_content(rest);
        }

        if audio_ref.starts_with(FILE_SCHEME) {
            return existing_file(file_uri_path(audio_ref)?);
        }

        if audio_ref.contains("://") {
            return Err(SoundError::InvalidReference(audio_ref.to_string()));
        }

        let path = Path::new(audio_ref);
        if path.is_absolute() {
            return existing_file(path.to_path_buf());
        }

        self.search_relative(path)
    }

    /// Resolves `audio_ref`, falling back to the bundled tone on any error.
    #[must_use]
    pub fn resolve_or_bundled(&self, audio_ref: &str) -> ResolvedAudio {
        match self.resolve(audio_ref) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(audio_ref, "{}。内蔵のアラーム音を使用します", e);
                ResolvedAudio::Bundled
            }
        }
    }

    fn resolve_content(&self, rest: &str) -> Result<ResolvedAudio, SoundError> {
        let root = self.content_root.as_ref().ok_or_else(|| {
            SoundError::InvalidReference(format!("{CONTENT_SCHEME}{rest} (content root not configured)"))
        })?;

        let relative = Path::new(rest);
        if rest.is_empty() || !is_contained(relative) {
            return Err(SoundError::InvalidReference(format!("{CONTENT_SCHEME}{rest}")));
        }

        existing_file(root.join(relative))
    }

    fn search_relative(&self, relative: &Path) -> Result<ResolvedAudio, SoundError> {
        if !is_contained(relative) {
            return Err(SoundError::InvalidReference(relative.display().to_string()));
        }

        self.search_dirs
            .iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
            .map(ResolvedAudio::File)
            .ok_or_else(|| SoundError::FileNotFound(relative.display().to_string()))
    }
}

/// Returns true if `path` is relative and never climbs out via `..`.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Converts a `file://` URI to a local path.
///
/// Percent escapes are decoded; the authority must be empty or `localhost`.
fn file_uri_path(uri: &str) -> Result<PathBuf, SoundError> {
    url::Url::parse(uri)
        .ok()
        .and_then(|parsed| parsed.to_file_path().ok())
        .ok_or_else(|| SoundError::InvalidReference(uri.to_string()))
}

fn existing_file(path: PathBuf) -> Result<ResolvedAudio, SoundError> {
    if path.is_file() {
        Ok(ResolvedAudio::File(path))
    } else {
        Err(SoundError::FileNotFound(path.display().to_string()))
    }
}
