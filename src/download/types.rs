use crate::errors::SalvageError;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

/// One download request, immutable once constructed.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub source_url: String,
    pub kind: MediaKind,
    pub destination_dir: PathBuf,
}

impl MediaRequest {
    /// Parses the request line read from the input file.
    ///
    /// The first whitespace-delimited token is the URL; an optional second
    /// token selects audio vs video (case-insensitive). Unrecognized kind
    /// tokens fall back to video with a diagnostic.
    pub fn from_input(input: &str, destination_dir: PathBuf) -> Result<Self, SalvageError> {
        let mut tokens = input.split_whitespace();

        let source_url = tokens
            .next()
            .ok_or_else(|| SalvageError::Configuration("input source is empty".to_string()))?
            .to_string();

        Url::parse(&source_url).map_err(|e| {
            SalvageError::Configuration(format!("input is not a valid URL ({}): {}", source_url, e))
        })?;

        let kind = match tokens.next() {
            Some(token) => MediaKind::parse(token).unwrap_or_else(|| {
                warn!(
                    "Unrecognized media kind '{}', defaulting to video",
                    token
                );
                MediaKind::Video
            }),
            None => MediaKind::Video,
        };

        Ok(Self {
            source_url,
            kind,
            destination_dir,
        })
    }
}

/// Opaque credential material the external tool knows how to use.
///
/// The builder only observes whether the bundle looks usable; the contents
/// are entirely the tool's business.
#[derive(Debug, Clone, Default)]
pub struct CredentialBundle {
    pub cookies_file: Option<PathBuf>,
    pub from_browser: Option<String>,
}

impl CredentialBundle {
    pub fn is_usable(&self) -> bool {
        if let Some(path) = &self.cookies_file {
            if std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0) {
                return true;
            }
        }
        self.from_browser
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }
}

/// One fixed configuration for a single external-tool invocation.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: &'static str,
    pub tool_arguments: Vec<String>,
    pub per_attempt_timeout: Duration,
    pub output_name_pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Success,
    ToolError,
    Timeout,
    SpawnError,
}

/// Classified result of one executor run, recorded in the attempt log.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub strategy_name: String,
    pub status: AttemptStatus,
    pub exit_code: Option<i32>,
    pub stdout_excerpt: String,
    pub stderr_excerpt: String,
}

/// A file the verifier found in the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Artifact {
    pub filename: String,
    pub size_bytes: u64,
}

/// Terminal output of the orchestrator: the verdict plus the full ordered
/// attempt history, kept even on total failure for postmortem diagnosis.
#[derive(Debug)]
pub struct DownloadVerdict {
    pub succeeded: bool,
    pub successful_strategy: Option<String>,
    pub attempts: Vec<AttemptOutcome>,
    pub artifacts: BTreeSet<Artifact>,
}

impl DownloadVerdict {
    /// True when the chain stopped because the tool could not be spawned,
    /// as opposed to running out of strategies.
    pub fn aborted(&self) -> bool {
        !self.succeeded
            && matches!(
                self.attempts.last(),
                Some(outcome) if outcome.status == AttemptStatus::SpawnError
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_input_url_only_defaults_to_video() {
        let request =
            MediaRequest::from_input("https://example.com/watch?v=abc\n", PathBuf::from("out"))
                .unwrap();
        assert_eq!(request.source_url, "https://example.com/watch?v=abc");
        assert_eq!(request.kind, MediaKind::Video);
        assert_eq!(request.destination_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_from_input_kind_token_case_insensitive() {
        let request =
            MediaRequest::from_input("https://example.com/track AUDIO", PathBuf::from("out"))
                .unwrap();
        assert_eq!(request.kind, MediaKind::Audio);

        let request =
            MediaRequest::from_input("https://example.com/track Video", PathBuf::from("out"))
                .unwrap();
        assert_eq!(request.kind, MediaKind::Video);
    }

    #[test]
    fn test_from_input_unrecognized_kind_defaults_to_video() {
        let request =
            MediaRequest::from_input("https://example.com/track flac", PathBuf::from("out"))
                .unwrap();
        assert_eq!(request.kind, MediaKind::Video);
    }

    #[test]
    fn test_from_input_empty_is_configuration_error() {
        let err = MediaRequest::from_input("   \n", PathBuf::from("out")).unwrap_err();
        assert!(matches!(err, SalvageError::Configuration(_)));
    }

    #[test]
    fn test_from_input_rejects_non_url() {
        let err = MediaRequest::from_input("not-a-url", PathBuf::from("out")).unwrap_err();
        assert!(matches!(err, SalvageError::Configuration(_)));
    }

    #[test]
    fn test_credentials_usable_from_browser_name() {
        let bundle = CredentialBundle {
            cookies_file: None,
            from_browser: Some("firefox".to_string()),
        };
        assert!(bundle.is_usable());

        let blank = CredentialBundle {
            cookies_file: None,
            from_browser: Some("  ".to_string()),
        };
        assert!(!blank.is_usable());
    }

    #[test]
    fn test_credentials_missing_file_not_usable() {
        let bundle = CredentialBundle {
            cookies_file: Some(PathBuf::from("/definitely/not/here/cookies.txt")),
            from_browser: None,
        };
        assert!(!bundle.is_usable());
    }

    #[test]
    fn test_artifacts_order_by_filename() {
        let mut set = BTreeSet::new();
        set.insert(Artifact {
            filename: "b.mp4".to_string(),
            size_bytes: 1,
        });
        set.insert(Artifact {
            filename: "a.mp4".to_string(),
            size_bytes: 2,
        });
        let names: Vec<_> = set.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4"]);
    }
}
