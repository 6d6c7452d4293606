use super::types::{CredentialBundle, MediaKind, MediaRequest, Strategy};
use rand::Rng;
use std::time::Duration;

/// Rotation table used when the config does not supply its own. Ordinary
/// desktop browser agents; the point is variety, not freshness.
const DEFAULT_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const TITLE_PATTERN: &str = "%(title)s.%(ext)s";
const ID_PATTERN: &str = "%(id)s.%(ext)s";

/// Builds the ordered fallback chain for a request.
///
/// The ladder is a fixed policy table: each rung trades quality for
/// permissiveness, timeouts never increase down the chain, and only the
/// first rung carries credentials. Later rungs switch to id-based output
/// names so exotic titles cannot break the template.
pub struct ChainBuilder {
    user_agents: Vec<String>,
}

impl ChainBuilder {
    pub fn new(user_agents: Option<Vec<String>>) -> Self {
        let user_agents = match user_agents {
            Some(table) if !table.is_empty() => table,
            _ => DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        };
        Self { user_agents }
    }

    pub fn build(
        &self,
        request: &MediaRequest,
        credentials: Option<&CredentialBundle>,
    ) -> Vec<Strategy> {
        match request.kind {
            MediaKind::Video => self.build_video(request, credentials),
            MediaKind::Audio => self.build_audio(request, credentials),
        }
    }

    fn build_video(
        &self,
        request: &MediaRequest,
        credentials: Option<&CredentialBundle>,
    ) -> Vec<Strategy> {
        vec![
            self.strategy(
                request,
                "bounded-hq",
                &["-f", "bestvideo[height<=1080]+bestaudio/best[height<=1080]"],
                credentials,
                false,
                TITLE_PATTERN,
                Duration::from_secs(300),
            ),
            self.strategy(
                request,
                "plain-best",
                &["-f", "best"],
                None,
                true,
                TITLE_PATTERN,
                Duration::from_secs(240),
            ),
            self.strategy(
                request,
                "permissive",
                &[
                    "-f",
                    "best/bestvideo+bestaudio",
                    "--no-check-certificates",
                    "--geo-bypass",
                ],
                None,
                true,
                ID_PATTERN,
                Duration::from_secs(180),
            ),
            self.strategy(
                request,
                "last-resort",
                &[
                    "-f",
                    "worst",
                    "--no-check-certificates",
                    "--geo-bypass",
                    "--force-ipv4",
                ],
                None,
                false,
                ID_PATTERN,
                Duration::from_secs(120),
            ),
        ]
    }

    fn build_audio(
        &self,
        request: &MediaRequest,
        credentials: Option<&CredentialBundle>,
    ) -> Vec<Strategy> {
        vec![
            self.strategy(
                request,
                "audio-hq",
                &["-x", "--audio-format", "mp3", "--audio-quality", "192K"],
                credentials,
                false,
                TITLE_PATTERN,
                Duration::from_secs(300),
            ),
            self.strategy(
                request,
                "audio-plain",
                &["-x", "--audio-format", "mp3", "--audio-quality", "5"],
                None,
                true,
                TITLE_PATTERN,
                Duration::from_secs(240),
            ),
            self.strategy(
                request,
                "audio-permissive",
                &["-x", "--no-check-certificates", "--geo-bypass"],
                None,
                true,
                ID_PATTERN,
                Duration::from_secs(180),
            ),
            self.strategy(
                request,
                "audio-last-resort",
                &[
                    "-f",
                    "worstaudio/worst",
                    "-x",
                    "--no-check-certificates",
                    "--geo-bypass",
                    "--force-ipv4",
                ],
                None,
                false,
                ID_PATTERN,
                Duration::from_secs(120),
            ),
        ]
    }

    #[allow(clippy::too_many_arguments)]
    fn strategy(
        &self,
        request: &MediaRequest,
        name: &'static str,
        format_args: &[&str],
        credentials: Option<&CredentialBundle>,
        rotate_agent: bool,
        pattern: &str,
        timeout: Duration,
    ) -> Strategy {
        let mut args: Vec<String> = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(format_args.iter().map(|s| s.to_string()));

        if let Some(bundle) = credentials.filter(|b| b.is_usable()) {
            if let Some(path) = &bundle.cookies_file {
                args.push("--cookies".to_string());
                args.push(path.display().to_string());
            } else if let Some(browser) = &bundle.from_browser {
                args.push("--cookies-from-browser".to_string());
                args.push(browser.clone());
            }
        }

        if rotate_agent {
            args.push("--user-agent".to_string());
            args.push(self.pick_agent().to_string());
        }

        args.push("-P".to_string());
        args.push(request.destination_dir.display().to_string());
        args.push("-o".to_string());
        args.push(pattern.to_string());
        args.push(request.source_url.clone());

        Strategy {
            name,
            tool_arguments: args,
            per_attempt_timeout: timeout,
            output_name_pattern: pattern.to_string(),
        }
    }

    fn pick_agent(&self) -> &str {
        let index = rand::rng().random_range(0..self.user_agents.len());
        &self.user_agents[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(kind: MediaKind) -> MediaRequest {
        MediaRequest {
            source_url: "https://example.com/watch?v=abc".to_string(),
            kind,
            destination_dir: PathBuf::from("downloads"),
        }
    }

    fn single_agent_builder() -> ChainBuilder {
        ChainBuilder::new(Some(vec!["test-agent/1.0".to_string()]))
    }

    #[test]
    fn test_chain_non_empty_for_both_kinds() {
        let builder = single_agent_builder();
        for kind in [MediaKind::Video, MediaKind::Audio] {
            let chain = builder.build(&request(kind), None);
            assert!(!chain.is_empty());
        }
    }

    #[test]
    fn test_timeouts_never_increase_down_the_chain() {
        let builder = single_agent_builder();
        for kind in [MediaKind::Video, MediaKind::Audio] {
            let chain = builder.build(&request(kind), None);
            for pair in chain.windows(2) {
                assert!(
                    pair[1].per_attempt_timeout <= pair[0].per_attempt_timeout,
                    "{} must not exceed {}",
                    pair[1].name,
                    pair[0].name
                );
            }
        }
    }

    #[test]
    fn test_quality_descends_to_worst() {
        let builder = single_agent_builder();
        let chain = builder.build(&request(MediaKind::Video), None);

        let first = chain.first().unwrap();
        assert!(first
            .tool_arguments
            .iter()
            .any(|a| a.contains("height<=1080")));

        let last = chain.last().unwrap();
        assert!(last.tool_arguments.iter().any(|a| a == "worst"));
    }

    #[test]
    fn test_credentials_only_on_first_rung() {
        let builder = single_agent_builder();
        let bundle = CredentialBundle {
            cookies_file: None,
            from_browser: Some("firefox".to_string()),
        };
        let chain = builder.build(&request(MediaKind::Video), Some(&bundle));

        assert!(chain[0]
            .tool_arguments
            .contains(&"--cookies-from-browser".to_string()));
        for strategy in &chain[1..] {
            assert!(
                !strategy
                    .tool_arguments
                    .contains(&"--cookies-from-browser".to_string()),
                "{} must not carry credentials",
                strategy.name
            );
        }
    }

    #[test]
    fn test_unusable_credentials_are_ignored() {
        let builder = single_agent_builder();
        let bundle = CredentialBundle {
            cookies_file: Some(PathBuf::from("/definitely/not/here/cookies.txt")),
            from_browser: None,
        };
        let chain = builder.build(&request(MediaKind::Video), Some(&bundle));
        assert!(!chain[0].tool_arguments.contains(&"--cookies".to_string()));
    }

    #[test]
    fn test_later_rungs_use_id_pattern() {
        let builder = single_agent_builder();
        let chain = builder.build(&request(MediaKind::Video), None);
        assert!(chain[0].output_name_pattern.contains("%(title)s"));
        assert!(chain.last().unwrap().output_name_pattern.contains("%(id)s"));
    }

    #[test]
    fn test_url_is_last_argument() {
        let builder = single_agent_builder();
        let chain = builder.build(&request(MediaKind::Audio), None);
        for strategy in &chain {
            assert_eq!(
                strategy.tool_arguments.last().map(|s| s.as_str()),
                Some("https://example.com/watch?v=abc")
            );
        }
    }

    #[test]
    fn test_deterministic_with_single_agent_table() {
        let builder = single_agent_builder();
        let req = request(MediaKind::Video);
        let first: Vec<_> = builder
            .build(&req, None)
            .into_iter()
            .map(|s| s.tool_arguments)
            .collect();
        let second: Vec<_> = builder
            .build(&req, None)
            .into_iter()
            .map(|s| s.tool_arguments)
            .collect();
        assert_eq!(first, second);
    }
}
