//! Media URL resolution for a single item page.
//!
//! The page's player only requests the real asset once it starts, so the
//! resolver renders the page, presses play, and picks the largest video
//! response the browser observed. Title and author come from a text snapshot
//! of the page.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ResolveSettings;
use crate::error::SessionError;
use crate::models::{
    MediaCandidate, NetworkResponse, PageSnapshot, ResolutionResult, UNKNOWN_AUTHOR,
};
use crate::scrapers::{PageSession, SessionLauncher};

/// Progress of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Loading,
    MetadataExtracted,
    CandidatesObserved,
    Resolved,
    Failed,
}

/// Decide whether an observed response is a full-size video asset.
///
/// The URL must carry a video marker or the content type must declare video,
/// and the declared length must exceed `size_floor`.
pub fn classify_response(
    response: &NetworkResponse,
    url_markers: &[String],
    size_floor: u64,
) -> Option<MediaCandidate> {
    let url = response.url.to_ascii_lowercase();
    let is_video = url_markers
        .iter()
        .any(|marker| url.contains(&marker.to_ascii_lowercase()))
        || response
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("video"));
    if !is_video {
        return None;
    }

    let size = response.content_length?;
    if size <= size_floor {
        debug!("Ignoring small video response {} ({} bytes)", response.url, size);
        return None;
    }

    Some(MediaCandidate {
        url: response.url.clone(),
        size_bytes: size,
    })
}

/// Largest candidate; the first one seen wins ties.
pub fn best_candidate(candidates: &[MediaCandidate]) -> Option<&MediaCandidate> {
    candidates.iter().fold(None, |best, candidate| match best {
        Some(b) if b.size_bytes >= candidate.size_bytes => Some(b),
        _ => Some(candidate),
    })
}

/// Page heading, trimmed. Empty headings count as absent.
pub fn extract_title(snapshot: &PageSnapshot) -> Option<String> {
    snapshot
        .heading
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Find the credit that follows `label` (e.g. "DIRECTOR").
///
/// Looks for the first text node equal to the label, reading its next
/// sibling or else whatever follows the label in its parent. Falls back to a
/// `LABEL <newline> name` search over the body text.
pub fn extract_author(snapshot: &PageSnapshot, label: &str) -> Option<String> {
    let label_pattern = regex::escape(label);

    if let Some(node) = snapshot
        .nodes
        .iter()
        .find(|n| n.text.trim().eq_ignore_ascii_case(label))
    {
        let from_sibling = node.next_sibling_text.as_deref().and_then(first_line);
        let from_parent = || {
            let splitter = Regex::new(&format!("(?i){}", label_pattern)).ok()?;
            let parent = node.parent_text.as_deref()?;
            let author = splitter.splitn(parent, 2).nth(1).and_then(first_line);
            author
        };
        if let Some(author) = from_sibling.or_else(from_parent) {
            return Some(author);
        }
    }

    let body_search = Regex::new(&format!(r"(?i){}\s*\n\s*(.+)", label_pattern)).ok()?;
    body_search
        .captures(&snapshot.body_text)
        .and_then(|caps| first_line(caps.get(1)?.as_str()))
}

/// First non-empty line of `text`, trimmed.
fn first_line(text: &str) -> Option<String> {
    text.trim()
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

/// Resolves item pages to downloadable media URLs.
pub struct MediaResolver {
    launcher: Arc<dyn SessionLauncher>,
    settings: ResolveSettings,
    size_floor: u64,
}

impl MediaResolver {
    pub fn new(launcher: Arc<dyn SessionLauncher>, settings: ResolveSettings, size_floor: u64) -> Self {
        Self {
            launcher,
            settings,
            size_floor,
        }
    }

    /// Resolve one page in a fresh browser session.
    ///
    /// Page-level failures land in [`ResolutionResult::error`]. Only a browser
    /// that cannot be launched is returned as `Err`.
    pub async fn resolve(&self, page_url: &str) -> Result<ResolutionResult, SessionError> {
        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e @ SessionError::Unavailable(_)) => return Err(e),
            Err(e) => {
                warn!("Could not open a page for {}: {}", page_url, e);
                return Ok(ResolutionResult::failed(format!("Error: {}", e)));
            }
        };

        let mut state = ResolveState::Loading;
        let outcome = self.drive(session.as_mut(), page_url, &mut state).await;
        session.close().await;

        match outcome {
            Ok(result) => {
                info!(
                    "Resolved {}: video={:?} author={}",
                    page_url, result.video_url, result.author
                );
                Ok(result)
            }
            Err(e) => {
                warn!("Resolution of {} failed in state {:?}: {}", page_url, state, e);
                Ok(ResolutionResult::failed(format!("Error: {}", e)))
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn PageSession,
        page_url: &str,
        state: &mut ResolveState,
    ) -> Result<ResolutionResult, SessionError> {
        if let Err(e) = session
            .navigate(page_url, self.settings.navigation_timeout())
            .await
        {
            *state = ResolveState::Failed;
            return Err(e);
        }
        session.wait(self.settings.post_load_wait()).await;

        let snapshot = match session.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("Page snapshot unavailable for {}: {}", page_url, e);
                PageSnapshot::default()
            }
        };
        let exact_title = extract_title(&snapshot);
        let author = extract_author(&snapshot, &self.settings.author_label)
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        *state = ResolveState::MetadataExtracted;

        match session.click_selector(&self.settings.play_selectors).await {
            Ok(true) => {
                debug!("Clicked play on {}, waiting for player", page_url);
                session.wait(self.settings.settle()).await;
            }
            Ok(false) => debug!("No visible play control on {}", page_url),
            Err(e) => {
                *state = ResolveState::Failed;
                return Err(e);
            }
        }

        let candidates: Vec<MediaCandidate> = session
            .take_responses()
            .iter()
            .filter_map(|r| {
                classify_response(r, &self.settings.video_url_markers, self.size_floor)
            })
            .collect();
        *state = ResolveState::CandidatesObserved;
        debug!("{} video candidates on {}", candidates.len(), page_url);

        let video_url = best_candidate(&candidates).map(|c| c.url.clone());
        *state = ResolveState::Resolved;

        Ok(ResolutionResult {
            video_url,
            author,
            exact_title,
            error: None,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ListingItem, TextNode};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    fn video(url: &str, size: u64) -> NetworkResponse {
        NetworkResponse {
            url: url.to_string(),
            content_type: Some("video/mp4".to_string()),
            content_length: Some(size),
        }
    }

    fn markers() -> Vec<String> {
        vec![".mp4".to_string()]
    }

    fn node(text: &str, sibling: Option<&str>, parent: Option<&str>) -> TextNode {
        TextNode {
            text: text.to_string(),
            next_sibling_text: sibling.map(str::to_string),
            parent_text: parent.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_requires_video_and_size() {
        let floor = 10 * MIB;
        assert!(classify_response(&video("https://cdn/a", 11 * MIB), &markers(), floor).is_some());
        assert!(classify_response(&video("https://cdn/a", 2 * MIB), &markers(), floor).is_none());
        assert!(classify_response(&video("https://cdn/a", floor), &markers(), floor).is_none());

        let by_url = NetworkResponse {
            url: "https://cdn/clip.MP4?token=1".to_string(),
            content_type: Some("application/octet-stream".to_string()),
            content_length: Some(20 * MIB),
        };
        assert!(classify_response(&by_url, &markers(), floor).is_some());

        let not_video = NetworkResponse {
            url: "https://cdn/bundle.js".to_string(),
            content_type: Some("application/javascript".to_string()),
            content_length: Some(20 * MIB),
        };
        assert!(classify_response(&not_video, &markers(), floor).is_none());

        let no_length = NetworkResponse {
            content_length: None,
            ..video("https://cdn/a.mp4", 0)
        };
        assert!(classify_response(&no_length, &markers(), floor).is_none());
    }

    #[test]
    fn test_ranking_picks_largest_above_floor() {
        let floor = 10 * MIB;
        let candidates: Vec<_> = [
            video("https://cdn/small.mp4", 2 * MIB),
            video("https://cdn/medium.mp4", 12 * MIB),
            video("https://cdn/large.mp4", 20 * MIB),
        ]
        .iter()
        .filter_map(|r| classify_response(r, &markers(), floor))
        .collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(best_candidate(&candidates).unwrap().url, "https://cdn/large.mp4");
    }

    #[test]
    fn test_ranking_ties_keep_first_seen() {
        let candidates = vec![
            MediaCandidate { url: "first".to_string(), size_bytes: 15 * MIB },
            MediaCandidate { url: "second".to_string(), size_bytes: 15 * MIB },
        ];
        assert_eq!(best_candidate(&candidates).unwrap().url, "first");
        assert!(best_candidate(&[]).is_none());
    }

    #[test]
    fn test_author_from_sibling() {
        let snapshot = PageSnapshot {
            nodes: vec![
                node("Credits", None, None),
                node(" Director ", Some("Jane Doe\nProduction: Acme"), None),
            ],
            ..Default::default()
        };
        assert_eq!(extract_author(&snapshot, "DIRECTOR").as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_author_from_parent_when_sibling_empty() {
        let snapshot = PageSnapshot {
            nodes: vec![node(
                "DIRECTOR",
                Some("   "),
                Some("Director\n  Karni & Saul\nAgency: Foo"),
            )],
            ..Default::default()
        };
        assert_eq!(extract_author(&snapshot, "DIRECTOR").as_deref(), Some("Karni & Saul"));
    }

    #[test]
    fn test_author_falls_back_to_body_search() {
        let snapshot = PageSnapshot {
            nodes: vec![node("Director: someone", None, None)],
            body_text: "Title\nDIRECTOR\n  Sam Brown \nEDITOR\nX".to_string(),
            ..Default::default()
        };
        assert_eq!(extract_author(&snapshot, "DIRECTOR").as_deref(), Some("Sam Brown"));
    }

    #[test]
    fn test_author_absent() {
        let snapshot = PageSnapshot {
            body_text: "No credits here".to_string(),
            ..Default::default()
        };
        assert_eq!(extract_author(&snapshot, "DIRECTOR"), None);
    }

    #[test]
    fn test_title_trimmed_and_empty_is_absent() {
        let mut snapshot = PageSnapshot {
            heading: Some("  Big Film \n".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_title(&snapshot).as_deref(), Some("Big Film"));
        snapshot.heading = Some("   ".to_string());
        assert_eq!(extract_title(&snapshot), None);
    }

    /// Scripted item page.
    #[derive(Clone, Default)]
    pub(crate) struct FakePage {
        pub fail_navigation: bool,
        pub fail_click: bool,
        pub snapshot: PageSnapshot,
        pub has_play: bool,
        /// Responses seen before play is pressed.
        pub on_load: Vec<NetworkResponse>,
        /// Responses seen after play is pressed.
        pub on_play: Vec<NetworkResponse>,
    }

    struct FakePageSession {
        page: FakePage,
        observed: Vec<NetworkResponse>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageSession for FakePageSession {
        async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError> {
            if self.page.fail_navigation {
                return Err(SessionError::NavigationTimeout {
                    url: url.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            self.observed.extend(self.page.on_load.clone());
            Ok(())
        }

        async fn wait(&mut self, _duration: Duration) {}

        async fn snapshot(&mut self) -> Result<PageSnapshot, SessionError> {
            Ok(self.page.snapshot.clone())
        }

        async fn listing_items(
            &mut self,
            _selectors: &[String],
        ) -> Result<Vec<ListingItem>, SessionError> {
            Ok(Vec::new())
        }

        async fn click_selector(&mut self, _selectors: &[String]) -> Result<bool, SessionError> {
            if self.page.fail_click {
                return Err(SessionError::Script("element detached".to_string()));
            }
            if self.page.has_play {
                self.observed.extend(self.page.on_play.clone());
            }
            Ok(self.page.has_play)
        }

        async fn click_text(&mut self, _label: &str) -> Result<bool, SessionError> {
            Ok(false)
        }

        fn take_responses(&mut self) -> Vec<NetworkResponse> {
            std::mem::take(&mut self.observed)
        }

        async fn close(self: Box<Self>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Launcher serving one scripted page.
    #[derive(Default)]
    pub(crate) struct FakePageLauncher {
        pub page: FakePage,
        pub unavailable: bool,
        pub tab_setup_fails: bool,
        pub closed: Arc<AtomicUsize>,
    }

    impl FakePageLauncher {
        pub fn single(page: FakePage) -> Self {
            Self {
                page,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SessionLauncher for FakePageLauncher {
        async fn launch(&self) -> Result<Box<dyn PageSession>, SessionError> {
            if self.unavailable {
                return Err(SessionError::Unavailable("no chrome".to_string()));
            }
            if self.tab_setup_fails {
                return Err(SessionError::Script("new_page failed".to_string()));
            }
            Ok(Box::new(FakePageSession {
                page: self.page.clone(),
                observed: Vec::new(),
                closed: self.closed.clone(),
            }))
        }
    }

    fn resolver(launcher: Arc<FakePageLauncher>) -> MediaResolver {
        MediaResolver::new(launcher, ResolveSettings::default(), 10 * MIB)
    }

    #[tokio::test]
    async fn test_resolve_lazy_player_picks_largest() {
        let launcher = Arc::new(FakePageLauncher::single(FakePage {
            snapshot: PageSnapshot {
                heading: Some("Deep Waters".to_string()),
                nodes: vec![node("DIRECTOR", Some("Karni & Saul"), None)],
                ..Default::default()
            },
            has_play: true,
            on_load: vec![video("https://cdn/trailer.mp4", 2 * MIB)],
            on_play: vec![
                video("https://cdn/720.mp4", 12 * MIB),
                video("https://cdn/1080.mp4", 20 * MIB),
            ],
            ..Default::default()
        }));

        let result = resolver(launcher.clone()).resolve("https://site/item").await.unwrap();
        assert_eq!(result.video_url.as_deref(), Some("https://cdn/1080.mp4"));
        assert_eq!(result.author, "Karni & Saul");
        assert_eq!(result.exact_title.as_deref(), Some("Deep Waters"));
        assert!(result.error.is_none());
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_without_candidates_is_not_an_error() {
        let launcher = Arc::new(FakePageLauncher::single(FakePage {
            on_load: vec![video("https://cdn/preview.mp4", 3 * MIB)],
            ..Default::default()
        }));

        let result = resolver(launcher.clone()).resolve("https://site/item").await.unwrap();
        assert!(result.video_url.is_none());
        assert!(result.error.is_none());
        assert_eq!(result.author, UNKNOWN_AUTHOR);
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_still_closes_session() {
        let launcher = Arc::new(FakePageLauncher::single(FakePage {
            fail_navigation: true,
            ..Default::default()
        }));

        let result = resolver(launcher.clone()).resolve("https://site/item").await.unwrap();
        assert!(result.error.is_some());
        assert!(result.error.unwrap().contains("timed out"));
        assert_eq!(result.author, UNKNOWN_AUTHOR);
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_click_failure_fails_item() {
        let launcher = Arc::new(FakePageLauncher::single(FakePage {
            fail_click: true,
            ..Default::default()
        }));

        let result = resolver(launcher.clone()).resolve("https://site/item").await.unwrap();
        assert!(result.error.is_some());
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unlaunchable_browser_is_err() {
        let launcher = Arc::new(FakePageLauncher {
            unavailable: true,
            ..Default::default()
        });
        let err = resolver(launcher).resolve("https://site/item").await.unwrap_err();
        assert!(matches!(err, SessionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_tab_setup_failure_fails_item_only() {
        let launcher = Arc::new(FakePageLauncher {
            tab_setup_fails: true,
            ..Default::default()
        });
        let result = resolver(launcher).resolve("https://site/item").await.unwrap();
        assert!(result.video_url.is_none());
        assert!(result.error.as_deref().unwrap().contains("new_page failed"));
    }
}
