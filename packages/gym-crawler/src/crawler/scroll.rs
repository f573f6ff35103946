//! Progressive scrolling until lazily inserted iframes stop appearing.

use tracing::{debug, info, warn};

use crate::traits::browser::PageDriver;
use crate::types::config::ScrollConfig;

/// How a scroll pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    /// Iframe counts taken.
    pub steps: u32,
    /// Last distinct iframe count observed.
    pub frame_count: usize,
    /// Stopped early on a stable, non-zero count.
    pub stabilized: bool,
}

/// Scroll by `step_px` until the iframe count holds for `stable_checks`
/// consecutive checks, or `max_steps` is reached.
///
/// A page with no iframes at all scrolls to the cap. Browser errors end the
/// pass with whatever count was seen so far.
pub async fn scroll_until_frames_stable(page: &dyn PageDriver, config: &ScrollConfig) -> ScrollOutcome {
    let mut last_count = 0usize;
    let mut stable = 0u32;
    let mut outcome = ScrollOutcome {
        steps: 0,
        frame_count: 0,
        stabilized: false,
    };

    for step in 1..=config.max_steps {
        let count = match page.count_elements("iframe").await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to count iframes, stopping scroll");
                break;
            }
        };
        outcome.steps = step;
        debug!(step, max = config.max_steps, iframes = count, "Scroll check");

        if count == last_count {
            stable += 1;
        } else {
            stable = 0;
            last_count = count;
        }

        if stable >= config.stable_checks && count > 0 {
            info!(iframes = count, steps = step, "Iframe count stabilized");
            outcome.stabilized = true;
            break;
        }

        if let Err(e) = page.scroll_by(config.step_px).await {
            warn!(error = %e, "Scroll failed, stopping");
            break;
        }
        tokio::time::sleep(config.pause).await;
    }

    outcome.frame_count = last_count;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPage;
    use std::time::Duration;

    fn fast() -> ScrollConfig {
        ScrollConfig::default().with_pause(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_stops_once_count_is_stable() {
        let page = MockPage::new("<html></html>").with_iframe_counts(vec![0, 1, 2, 2, 2, 2, 5]);
        let outcome = scroll_until_frames_stable(&page, &fast()).await;

        assert!(outcome.stabilized);
        assert_eq!(outcome.frame_count, 2);
        assert_eq!(outcome.steps, 6);
        assert_eq!(page.scrolls(), 5);
    }

    #[tokio::test]
    async fn test_runs_to_cap_without_iframes() {
        let page = MockPage::new("<html></html>");
        let outcome = scroll_until_frames_stable(&page, &fast().with_max_steps(7)).await;

        assert!(!outcome.stabilized);
        assert_eq!(outcome.frame_count, 0);
        assert_eq!(outcome.steps, 7);
        assert_eq!(page.scrolls(), 7);
    }
}
