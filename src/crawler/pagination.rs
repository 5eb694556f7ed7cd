//! Listing pagination
//!
//! Moves the main page from one listing page to the next by clicking the
//! configured next button. Each attempt walks
//! `ButtonCheck -> Click -> AwaitNavigationOrAjax -> AwaitContainer -> Decide`;
//! a failed attempt cools down, reloads, and starts over until the retry
//! budget runs out.

use crate::browser::BrowserPage;
use crate::config::{CrawlerConfig, SourceConfig};
use crate::state::StopReason;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempts per advance before giving up
pub const MAX_ATTEMPTS: u32 = 3;

/// Waits and limits shared by pagination and detail extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTimings {
    /// How long a click may take to start a navigation
    pub navigation_timeout: Duration,
    /// How long a container may take to render
    pub container_timeout: Duration,
    /// How long a full page load may take
    pub page_load_timeout: Duration,
    /// Pause before reloading after a failed attempt
    pub retry_cooldown: Duration,
    pub max_attempts: u32,
}

impl CrawlTimings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            container_timeout: Duration::from_millis(config.container_timeout_ms),
            page_load_timeout: Duration::from_millis(config.page_load_timeout_ms),
            retry_cooldown: Duration::from_millis(config.retry_cooldown_ms),
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Zero waits, for driving scripted pages
    pub fn immediate() -> Self {
        Self {
            navigation_timeout: Duration::ZERO,
            container_timeout: Duration::ZERO,
            page_load_timeout: Duration::from_secs(5),
            retry_cooldown: Duration::ZERO,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl Default for CrawlTimings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Why pagination did not move to another page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotAdvancedReason {
    /// No next-button selector configured
    NoSelector,
    ButtonMissing,
    ButtonHidden,
    ButtonDisabled,
    /// Every attempt failed
    RetriesExhausted,
}

impl NotAdvancedReason {
    /// Stop reason a run records for this outcome
    pub fn stop_reason(&self) -> StopReason {
        match self {
            Self::NoSelector | Self::ButtonMissing | Self::ButtonHidden | Self::ButtonDisabled => {
                StopReason::NoNextButton
            }
            Self::RetriesExhausted => StopReason::PaginationFailed,
        }
    }
}

/// Outcome of one [`PaginationController::advance`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Now on a new listing page
    Advanced { url: String },
    NotAdvanced(NotAdvancedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    ButtonCheck,
    Click,
    AwaitNavigationOrAjax,
    AwaitContainer,
    Decide,
}

/// Drives the next button of one source on one page
pub struct PaginationController<'a> {
    page: &'a dyn BrowserPage,
    source: &'a SourceConfig,
    timings: &'a CrawlTimings,
}

impl<'a> PaginationController<'a> {
    pub fn new(page: &'a dyn BrowserPage, source: &'a SourceConfig, timings: &'a CrawlTimings) -> Self {
        Self {
            page,
            source,
            timings,
        }
    }

    /// Tries to reach the next listing page; never returns an error
    pub async fn advance(&self) -> AdvanceOutcome {
        let Some(selector) = self.source.next_button_selector() else {
            return AdvanceOutcome::NotAdvanced(NotAdvancedReason::NoSelector);
        };

        let start_url = self.page.current_url().await.unwrap_or_default();
        let settle = self
            .source
            .pagination
            .as_ref()
            .map(|p| Duration::from_secs_f64(p.delay_seconds.max(0.0)))
            .unwrap_or(Duration::ZERO);

        let mut attempt = 1;
        let mut step = Step::ButtonCheck;

        loop {
            let next = match step {
                Step::ButtonCheck => match self.page.element_state(selector).await {
                    Ok(None) => {
                        return AdvanceOutcome::NotAdvanced(NotAdvancedReason::ButtonMissing)
                    }
                    Ok(Some(state)) if !state.visible => {
                        return AdvanceOutcome::NotAdvanced(NotAdvancedReason::ButtonHidden)
                    }
                    Ok(Some(state)) if state.is_disabled() => {
                        return AdvanceOutcome::NotAdvanced(NotAdvancedReason::ButtonDisabled)
                    }
                    Ok(Some(_)) => Ok(Step::Click),
                    Err(e) => Err(format!("checking next button: {}", e)),
                },

                Step::Click => match self.page.click(selector).await {
                    Ok(()) => Ok(Step::AwaitNavigationOrAjax),
                    Err(e) => Err(format!("clicking next button: {}", e)),
                },

                Step::AwaitNavigationOrAjax => {
                    if let Err(e) = self
                        .page
                        .wait_for_navigation(self.timings.navigation_timeout)
                        .await
                    {
                        debug!("No navigation after click ({}); waiting for in-place update", e);
                    }
                    if !settle.is_zero() {
                        tokio::time::sleep(settle).await;
                    }
                    Ok(Step::AwaitContainer)
                }

                Step::AwaitContainer => match self
                    .page
                    .wait_for_selector(&self.source.container_selector, self.timings.container_timeout)
                    .await
                {
                    Ok(()) => Ok(Step::Decide),
                    Err(e) => Err(format!("waiting for listing container: {}", e)),
                },

                Step::Decide => match self.page.current_url().await {
                    Ok(url) if url != start_url => {
                        info!("Advanced to {}", url);
                        return AdvanceOutcome::Advanced { url };
                    }
                    Ok(url) => Err(format!("page did not change ({})", url)),
                    Err(e) => Err(format!("reading page URL: {}", e)),
                },
            };

            step = match next {
                Ok(step) => step,
                Err(reason) => {
                    warn!(
                        "Pagination attempt {}/{} failed: {}",
                        attempt, self.timings.max_attempts, reason
                    );
                    if attempt >= self.timings.max_attempts {
                        return AdvanceOutcome::NotAdvanced(NotAdvancedReason::RetriesExhausted);
                    }
                    attempt += 1;
                    self.recover().await;
                    Step::ButtonCheck
                }
            };
        }
    }

    async fn recover(&self) {
        if !self.timings.retry_cooldown.is_zero() {
            tokio::time::sleep(self.timings.retry_cooldown).await;
        }
        if let Err(e) = self.page.reload(self.timings.page_load_timeout).await {
            warn!("Reload before pagination retry failed: {}", e);
        }
    }
}
