use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::{
    host::{Browser, TabId, WindowId},
    utils::time::duration_seconds,
};

use super::site::{normalize, IgnoreList, Site};

/// How often the counter is forcefully updated when nothing happens in the browser.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Inputs the tracker reacts to. Every one of them ends with a recomputation of the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerInput {
    TabFocusChanged(TabId),
    /// The tab navigated. Ignored unless it's the tab being tracked.
    TabUrlChanged(TabId),
    /// OS focus moved to a window, `None` when it left the browser.
    WindowFocusChanged(Option<WindowId>),
    Tick,
}

/// Time that has to be booked for a site.
#[derive(Debug, Clone, PartialEq)]
pub struct Credit {
    pub site: Site,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSite {
    pub site: Site,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    /// Site being measured and the start of the measurement window. Only present while tracking
    /// isn't paused and a focused tab with a valid site was seen.
    pub active: Option<ActiveSite>,
    pub current_tab: Option<TabId>,
}

/// Everything the tracker needs to know about the world at the moment of an input.
pub struct Observation<'a, B: ?Sized> {
    pub browser: &'a B,
    pub ignored: &'a IgnoreList,
    pub paused: bool,
    pub now: DateTime<Utc>,
}

/// State machine attributing elapsed time to the site that was active during it.
///
/// Every recomputation re-stamps the active site, so a single missed update only loses the time
/// of that gap. Gaps longer than one and a half ticks (sleep, hibernation, a stalled timer) are
/// dropped instead of being credited.
#[derive(Debug)]
pub struct ActivityTracker {
    state: TrackerState,
    stale_after: chrono::Duration,
}

impl ActivityTracker {
    pub fn new(tick_interval: Duration) -> Self {
        let stale_after = tick_interval.saturating_add(tick_interval / 2);
        Self {
            state: TrackerState::default(),
            stale_after: chrono::Duration::from_std(stale_after)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Forgets the site being measured. The next recomputation starts a fresh window.
    pub fn suspend(&mut self) {
        self.state.active = None;
    }

    pub fn handle<B: Browser + ?Sized>(
        &mut self,
        input: TrackerInput,
        observation: &Observation<B>,
    ) -> Option<Credit> {
        match input {
            TrackerInput::TabFocusChanged(tab_id) => {
                debug!("Tab changed");
                self.state.current_tab = Some(tab_id);
            }
            TrackerInput::TabUrlChanged(tab_id) => {
                if self.state.current_tab != Some(tab_id) {
                    return None;
                }
                debug!("Tab updated");
            }
            TrackerInput::WindowFocusChanged(window_id) => {
                debug!("Detected window focus changed");
                if let Some(tab_id) =
                    window_id.and_then(|window_id| observation.browser.active_tab(window_id))
                {
                    self.state.current_tab = Some(tab_id);
                }
            }
            TrackerInput::Tick => {}
        }
        self.recompute(observation)
    }

    fn recompute<B: Browser + ?Sized>(&mut self, observation: &Observation<B>) -> Option<Credit> {
        if observation.paused {
            self.state.active = None;
            return None;
        }

        let tab_id = self.state.current_tab?;
        let Some(tab) = observation.browser.tab(tab_id) else {
            trace!("Tab {tab_id} is unknown");
            return None;
        };

        // Time of an unfocused window is never counted, even if its tab is the current one.
        if observation.browser.focused_window() != Some(tab.window_id) {
            return None;
        }

        let Some(site) = normalize(&tab.url, observation.ignored) else {
            debug!("Unable to update counter. Malformed or ignored url {}", tab.url);
            return None;
        };

        let previous = self.state.active.replace(ActiveSite {
            site,
            since: observation.now,
        })?;

        let delta = observation.now - previous.since;
        if delta < chrono::Duration::zero() || delta >= self.stale_after {
            debug!(
                "Delta of {} seconds for {} can't be measured; ignored",
                duration_seconds(delta),
                previous.site
            );
            return None;
        }

        if observation.ignored.contains(&previous.site) {
            return None;
        }

        Some(Credit {
            site: previous.site,
            seconds: duration_seconds(delta),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use crate::{
        daemon::processing::site::{site, IgnoreList},
        host::{MockBrowser, TabId, TabInfo, WindowId},
    };

    use super::{ActivityTracker, Credit, Observation, TrackerInput, DEFAULT_TICK_INTERVAL};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.from_utc_datetime(&TEST_START_DATE) + Duration::seconds(seconds)
    }

    /// Browser with one focused window whose only tab shows the url stored in the returned cell.
    fn single_tab_browser(url: &str) -> (MockBrowser, Arc<Mutex<String>>) {
        let url = Arc::new(Mutex::new(url.to_string()));
        let mut browser = MockBrowser::new();
        let tab_url = url.clone();
        browser.expect_tab().returning(move |tab_id: TabId| {
            (tab_id == 1).then(|| TabInfo {
                window_id: 1,
                url: tab_url.lock().unwrap().as_str().into(),
            })
        });
        browser.expect_focused_window().returning(|| Some(1));
        browser
            .expect_active_tab()
            .returning(|window_id: WindowId| (window_id == 1).then_some(1));
        (browser, url)
    }

    fn observe<'a>(
        browser: &'a MockBrowser,
        ignored: &'a IgnoreList,
        seconds: i64,
    ) -> Observation<'a, MockBrowser> {
        Observation {
            browser,
            ignored,
            paused: false,
            now: at(seconds),
        }
    }

    #[test]
    fn test_first_observation_books_nothing() {
        let (browser, _) = single_tab_browser("http://a.com/x");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        let credit = tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );

        assert_eq!(credit, None);
        let active = tracker.state().active.clone().unwrap();
        assert_eq!(active.site, site("http://a.com"));
        assert_eq!(active.since, at(0));
    }

    #[test]
    fn test_three_ticks_on_one_site() {
        let (browser, _) = single_tab_browser("http://a.com/");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );
        let total: f64 = [60, 120, 180]
            .into_iter()
            .filter_map(|t| tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, t)))
            .map(|credit| credit.seconds)
            .sum();

        assert!((total - 180.).abs() < 1e-9);
    }

    #[test]
    fn test_navigation_credits_previous_site() {
        let (browser, url) = single_tab_browser("http://a.com/");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );
        *url.lock().unwrap() = "http://b.com/page".into();

        let credit = tracker.handle(
            TrackerInput::TabUrlChanged(1),
            &observe(&browser, &ignored, 25),
        );
        assert_eq!(
            credit,
            Some(Credit {
                site: site("http://a.com"),
                seconds: 25.
            })
        );

        let credit = tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 45));
        assert_eq!(
            credit,
            Some(Credit {
                site: site("http://b.com"),
                seconds: 20.
            })
        );
    }

    #[test]
    fn test_suspended_window_is_not_credited() {
        let (browser, _) = single_tab_browser("http://a.com/");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );
        tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 60));

        // Paused at 70, resumed at 110. Nothing recomputed in between.
        tracker.suspend();
        assert_eq!(tracker.state().active, None);

        let credit = tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 120));
        assert_eq!(credit, None);
        assert_eq!(tracker.state().active.clone().unwrap().since, at(120));
    }

    #[test]
    fn test_url_change_of_other_tab_is_ignored() {
        let (browser, _) = single_tab_browser("http://a.com/");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );
        let credit = tracker.handle(
            TrackerInput::TabUrlChanged(7),
            &observe(&browser, &ignored, 30),
        );

        assert_eq!(credit, None);
        assert_eq!(tracker.state().active.clone().unwrap().since, at(0));
    }

    #[test]
    fn test_stale_delta_is_discarded_and_restamped() {
        let (browser, _) = single_tab_browser("http://a.com/");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );
        // Machine slept for an hour.
        let credit = tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 3600));
        assert_eq!(credit, None);
        assert_eq!(tracker.state().active.clone().unwrap().since, at(3600));

        // Exactly one and a half ticks is already too long.
        let credit = tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 3690));
        assert_eq!(credit, None);

        let credit = tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 3750));
        assert_eq!(credit.map(|c| c.seconds), Some(60.));
    }

    #[test]
    fn test_backwards_clock_is_discarded() {
        let (browser, _) = single_tab_browser("http://a.com/");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 100),
        );
        let credit = tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 40));
        assert_eq!(credit, None);
    }

    #[test]
    fn test_pause_forgets_active_site() {
        let (browser, _) = single_tab_browser("http://a.com/");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );
        let paused = Observation {
            paused: true,
            ..observe(&browser, &ignored, 30)
        };
        assert_eq!(tracker.handle(TrackerInput::Tick, &paused), None);
        assert_eq!(tracker.state().active, None);

        // After resuming the first observation only re-establishes the measurement window.
        assert_eq!(
            tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 50)),
            None
        );
        assert_eq!(
            tracker
                .handle(TrackerInput::Tick, &observe(&browser, &ignored, 80))
                .map(|c| c.seconds),
            Some(30.)
        );
    }

    #[test]
    fn test_unfocused_window_is_not_counted() {
        let mut browser = MockBrowser::new();
        browser.expect_tab().returning(|_| {
            Some(TabInfo {
                window_id: 2,
                url: "http://a.com/".into(),
            })
        });
        browser.expect_focused_window().returning(|| Some(1));
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(5),
            &observe(&browser, &ignored, 0),
        );

        assert_eq!(tracker.state().current_tab, Some(5));
        assert_eq!(tracker.state().active, None);
    }

    #[test]
    fn test_window_focus_resolves_active_tab() {
        let mut browser = MockBrowser::new();
        browser
            .expect_active_tab()
            .returning(|window_id| (window_id == 3).then_some(30));
        browser.expect_tab().returning(|tab_id| {
            (tab_id == 30).then(|| TabInfo {
                window_id: 3,
                url: "https://c.org/".into(),
            })
        });
        browser.expect_focused_window().returning(|| Some(3));
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::WindowFocusChanged(Some(3)),
            &observe(&browser, &ignored, 0),
        );

        assert_eq!(tracker.state().current_tab, Some(30));
        assert_eq!(
            tracker.state().active.clone().map(|a| a.site),
            Some(site("https://c.org"))
        );
    }

    #[test]
    fn test_malformed_url_keeps_previous_state() {
        let (browser, url) = single_tab_browser("http://a.com/");
        let ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );
        *url.lock().unwrap() = "about:blank".into();
        let credit = tracker.handle(
            TrackerInput::TabUrlChanged(1),
            &observe(&browser, &ignored, 20),
        );

        assert_eq!(credit, None);
        let active = tracker.state().active.clone().unwrap();
        assert_eq!(active.site, site("http://a.com"));
        assert_eq!(active.since, at(0));
    }

    #[test]
    fn test_ignored_site_is_never_credited() {
        let (browser, url) = single_tab_browser("http://b.com/x");
        let mut ignored = IgnoreList::default();
        let mut tracker = ActivityTracker::new(DEFAULT_TICK_INTERVAL);

        tracker.handle(
            TrackerInput::TabFocusChanged(1),
            &observe(&browser, &ignored, 0),
        );
        ignored.push(site("http://b.com"));

        assert_eq!(
            tracker.handle(TrackerInput::Tick, &observe(&browser, &ignored, 30)),
            None
        );

        *url.lock().unwrap() = "http://a.com/".into();
        assert_eq!(
            tracker.handle(
                TrackerInput::TabUrlChanged(1),
                &observe(&browser, &ignored, 50)
            ),
            None
        );
        assert_eq!(
            tracker
                .handle(TrackerInput::Tick, &observe(&browser, &ignored, 60))
                .map(|c| c.site),
            Some(site("http://a.com"))
        );
    }
}
