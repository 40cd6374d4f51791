//! Contains the boundary with the browser that launches the daemon.
//! [Browser] is the query surface the activity tracker relies on, [mirror::BrowserMirror] is the
//! implementation fed by host messages and [protocol] describes those messages.

pub mod mirror;
pub mod protocol;

use std::sync::Arc;

pub type TabId = i64;
pub type WindowId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    /// Window the tab currently belongs to.
    pub window_id: WindowId,
    /// Full url of the tab. For example `https://example.com/some/page?query=1`
    pub url: Arc<str>,
}

/// Intended to serve as a contract every host environment must implement.
#[cfg_attr(test, mockall::automock)]
pub trait Browser {
    fn tab(&self, tab_id: TabId) -> Option<TabInfo>;

    /// Window that has OS-level focus, `None` when focus is outside of the browser.
    fn focused_window(&self) -> Option<WindowId>;

    /// Tab that is selected inside of a window.
    fn active_tab(&self, window_id: WindowId) -> Option<TabId>;
}
