use std::collections::HashMap;

use tracing::trace;

use super::{protocol::HostEvent, Browser, TabId, TabInfo, WindowId};

/// Mirror of the browser state assembled from [HostEvent]s. The host only pushes changes, so the
/// mirror is what answers the tracker's questions about tabs and windows.
#[derive(Debug, Default)]
pub struct BrowserMirror {
    tabs: HashMap<TabId, TabInfo>,
    active_tabs: HashMap<WindowId, TabId>,
    focused_window: Option<WindowId>,
}

impl BrowserMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &HostEvent) {
        trace!("Applying {event:?} to browser mirror");
        match event {
            HostEvent::TabActivated {
                tab_id,
                window_id,
                url,
            } => {
                self.tabs.insert(
                    *tab_id,
                    TabInfo {
                        window_id: *window_id,
                        url: url.as_str().into(),
                    },
                );
                self.active_tabs.insert(*window_id, *tab_id);
            }
            HostEvent::TabUpdated {
                tab_id,
                window_id,
                url,
            } => {
                self.tabs.insert(
                    *tab_id,
                    TabInfo {
                        window_id: *window_id,
                        url: url.as_str().into(),
                    },
                );
            }
            HostEvent::TabRemoved { tab_id } => {
                self.tabs.remove(tab_id);
                self.active_tabs.retain(|_, active| active != tab_id);
            }
            HostEvent::WindowFocusChanged { window_id } => {
                self.focused_window = *window_id;
            }
            HostEvent::IdleStateChanged { .. } => {}
        }
    }
}

impl Browser for BrowserMirror {
    fn tab(&self, tab_id: TabId) -> Option<TabInfo> {
        self.tabs.get(&tab_id).cloned()
    }

    fn focused_window(&self) -> Option<WindowId> {
        self.focused_window
    }

    fn active_tab(&self, window_id: WindowId) -> Option<TabId> {
        self.active_tabs.get(&window_id).copied()
    }
}
