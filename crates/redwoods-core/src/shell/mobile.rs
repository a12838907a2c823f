use crate::models::Identity;

/// Initial unread counts before anything has been read.
const DEFAULT_NOTIFICATIONS: u32 = 3;
const DEFAULT_UNREAD_EMAILS: u32 = 5;
const DEFAULT_UNREAD_MESSAGES: u32 = 2;

/// Largest badge count shown as a number.
const MAX_BADGE: u32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MobileTab {
    #[default]
    Dashboard,
    Inbox,
    Chat,
    Settings,
}

impl MobileTab {
    pub const ALL: [MobileTab; 4] = [
        MobileTab::Dashboard,
        MobileTab::Inbox,
        MobileTab::Chat,
        MobileTab::Settings,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Inbox => "Inbox",
            Self::Chat => "Chat",
            Self::Settings => "Settings",
        }
    }
}

/// Tab bar and header state of the mobile shell.
#[derive(Debug, Clone)]
pub struct MobileShell {
    active: MobileTab,
    notifications: u32,
    unread_emails: u32,
    unread_messages: u32,
}

impl Default for MobileShell {
    fn default() -> Self {
        Self {
            active: MobileTab::Dashboard,
            notifications: DEFAULT_NOTIFICATIONS,
            unread_emails: DEFAULT_UNREAD_EMAILS,
            unread_messages: DEFAULT_UNREAD_MESSAGES,
        }
    }
}

impl MobileShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> MobileTab {
        self.active
    }

    /// Switch tabs. Opening Inbox or Chat marks its items as seen.
    pub fn select(&mut self, tab: MobileTab) {
        self.active = tab;
        match tab {
            MobileTab::Inbox => self.unread_emails = 0,
            MobileTab::Chat => self.unread_messages = 0,
            MobileTab::Dashboard | MobileTab::Settings => {}
        }
    }

    pub fn notifications(&self) -> u32 {
        self.notifications
    }

    pub fn add_notification(&mut self) {
        self.notifications += 1;
    }

    pub fn add_unread_email(&mut self) {
        self.unread_emails += 1;
    }

    pub fn add_unread_message(&mut self) {
        self.unread_messages += 1;
    }

    /// Badge count for a tab, if it carries one and it is non-zero.
    pub fn badge(&self, tab: MobileTab) -> Option<u32> {
        let count = match tab {
            MobileTab::Inbox => self.unread_emails,
            MobileTab::Chat => self.unread_messages,
            MobileTab::Dashboard | MobileTab::Settings => 0,
        };
        (count > 0).then_some(count)
    }

    pub fn badge_text(&self, tab: MobileTab) -> Option<String> {
        self.badge(tab).map(|count| {
            if count > MAX_BADGE {
                format!("{}+", MAX_BADGE)
            } else {
                count.to_string()
            }
        })
    }

    pub fn title(&self) -> &'static str {
        self.active.label()
    }

    pub fn greeting(&self, identity: Option<&Identity>) -> String {
        let name = identity
            .map(Identity::display_name)
            .unwrap_or_else(|| "User".to_string());
        format!("Welcome back, {}", name)
    }
}
