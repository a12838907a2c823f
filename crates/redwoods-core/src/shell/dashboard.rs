use crate::auth::SessionState;
use crate::models::{AccountType, Identity};

/// Dashboard variants, one per account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardKind {
    Organization,
    Developer,
    Freelancer,
    Ngo,
    Government,
    Institution,
    Religious,
    Healthcare,
    Startup,
}

impl DashboardKind {
    pub fn for_account(account: AccountType) -> Self {
        match account {
            AccountType::Organization => Self::Organization,
            AccountType::Developer => Self::Developer,
            AccountType::Freelancer => Self::Freelancer,
            AccountType::Ngo => Self::Ngo,
            AccountType::Government => Self::Government,
            AccountType::Institution => Self::Institution,
            AccountType::Religious => Self::Religious,
            AccountType::Healthcare => Self::Healthcare,
            AccountType::Startup => Self::Startup,
        }
    }

    pub fn for_identity(identity: &Identity) -> Self {
        Self::for_account(identity.account_type())
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Organization => "Organization Dashboard",
            Self::Developer => "Developer Dashboard",
            Self::Freelancer => "Freelancer Dashboard",
            Self::Ngo => "NGO Dashboard",
            Self::Government => "Government Dashboard",
            Self::Institution => "Institution Dashboard",
            Self::Religious => "Religious Organization Dashboard",
            Self::Healthcare => "Healthcare Dashboard",
            Self::Startup => "Startup Dashboard",
        }
    }
}

/// A view inside the desktop shell, selected by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Inbox,
    Compose,
    EmailViewer,
    Settings,
    /// Any path without a view yet; carries the display title.
    ComingSoon(String),
}

impl View {
    pub fn from_path(path: &str) -> Self {
        match path {
            "/dashboard" => Self::Dashboard,
            "/inbox" => Self::Inbox,
            "/compose" => Self::Compose,
            "/email-viewer" => Self::EmailViewer,
            "/settings" => Self::Settings,
            other => Self::ComingSoon(coming_soon_title(other)),
        }
    }
}

/// `/calendar` becomes `Calendar`.
fn coming_soon_title(path: &str) -> String {
    let name = path.strip_prefix('/').unwrap_or(path);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// What the desktop shell shows right now.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// The store has not finished its first lookup.
    Loading,
    Ready {
        identity: Identity,
        /// No signed-in identity; showing the demo identity instead.
        demo: bool,
        view: View,
    },
}

/// The identity shown when nobody is signed in.
pub fn demo_identity() -> Identity {
    let mut identity = Identity::new("user_123", "user@example.com");
    identity.name = Some("John Doe".to_string());
    identity.metadata.name = Some("John Doe".to_string());
    identity.metadata.user_type = Some(AccountType::Organization.tag().to_string());
    identity
}

#[derive(Debug, Clone)]
pub struct DesktopShell {
    current_path: String,
    sidebar_open: bool,
}

impl Default for DesktopShell {
    fn default() -> Self {
        Self {
            current_path: "/dashboard".to_string(),
            sidebar_open: false,
        }
    }
}

impl DesktopShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
    }

    pub fn close_sidebar(&mut self) {
        self.sidebar_open = false;
    }

    /// Switch views. Always closes the sidebar.
    pub fn navigate(&mut self, path: &str) {
        self.current_path = path.to_string();
        self.sidebar_open = false;
    }

    pub fn view(&self) -> View {
        View::from_path(&self.current_path)
    }

    pub fn screen(&self, session: &SessionState) -> Screen {
        if session.loading {
            return Screen::Loading;
        }
        let (identity, demo) = match &session.identity {
            Some(identity) => (identity.clone(), false),
            None => (demo_identity(), true),
        };
        Screen::Ready {
            identity,
            demo,
            view: self.view(),
        }
    }
}
