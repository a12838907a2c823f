//! Front-end shell state: which dashboard to show, which view is open,
//! and the mobile tab bar.
//!
//! Nothing here renders. The front ends ask these types what to show.

pub mod dashboard;
pub mod mobile;

pub use dashboard::{demo_identity, DashboardKind, DesktopShell, Screen, View};
pub use mobile::{MobileShell, MobileTab};
