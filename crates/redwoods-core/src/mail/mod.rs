//! Inbox list logic: search, sort, selection and flags over an in-memory
//! mailbox.
//!
//! Messages are not fetched from anywhere; the front ends seed a
//! [`Mailbox`] with [`Mailbox::demo`] or their own records.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    pub sender: Sender,
    pub subject: String,
    pub preview: String,
    #[serde(default)]
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub folder: String,
}

impl Email {
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Case-insensitive match against subject, sender name or preview.
    /// An empty query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        [&self.subject, &self.sender.name, &self.preview]
            .iter()
            .any(|field| field.to_lowercase().contains(&query))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Date,
    Sender,
    Subject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

impl SortKey {
    fn compare(&self, a: &Email, b: &Email) -> Ordering {
        match self {
            Self::Date => a.timestamp.cmp(&b.timestamp),
            Self::Sender => cmp_text(&a.sender.name, &b.sender.name),
            Self::Subject => cmp_text(&a.subject, &b.subject),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    emails: Vec<Email>,
    selected: BTreeSet<String>,
}

impl Mailbox {
    pub fn new(emails: Vec<Email>) -> Self {
        Self {
            emails,
            selected: BTreeSet::new(),
        }
    }

    pub fn emails(&self) -> &[Email] {
        &self.emails
    }

    pub fn get(&self, id: &str) -> Option<&Email> {
        self.emails.iter().find(|email| email.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Email> {
        self.emails.iter_mut().find(|email| email.id == id)
    }

    /// Emails matching `query`, sorted. Ties keep their stored order.
    pub fn visible(&self, query: &str, key: SortKey, order: SortOrder) -> Vec<&Email> {
        let mut emails: Vec<&Email> = self.emails.iter().filter(|e| e.matches(query)).collect();
        emails.sort_by(|a, b| {
            let ordering = key.compare(a, b);
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
        emails
    }

    /// Returns false when no email has that id.
    pub fn toggle_star(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(email) => {
                email.is_starred = !email.is_starred;
                true
            }
            None => false,
        }
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(email) => {
                email.is_read = true;
                true
            }
            None => false,
        }
    }

    pub fn toggle_selection(&mut self, id: &str) {
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    /// Delete every selected email and clear the selection.
    /// Returns how many emails were removed.
    pub fn delete_selected(&mut self) -> usize {
        let before = self.emails.len();
        let selected = std::mem::take(&mut self.selected);
        self.emails.retain(|email| !selected.contains(&email.id));
        before - self.emails.len()
    }

    pub fn unread_count(&self) -> usize {
        self.emails.iter().filter(|email| !email.is_read).count()
    }

    /// A small inbox of sample messages, dated relative to `now`.
    pub fn demo(now: DateTime<Utc>) -> Self {
        fn sample(
            id: &str,
            (name, address): (&str, &str),
            subject: &str,
            preview: &str,
            timestamp: DateTime<Utc>,
            (is_read, is_starred): (bool, bool),
            labels: &[&str],
        ) -> Email {
            Email {
                id: id.to_string(),
                sender: Sender {
                    name: name.to_string(),
                    email: address.to_string(),
                    avatar: None,
                },
                subject: subject.to_string(),
                preview: preview.to_string(),
                body: String::new(),
                timestamp,
                is_read,
                is_starred,
                attachments: Vec::new(),
                labels: labels.iter().map(|l| l.to_string()).collect(),
                folder: "inbox".to_string(),
            }
        }

        let mut emails = vec![
            sample(
                "email-1",
                ("John Doe", "john.doe@example.com"),
                "Meeting Tomorrow",
                "Hi, just confirming our meeting tomorrow at 10 AM.",
                now - Duration::minutes(30),
                (false, true),
                &["important", "work"],
            ),
            sample(
                "email-2",
                ("Sarah Wilson", "sarah.wilson@company.com"),
                "Project Update",
                "The latest project milestone has been completed.",
                now - Duration::hours(2),
                (true, false),
                &["work", "project"],
            ),
            sample(
                "email-3",
                ("Newsletter Team", "newsletter@techblog.com"),
                "Weekly Tech Newsletter",
                "This week in tech: framework releases and industry insights.",
                now - Duration::hours(24),
                (true, false),
                &["newsletter"],
            ),
            sample(
                "email-4",
                ("Travel Bookings", "bookings@travel.example"),
                "Flight Confirmation - JFK to SFO",
                "Your flight booking has been confirmed.",
                now - Duration::hours(96),
                (false, true),
                &["travel", "important"],
            ),
        ];
        emails[0].attachments.push(Attachment {
            id: "att-1".to_string(),
            name: "meeting-agenda.pdf".to_string(),
            size: 245_000,
            mime_type: "application/pdf".to_string(),
        });
        emails[3].attachments.push(Attachment {
            id: "att-2".to_string(),
            name: "boarding-pass.pdf".to_string(),
            size: 89_000,
            mime_type: "application/pdf".to_string(),
        });
        Self::new(emails)
    }
}
