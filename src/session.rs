use crate::catalog::{self, ANYWHERE, DEFAULT_THEME};
use crate::error::ProfileError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

pub const NAME_MAX_CHARS: usize = 40;
pub const ORIGIN_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TravelProfile {
    pub name: String,
    pub origin: String,
    pub theme: String,
    pub region: String,
    pub destination: String,
    pub destination_specific: String,
    pub trip_length_days: u32,
    pub budget_usd: u32,
    pub adults: u32,
    pub children: u32,
    pub visited_before: bool,
    pub notes: String,
}

impl Default for TravelProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            origin: String::new(),
            theme: DEFAULT_THEME.into(),
            region: ANYWHERE.into(),
            destination: ANYWHERE.into(),
            destination_specific: String::new(),
            trip_length_days: 14,
            budget_usd: 5000,
            adults: 2,
            children: 0,
            visited_before: false,
            notes: String::new(),
        }
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ProfileError> {
    if value < min || value > max {
        return Err(ProfileError::OutOfRange { field, min, max, value });
    }
    Ok(())
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ProfileError> {
    if value.chars().count() > max {
        return Err(ProfileError::TooLong { field, max });
    }
    Ok(())
}

impl TravelProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        check_len("name", &self.name, NAME_MAX_CHARS)?;
        check_len("origin", &self.origin, ORIGIN_MAX_CHARS)?;
        if !catalog::is_theme(&self.theme) {
            return Err(ProfileError::UnknownTheme(self.theme.clone()));
        }
        let destinations = catalog::destinations_for(&self.region)
            .ok_or_else(|| ProfileError::UnknownRegion(self.region.clone()))?;
        if !destinations.iter().any(|d| *d == self.destination) {
            return Err(ProfileError::UnknownDestination {
                region: self.region.clone(),
                destination: self.destination.clone(),
            });
        }
        check_range("trip_length_days", self.trip_length_days, 1, 30)?;
        check_range("budget_usd", self.budget_usd, 500, 25_000)?;
        if self.budget_usd % 500 != 0 {
            return Err(ProfileError::OffStep { field: "budget_usd", step: 500, value: self.budget_usd });
        }
        check_range("adults", self.adults, 1, 10)?;
        check_range("children", self.children, 0, 10)?;
        Ok(())
    }

    /// Applies a partial update and validates the result; the profile is left
    /// untouched when validation fails.
    pub fn apply_patch(&mut self, patch: ProfilePatch) -> Result<(), ProfileError> {
        let mut next = self.clone();
        if let Some(v) = patch.name {
            next.name = v;
        }
        if let Some(v) = patch.origin {
            next.origin = v;
        }
        if let Some(v) = patch.theme {
            next.theme = v;
        }
        if let Some(region) = patch.region {
            if region != next.region && patch.destination.is_none() {
                let fallback = catalog::default_destination(&region)
                    .ok_or_else(|| ProfileError::UnknownRegion(region.clone()))?;
                next.destination = fallback.to_string();
            }
            next.region = region;
        }
        if let Some(v) = patch.destination {
            next.destination = v;
        }
        if let Some(v) = patch.destination_specific {
            next.destination_specific = v;
        }
        if let Some(v) = patch.trip_length_days {
            next.trip_length_days = v;
        }
        if let Some(v) = patch.budget_usd {
            next.budget_usd = v;
        }
        if let Some(v) = patch.adults {
            next.adults = v;
        }
        if let Some(v) = patch.children {
            next.children = v;
        }
        if let Some(v) = patch.visited_before {
            next.visited_before = v;
        }
        if let Some(v) = patch.notes {
            next.notes = v;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn visited_before_text(&self) -> &'static str {
        if self.visited_before {
            "They have visited this destination before."
        } else {
            "They have not visited this destination before."
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub theme: Option<String>,
    pub region: Option<String>,
    pub destination: Option<String>,
    pub destination_specific: Option<String>,
    pub trip_length_days: Option<u32>,
    pub budget_usd: Option<u32>,
    pub adults: Option<u32>,
    pub children: Option<u32>,
    pub visited_before: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    Chatting,
    ChatComplete,
    SummaryShown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub profile: TravelProfile,
    pub messages: Vec<ChatMessage>,
    pub user_message_count: u32,
    pub setup_complete: bool,
    pub chat_complete: bool,
    pub summary_shown: bool,
    pub summary: Option<String>,
}

impl Session {
    pub fn new(profile: TravelProfile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: now,
            profile,
            messages: Vec::new(),
            user_message_count: 0,
            setup_complete: false,
            chat_complete: false,
            summary_shown: false,
            summary: None,
        }
    }

    pub fn stage(&self) -> Stage {
        if self.summary_shown {
            Stage::SummaryShown
        } else if self.chat_complete {
            Stage::ChatComplete
        } else if self.setup_complete {
            Stage::Chatting
        } else {
            Stage::Setup
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Transcript without the leading system prompt.
    pub fn visible_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_start_in_setup() {
        let s = Session::new(TravelProfile::default());
        assert!(s.profile.validate().is_ok());
        assert_eq!(s.stage(), Stage::Setup);
        assert!(s.messages.is_empty());
        assert_eq!(s.user_message_count, 0);
    }

    #[test]
    fn stage_follows_flags() {
        let mut s = Session::new(TravelProfile::default());
        s.setup_complete = true;
        assert_eq!(s.stage(), Stage::Chatting);
        s.chat_complete = true;
        assert_eq!(s.stage(), Stage::ChatComplete);
        s.summary_shown = true;
        assert_eq!(s.stage(), Stage::SummaryShown);
    }

    #[test]
    fn validation_enforces_widget_bounds() {
        let mut p = TravelProfile::default();
        p.trip_length_days = 31;
        assert_eq!(
            p.validate(),
            Err(ProfileError::OutOfRange { field: "trip_length_days", min: 1, max: 30, value: 31 })
        );

        let mut p = TravelProfile::default();
        p.budget_usd = 4250;
        assert!(matches!(p.validate(), Err(ProfileError::OffStep { .. })));

        let mut p = TravelProfile::default();
        p.adults = 0;
        assert!(matches!(p.validate(), Err(ProfileError::OutOfRange { field: "adults", .. })));

        let mut p = TravelProfile::default();
        p.name = "x".repeat(41);
        assert_eq!(p.validate(), Err(ProfileError::TooLong { field: "name", max: 40 }));

        let mut p = TravelProfile::default();
        p.region = "Europe".into();
        p.destination = "Chile".into();
        assert!(matches!(p.validate(), Err(ProfileError::UnknownDestination { .. })));
    }

    #[test]
    fn patch_is_all_or_nothing() {
        let mut p = TravelProfile::default();
        let bad = ProfilePatch { name: Some("Ana".into()), children: Some(11), ..Default::default() };
        assert!(p.apply_patch(bad).is_err());
        assert_eq!(p, TravelProfile::default());

        let good = ProfilePatch {
            name: Some("Ana".into()),
            region: Some("South America".into()),
            destination: Some("Chile".into()),
            ..Default::default()
        };
        p.apply_patch(good).unwrap();
        assert_eq!(p.name, "Ana");
        assert_eq!(p.destination, "Chile");
    }

    #[test]
    fn region_change_resets_destination() {
        let mut p = TravelProfile::default();
        p.apply_patch(ProfilePatch { region: Some("Oceania".into()), ..Default::default() }).unwrap();
        assert_eq!(p.destination, "Australia");
    }

    #[test]
    fn visited_before_sentence_tracks_flag() {
        let mut p = TravelProfile::default();
        assert_eq!(p.visited_before_text(), "They have not visited this destination before.");
        p.visited_before = true;
        assert_eq!(p.visited_before_text(), "They have visited this destination before.");
    }

    #[test]
    fn visible_messages_skip_system() {
        let mut s = Session::new(TravelProfile::default());
        s.messages.push(ChatMessage::system("prompt"));
        s.messages.push(ChatMessage::assistant("hi"));
        let visible: Vec<_> = s.visible_messages().collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].role, Role::Assistant);
    }
}
