use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub topic: String,
    pub description: String,
    pub venue: String,
    /// Display time of day, e.g. "19:30".
    pub time: String,
    pub date: NaiveDate,
    pub category: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating an event.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub topic: String,
    pub description: String,
    pub venue: String,
    pub time: String,
    pub date: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewEvent {
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("topic", &self.topic),
            ("description", &self.description),
            ("venue", &self.venue),
            ("time", &self.time),
            ("category", &self.category),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("Field '{}' is required", field));
            }
        }

        Ok(())
    }

    pub fn into_event(self) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            topic: self.topic.trim().to_string(),
            description: self.description,
            venue: self.venue,
            time: self.time,
            date: self.date,
            category: self.category,
            image: self.image,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdate {
    pub topic: Option<String>,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub time: Option<String>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub image: Option<String>,
}

impl EventUpdate {
    pub fn validate(&self) -> Result<(), String> {
        let present = [
            ("topic", &self.topic),
            ("description", &self.description),
            ("venue", &self.venue),
            ("time", &self.time),
            ("category", &self.category),
        ];

        for (field, value) in present {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(format!("Field '{}' cannot be empty", field));
            }
        }

        Ok(())
    }

    pub fn apply(self, event: &mut Event) {
        if let Some(topic) = self.topic {
            event.topic = topic.trim().to_string();
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(venue) = self.venue {
            event.venue = venue;
        }
        if let Some(time) = self.time {
            event.time = time;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(category) = self.category {
            event.category = category;
        }
        if let Some(image) = self.image {
            event.image = Some(image);
        }
        event.updated_at = Utc::now();
    }
}

/// Query-string filter for event listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub category: Option<String>,
    /// Case-insensitive substring match on topic, venue and description.
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(category) = &self.category {
            if !event.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }

        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = [&event.topic, &event.venue, &event.description]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if self.from.is_some_and(|from| event.date < from) {
            return false;
        }

        !self.to.is_some_and(|to| event.date > to)
    }
}

/// An event as seen by one viewer, with their favorite flag resolved.
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub favorite: bool,
}
