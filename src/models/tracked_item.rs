use crate::models::{ItemState, generate_id};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameter on the product URL that carries the product id used to
/// scope availability capture.
pub const PRODUCT_ID_PARAM: &str = "v1";

/// How long an item sits out after the site's bot defense blocks a probe.
pub const ACCESS_DENIED_COOLDOWN_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedItem {
    pub id: String,
    pub url: String,
    /// Wanted size, uppercased free text. Kept as text on purpose: a size
    /// outside the canonical vocabulary must probe as "not offered", not
    /// fail at creation.
    pub target_size: String,
    pub state: ItemState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrackedItem {
    pub url: String,
    pub size: String,
}

impl TrackedItem {
    pub fn new(new_item: NewTrackedItem) -> Self {
        Self {
            id: generate_id(),
            url: new_item.url,
            target_size: new_item.size.trim().to_uppercase(),
            state: ItemState::Pending,
            cooldown_until: None,
            notified_at: None,
            created_at: Utc::now(),
        }
    }

    /// Product id parsed from the URL's query parameter, if present.
    pub fn product_id(&self) -> Option<String> {
        Self::product_id_of(&self.url)
    }

    pub fn product_id_of(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        parsed
            .query_pairs()
            .find(|(key, _)| key == PRODUCT_ID_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    /// Whether a poll cycle at `now` should probe this item. Notified items
    /// are excluded permanently; cooldown items only until the deadline.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            ItemState::Notified => false,
            ItemState::Cooldown => match self.cooldown_until {
                Some(until) => now >= until,
                None => true,
            },
            ItemState::Pending => true,
        }
    }

    pub fn begin_cooldown(&mut self, now: DateTime<Utc>) {
        self.state = ItemState::Cooldown;
        self.cooldown_until = Some(now + Duration::milliseconds(ACCESS_DENIED_COOLDOWN_MS));
    }

    pub fn mark_notified(&mut self, now: DateTime<Utc>) {
        self.state = ItemState::Notified;
        self.notified_at = Some(now);
    }
}
