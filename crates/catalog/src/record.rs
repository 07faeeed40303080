//! Catalog event entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ticketforge_core::{CatalogEventId, Entity};

use crate::unit::PricingMode;

/// An event in the catalog (concert, festival, conference).
///
/// `pricing_mode` is fixed at creation and constrains which unit kinds its
/// ticket types expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: CatalogEventId,
    pub title: String,
    pub pricing_mode: PricingMode,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_published: bool,
}

impl EventRecord {
    pub fn new(
        id: CatalogEventId,
        title: impl Into<String>,
        pricing_mode: PricingMode,
        starts_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            pricing_mode,
            starts_at,
            ends_at: None,
            is_published: true,
        }
    }
}

impl Entity for EventRecord {
    type Id = CatalogEventId;

    fn id(&self) -> &CatalogEventId {
        &self.id
    }
}
