use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::availability::Availability;
use super::booking::ServiceType;

/// Read-only view of a professional's profile as the booking core needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professional {
    pub id: String,
    pub display_name: String,
    pub hourly_rate: f64,
    pub services: Vec<ServiceType>,
    /// Weekly template JSON; `None` means no bookable hours declared.
    pub availability: Option<String>,
    pub timezone: String,
    pub phone: Option<String>,
}

impl Professional {
    pub fn offers(&self, service: ServiceType) -> bool {
        self.services.contains(&service)
    }

    /// Declared service timezone, UTC when unset or unrecognised.
    pub fn tz(&self) -> Tz {
        match self.timezone.trim() {
            "" => Tz::UTC,
            name => name.parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!(professional_id = %self.id, timezone = name, "unknown timezone, using UTC");
                Tz::UTC
            }),
        }
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.tz()).naive_local()
    }

    pub fn weekly_template(&self) -> anyhow::Result<Availability> {
        match self.availability.as_deref() {
            Some(json) => Availability::from_json(json),
            None => Ok(Availability::default()),
        }
    }

    /// `hourly_rate * duration / 60`, rounded to cents.
    pub fn estimate_cost(&self, duration_minutes: i64) -> f64 {
        let raw = self.hourly_rate * duration_minutes as f64 / 60.0;
        (raw * 100.0).round() / 100.0
    }
}
