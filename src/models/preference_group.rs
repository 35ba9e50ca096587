use chrono::DateTime;
use rust_decimal::Decimal;

use crate::protocol::preferences::PreferenceSettings;

/// A named set of computing preferences.
///
/// `user_id == None` marks a global group. At most one global group and at
/// most one group per user carry `is_default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceGroup {
    pub id: i32,
    pub user_id: Option<i32>,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub settings: PreferenceSettings,
    pub created_at: String,
    pub updated_at: String,
}

impl PreferenceGroup {
    /// Seconds since the epoch of the last modification, as sent in
    /// `<mod_time>`. Unparseable timestamps report zero.
    #[must_use]
    pub fn mod_time(&self) -> Decimal {
        DateTime::parse_from_rfc3339(&self.updated_at)
            .map(|ts| Decimal::from(ts.timestamp()))
            .unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.user_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(updated_at: &str) -> PreferenceGroup {
        PreferenceGroup {
            id: 1,
            user_id: None,
            name: "Default".into(),
            description: String::new(),
            is_default: true,
            settings: PreferenceSettings::default(),
            created_at: updated_at.into(),
            updated_at: updated_at.into(),
        }
    }

    #[test]
    fn test_mod_time_is_epoch_seconds() {
        assert_eq!(
            group("2023-11-14T22:13:20+00:00").mod_time(),
            Decimal::from(1_700_000_000)
        );
        assert_eq!(group("yesterday").mod_time(), Decimal::ZERO);
    }
}
