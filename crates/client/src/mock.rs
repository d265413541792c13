//! Sample admin data for offline previews.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Utc};
use skin_one_core::{Stage, UserId};

use crate::models::{AdminMetrics, AdminUserSummary, DailyCount};

/// Daily classification counts for the last seven days, oldest first.
const DAILY_COUNTS: [u64; 7] = [12, 7, 15, 9, 18, 4, 11];

/// Dashboard metrics used when mock data is enabled.
///
/// Fixed apart from the dates, which are anchored on `now`.
#[must_use]
pub fn sample_metrics(now: DateTime<Utc>) -> AdminMetrics {
    let per_stage = [
        (Stage::Estagio1, 40),
        (Stage::Estagio2, 25),
        (Stage::Estagio3, 15),
        (Stage::Estagio4, 5),
        (Stage::NaoClassificavel, 3),
        (Stage::Dtpi, 2),
    ];
    let classifications_per_category: BTreeMap<String, u64> = per_stage
        .into_iter()
        .map(|(stage, count)| (stage.as_str().to_string(), count))
        .collect();

    let today = now.date_naive();
    let daily = DAILY_COUNTS
        .iter()
        .zip((0..7_u64).rev())
        .filter_map(|(&count, days_ago)| {
            today
                .checked_sub_days(Days::new(days_ago))
                .map(|date| DailyCount { date, count })
        })
        .collect();

    AdminMetrics {
        total_users: 3,
        total_images: 120,
        classified_images_count: 90,
        unclassified_images_count: 30,
        classifications_per_category,
        classifications_by_user: vec![
            summary("1", "Dr. A", "a@a.com", 50, Some(now)),
            summary("2", "Dr. B", "b@b.com", 25, None),
            summary("3", "Dra. C", "c@c.com", 15, None),
        ],
        daily_classifications: Some(daily),
    }
}

fn summary(
    id: &str,
    name: &str,
    email: &str,
    classification_count: u64,
    last_active: Option<DateTime<Utc>>,
) -> AdminUserSummary {
    AdminUserSummary {
        id: UserId::new(id),
        name: name.to_string(),
        email: email.to_string(),
        classification_count,
        last_active,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    #[test]
    fn test_sample_metrics() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let metrics = sample_metrics(now);

        assert_eq!(metrics.total_images, 120);
        assert_eq!(
            metrics.classified_images_count + metrics.unclassified_images_count,
            metrics.total_images
        );
        assert_eq!(metrics.classifications_per_category.len(), Stage::ALL.len());
        assert_eq!(metrics.classifications_per_category["nao_classificavel"], 3);
        assert_eq!(metrics.classifications_by_user[0].last_active, Some(now));

        let daily = metrics.daily_classifications.unwrap();
        assert_eq!(daily.len(), 7);
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(daily[6].date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert!(daily.iter().all(|d| (1..=20).contains(&d.count)));
    }

    #[test]
    fn test_sample_metrics_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(sample_metrics(now), sample_metrics(now));
    }
}
