use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Czech public holidays. Dates outside these years are never holidays.
const TABLE: &[(&str, &str)] = &[
    ("2024-01-01", "New Year's Day"),
    ("2024-03-29", "Good Friday"),
    ("2024-04-01", "Easter Monday"),
    ("2024-05-01", "Labour Day"),
    ("2024-05-08", "Liberation Day"),
    ("2024-07-05", "Saints Cyril and Methodius Day"),
    ("2024-07-06", "Jan Hus Day"),
    ("2024-09-28", "Statehood Day"),
    ("2024-10-28", "Independent Czechoslovak State Day"),
    ("2024-11-17", "Struggle for Freedom and Democracy Day"),
    ("2024-12-24", "Christmas Eve"),
    ("2024-12-25", "Christmas Day"),
    ("2024-12-26", "St. Stephen's Day"),

    ("2025-01-01", "New Year's Day"),
    ("2025-04-18", "Good Friday"),
    ("2025-04-21", "Easter Monday"),
    ("2025-05-01", "Labour Day"),
    ("2025-05-08", "Liberation Day"),
    ("2025-07-05", "Saints Cyril and Methodius Day"),
    ("2025-07-06", "Jan Hus Day"),
    ("2025-09-28", "Statehood Day"),
    ("2025-10-28", "Independent Czechoslovak State Day"),
    ("2025-11-17", "Struggle for Freedom and Democracy Day"),
    ("2025-12-24", "Christmas Eve"),
    ("2025-12-25", "Christmas Day"),
    ("2025-12-26", "St. Stephen's Day"),

    ("2026-01-01", "New Year's Day"),
    ("2026-04-03", "Good Friday"),
    ("2026-04-06", "Easter Monday"),
    ("2026-05-01", "Labour Day"),
    ("2026-05-08", "Liberation Day"),
    ("2026-07-05", "Saints Cyril and Methodius Day"),
    ("2026-07-06", "Jan Hus Day"),
    ("2026-09-28", "Statehood Day"),
    ("2026-10-28", "Independent Czechoslovak State Day"),
    ("2026-11-17", "Struggle for Freedom and Democracy Day"),
    ("2026-12-24", "Christmas Eve"),
    ("2026-12-25", "Christmas Day"),
    ("2026-12-26", "St. Stephen's Day"),

    ("2027-01-01", "New Year's Day"),
    ("2027-03-26", "Good Friday"),
    ("2027-03-29", "Easter Monday"),
    ("2027-05-01", "Labour Day"),
    ("2027-05-08", "Liberation Day"),
    ("2027-07-05", "Saints Cyril and Methodius Day"),
    ("2027-07-06", "Jan Hus Day"),
    ("2027-09-28", "Statehood Day"),
    ("2027-10-28", "Independent Czechoslovak State Day"),
    ("2027-11-17", "Struggle for Freedom and Democracy Day"),
    ("2027-12-24", "Christmas Eve"),
    ("2027-12-25", "Christmas Day"),
    ("2027-12-26", "St. Stephen's Day"),
];

static HOLIDAYS: LazyLock<HashMap<NaiveDate, &'static str>> = LazyLock::new(|| {
    TABLE
        .iter()
        .filter_map(|(date, title)| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .map(|d| (d, *title))
        })
        .collect()
});

pub fn lookup(date: NaiveDate) -> Option<&'static str> {
    HOLIDAYS.get(&date).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_row_parses() {
        assert_eq!(HOLIDAYS.len(), TABLE.len());
    }

    #[test]
    fn finds_movable_feasts() {
        let good_friday = NaiveDate::from_ymd_opt(2025, 4, 18).unwrap();
        assert_eq!(lookup(good_friday), Some("Good Friday"));
    }

    #[test]
    fn years_outside_table_are_plain_days() {
        let christmas = NaiveDate::from_ymd_opt(2030, 12, 25).unwrap();
        assert_eq!(lookup(christmas), None);
    }
}
