use storyweave_core::timeline::datetime::{
    elapsed, elapsed_from_components, normalize, CanonicalDateTime, DateTimeError,
    DurationComponents,
};

fn canonical(text: &str) -> CanonicalDateTime {
    normalize(text).unwrap().unwrap()
}

#[test]
fn reference_dates_normalize_as_documented() {
    assert_eq!(normalize("BC 333-04-05").unwrap(), None);
    assert_eq!(normalize("33-04-05").unwrap(), None);
    assert_eq!(
        canonical("100-04-05 21:23:00").to_string(),
        "0100-04-05 21:23:00"
    );
    assert_eq!(canonical("1910-04-05").to_string(), "1910-04-05 00:00:00");
    assert_eq!(canonical("1910").to_string(), "1910-01-01 00:00:00");
}

#[test]
fn normalize_is_idempotent_across_the_year_range() {
    for text in [
        "100-01-01",
        "999-12-31 23:59:59",
        "1910-4-5 8:3",
        "2024-02-29T12:00:00",
        "9999-12-31 23:59",
    ] {
        let once = canonical(text);
        let twice = canonical(&once.to_string());
        assert_eq!(once, twice, "{text}");
    }
}

#[test]
fn malformed_dates_are_typed_errors() {
    assert!(matches!(
        normalize("yesterday"),
        Err(DateTimeError::InvalidFormat(_))
    ));
    assert!(matches!(
        normalize("2023-02-30"),
        Err(DateTimeError::InvalidFormat(_))
    ));
    assert!(matches!(
        normalize("2023-01-01 25:00"),
        Err(DateTimeError::InvalidFormat(_))
    ));
}

#[test]
fn elapsed_parts_stay_normalized() {
    let start = canonical("100-01-01");
    for end in ["100-01-01", "100-01-01 23:59", "5000-06-15 13:45", "9999-12-31 23:59:59"] {
        let value = elapsed(&start, &canonical(end));
        assert!(value.hours < 24, "{end}");
        assert!(value.minutes < 60, "{end}");
    }
    assert!(elapsed(&start, &start).is_zero());
}

#[test]
fn component_durations_follow_the_calendar() {
    let start = canonical("2023-01-31");
    let one_month = DurationComponents {
        months: 1,
        ..DurationComponents::default()
    };
    let value = elapsed_from_components(&start, &one_month).unwrap();
    assert_eq!((value.days, value.hours, value.minutes), (28, 0, 0));

    let long = DurationComponents {
        hours: 49,
        minutes: 61,
        ..DurationComponents::default()
    };
    let value = elapsed_from_components(&start, &long).unwrap();
    assert_eq!((value.days, value.hours, value.minutes), (2, 2, 1));
}
