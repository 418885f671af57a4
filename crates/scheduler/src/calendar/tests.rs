//! Tests for the next-fire calculator.

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
    use svctimer_core::TimerError;

    use crate::calendar::{days_in_month, is_due, is_leap_year, next_fire_at, until_next_fire};
    use crate::rule::RecurrenceRule;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .unwrap_or_else(|e| panic!("bad timestamp {s}: {e}"))
    }

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    /// Instants every 5h17m across a few years, hitting every time of day and weekday.
    fn sweep() -> impl Iterator<Item = NaiveDateTime> {
        let start = at("2023-01-01T00:00:00");
        (0..6_000).map(move |i| start + Duration::minutes(317 * i))
    }

    // -- end-to-end scenarios ----------------------------------------------

    #[test]
    fn daily_before_trigger_fires_today() {
        let rule = RecurrenceRule::daily(vec![hms(9, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-03-01T08:00:00")).unwrap(),
            at("2024-03-01T09:00:00")
        );
    }

    #[test]
    fn daily_after_trigger_rolls_to_tomorrow() {
        let rule = RecurrenceRule::daily(vec![hms(9, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-03-01T09:30:00")).unwrap(),
            at("2024-03-02T09:00:00")
        );
    }

    #[test]
    fn month_31_skips_february() {
        let rule = RecurrenceRule::monthly(31, vec![hms(0, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-01-31T00:00:01")).unwrap(),
            at("2024-03-31T00:00:00")
        );
    }

    #[test]
    fn last_day_of_leap_february() {
        // Input 1 normalizes to offset 0: the real last day, Feb 29 in 2024.
        let rule = RecurrenceRule::last_day_of_month(1, vec![]).unwrap();
        assert_eq!(rule.day_seq(), 0);
        assert_eq!(
            next_fire_at(&rule, at("2024-02-01T00:00:00")).unwrap(),
            at("2024-02-29T00:00:00")
        );
    }

    // -- tie-breaks ---------------------------------------------------------

    #[test]
    fn exact_trigger_instant_counts_as_passed() {
        let rule = RecurrenceRule::daily(vec![hms(9, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-03-01T09:00:00")).unwrap(),
            at("2024-03-02T09:00:00")
        );
        let sub_second = at("2024-03-01T08:59:59") + Duration::milliseconds(999);
        assert_eq!(next_fire_at(&rule, sub_second).unwrap(), at("2024-03-01T09:00:00"));
    }

    #[test]
    fn multiple_times_pick_next_remaining_today() {
        let rule = RecurrenceRule::daily(vec![hms(18, 0, 0), hms(9, 0, 0), hms(12, 30, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-03-01T10:00:00")).unwrap(),
            at("2024-03-01T12:30:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-03-01T12:30:00")).unwrap(),
            at("2024-03-01T18:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-03-01T19:00:00")).unwrap(),
            at("2024-03-02T09:00:00")
        );
    }

    #[test]
    fn future_day_uses_earliest_time() {
        // 2024-03-05 is a Tuesday; the rule fires Wednesdays.
        let rule = RecurrenceRule::weekly(3, vec![hms(9, 0, 0), hms(18, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-03-05T10:00:00")).unwrap(),
            at("2024-03-06T09:00:00")
        );
    }

    // -- week ---------------------------------------------------------------

    #[test]
    fn week_today_before_and_after_time() {
        // 2024-03-03 is a Sunday.
        let rule = RecurrenceRule::weekly(0, vec![hms(9, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-03-03T08:00:00")).unwrap(),
            at("2024-03-03T09:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-03-03T09:00:00")).unwrap(),
            at("2024-03-10T09:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-03-09T23:59:59")).unwrap(),
            at("2024-03-10T09:00:00")
        );
    }

    #[test]
    fn week_always_lands_on_weekday_in_future() {
        for weekday in 0..7 {
            let rule = RecurrenceRule::weekly(weekday, vec![hms(7, 15, 0), hms(20, 0, 0)]).unwrap();
            for t in sweep() {
                let next = next_fire_at(&rule, t).unwrap();
                assert!(next > t, "weekday {weekday}: {next} not after {t}");
                assert_eq!(next.weekday().num_days_from_sunday(), weekday as u32);
                assert!(next - t <= Duration::days(7), "weekday {weekday}: {next} too far from {t}");
            }
        }
    }

    // -- month --------------------------------------------------------------

    #[test]
    fn month_day_before_and_after() {
        let rule = RecurrenceRule::monthly(15, vec![hms(6, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-03-10T12:00:00")).unwrap(),
            at("2024-03-15T06:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-03-16T00:00:00")).unwrap(),
            at("2024-04-15T06:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-12-20T00:00:00")).unwrap(),
            at("2025-01-15T06:00:00")
        );
    }

    #[test]
    fn month_short_current_month_is_skipped() {
        let rule = RecurrenceRule::monthly(30, vec![]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2023-02-10T00:00:00")).unwrap(),
            at("2023-03-30T00:00:00")
        );
    }

    #[test]
    fn month_late_days_never_land_in_short_months() {
        for day in 29..=31 {
            let rule = RecurrenceRule::monthly(day, vec![hms(12, 0, 0)]).unwrap();
            for t in sweep() {
                let next = next_fire_at(&rule, t).unwrap();
                assert!(next > t);
                assert_eq!(next.day(), day as u32);
                assert!(days_in_month(next.year(), next.month()) >= day as u32);
            }
        }
    }

    // -- year ---------------------------------------------------------------

    #[test]
    fn year_ordinal() {
        let rule = RecurrenceRule::yearly(60, vec![hms(8, 0, 0)]).unwrap();
        // Day 60 is Feb 29 in a leap year and Mar 1 otherwise.
        assert_eq!(
            next_fire_at(&rule, at("2024-01-01T00:00:00")).unwrap(),
            at("2024-02-29T08:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-02-29T08:00:00")).unwrap(),
            at("2025-03-01T08:00:00")
        );
    }

    #[test]
    fn year_day_366_waits_for_leap_year() {
        let rule = RecurrenceRule::yearly(366, vec![]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2025-06-01T00:00:00")).unwrap(),
            at("2028-12-31T00:00:00")
        );
    }

    // -- date ---------------------------------------------------------------

    #[test]
    fn date_this_year_or_next() {
        let rule = RecurrenceRule::date(8, 12, vec![hms(10, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2024-03-01T00:00:00")).unwrap(),
            at("2024-08-12T10:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-08-12T10:00:00")).unwrap(),
            at("2025-08-12T10:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2024-08-12T09:00:00")).unwrap(),
            at("2024-08-12T10:00:00")
        );
    }

    #[test]
    fn feb_29_only_fires_in_leap_years() {
        let rule = RecurrenceRule::date(2, 29, vec![]).unwrap();
        let mut t = at("1890-01-01T00:00:00");
        let mut previous: Option<i32> = None;
        while t.year() < 2110 {
            let next = next_fire_at(&rule, t).unwrap();
            assert!(is_leap_year(next.year()));
            assert_eq!((next.month(), next.day()), (2, 29));
            if let Some(prev) = previous {
                let gap = next.year() - prev;
                assert!(gap == 4 || gap == 8, "gap {gap} after {prev}");
            }
            previous = Some(next.year());
            t = next;
        }
        // 1896 -> 1904 and 2096 -> 2104 skip the century years.
        assert_eq!(
            next_fire_at(&rule, at("1896-03-01T00:00:00")).unwrap(),
            at("1904-02-29T00:00:00")
        );
    }

    #[test]
    fn feb_29_past_calendar_range_is_unresolvable() {
        let rule = RecurrenceRule::date(2, 29, vec![]).unwrap();
        let end = NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap();
        assert!(matches!(next_fire_at(&rule, end), Err(TimerError::Unresolvable(_))));
    }

    // -- last day of month --------------------------------------------------

    #[test]
    fn last_day_offsets() {
        // Input 3 -> two days before the last day.
        let rule = RecurrenceRule::last_day_of_month(3, vec![hms(23, 0, 0)]).unwrap();
        assert_eq!(
            next_fire_at(&rule, at("2023-02-01T00:00:00")).unwrap(),
            at("2023-02-26T23:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2023-02-26T23:00:00")).unwrap(),
            at("2023-03-29T23:00:00")
        );
        assert_eq!(
            next_fire_at(&rule, at("2023-12-30T00:00:00")).unwrap(),
            at("2024-01-29T23:00:00")
        );
    }

    #[test]
    fn last_day_always_in_future_and_on_target() {
        let rule = RecurrenceRule::last_day_of_month(0, vec![hms(5, 0, 0), hms(17, 0, 0)]).unwrap();
        for t in sweep() {
            let next = next_fire_at(&rule, t).unwrap();
            assert!(next > t);
            assert_eq!(next.day(), days_in_month(next.year(), next.month()));
        }
    }

    // -- interval and is_due ------------------------------------------------

    #[test]
    fn interval_adds_period() {
        let rule = RecurrenceRule::interval(
            std::time::Duration::from_secs(90),
            std::time::Duration::ZERO,
        )
        .unwrap();
        let now = at("2024-03-01T08:00:00");
        assert!(is_due(&rule, now));
        assert_eq!(next_fire_at(&rule, now).unwrap(), at("2024-03-01T08:01:30"));
        assert_eq!(until_next_fire(&rule, now).unwrap(), std::time::Duration::from_secs(90));
    }

    #[test]
    fn is_due_matches_day_and_second() {
        let rule = RecurrenceRule::monthly(1, vec![hms(9, 0, 0)]).unwrap();
        assert!(is_due(&rule, at("2024-03-01T09:00:00")));
        assert!(is_due(&rule, at("2024-03-01T09:00:00") + Duration::milliseconds(400)));
        assert!(!is_due(&rule, at("2024-03-01T09:00:01")));
        assert!(!is_due(&rule, at("2024-03-02T09:00:00")));

        let last = RecurrenceRule::last_day_of_month(0, vec![]).unwrap();
        assert!(is_due(&last, at("2024-02-29T00:00:00")));
        assert!(!is_due(&last, at("2023-02-28T00:00:01")));
        assert!(is_due(&last, at("2023-02-28T00:00:00")));
    }

    #[test]
    fn is_due_is_pure() {
        let rule = RecurrenceRule::weekly(5, vec![hms(9, 0, 0)]).unwrap();
        for t in sweep().take(500) {
            let first = is_due(&rule, t);
            assert_eq!(first, is_due(&rule, t));
            assert_eq!(first, is_due(&rule, t));
        }
    }

    #[test]
    fn until_next_fire_is_positive() {
        let rule = RecurrenceRule::daily(vec![hms(9, 0, 0)]).unwrap();
        let wait = until_next_fire(&rule, at("2024-03-01T08:59:00")).unwrap();
        assert_eq!(wait, std::time::Duration::from_secs(60));
    }
}
