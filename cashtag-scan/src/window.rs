use chrono::{DateTime, TimeDelta, Utc};

/// `[start, end)` bounds of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The `lookback_days` days ending at `now`.
    ///
    /// ```
    /// use cashtag_scan::TimeWindow;
    /// use chrono::{TimeZone, Utc};
    ///
    /// let now = Utc.with_ymd_and_hms(2021, 2, 8, 12, 0, 0).unwrap();
    /// let window = TimeWindow::lookback(7, now);
    /// assert_eq!(window.end, now);
    /// assert_eq!(window.end_epoch() - window.start_epoch(), 7 * 86_400);
    /// ```
    pub fn lookback(lookback_days: u32, now: DateTime<Utc>) -> Self {
        let start = TimeDelta::try_days(i64::from(lookback_days))
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end: now }
    }

    pub fn ending_now(lookback_days: u32) -> Self {
        Self::lookback(lookback_days, Utc::now())
    }

    pub fn start_epoch(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_epoch(&self) -> i64 {
        self.end.timestamp()
    }

    /// `yymmdd_yymmdd`, the compact label used in output file names.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}",
            self.start.format("%y%m%d"),
            self.end.format("%y%m%d")
        )
    }
}
