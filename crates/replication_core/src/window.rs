use chrono::{DateTime, TimeDelta, Utc};

/// Fixed cutoff for one replication pass.
///
/// The cutoff is taken once from the invocation time and reused for every
/// listing page, so a slow listing does not shift the window mid-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationWindow {
    invoked_at: DateTime<Utc>,
    cutoff: DateTime<Utc>,
}

impl ReplicationWindow {
    pub fn ending_at(invoked_at: DateTime<Utc>, lookback: TimeDelta) -> Self {
        let cutoff = invoked_at
            .checked_sub_signed(lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { invoked_at, cutoff }
    }

    pub fn ending_now(lookback: TimeDelta) -> Self {
        Self::ending_at(Utc::now(), lookback)
    }

    pub fn invoked_at(&self) -> DateTime<Utc> {
        self.invoked_at
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// Objects modified exactly at the cutoff are still inside the window.
    pub fn contains(&self, last_modified: DateTime<Utc>) -> bool {
        last_modified >= self.cutoff
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn invoked_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn cutoff_is_invocation_minus_lookback() {
        let window = ReplicationWindow::ending_at(invoked_at(), TimeDelta::hours(1));
        assert_eq!(
            window.cutoff(),
            Utc.with_ymd_and_hms(2026, 2, 14, 11, 0, 0).unwrap()
        );
        assert_eq!(window.invoked_at(), invoked_at());
    }

    #[test]
    fn boundary_instant_is_inside_window() {
        let window = ReplicationWindow::ending_at(invoked_at(), TimeDelta::hours(1));
        assert!(window.contains(window.cutoff()));
        assert!(!window.contains(window.cutoff() - TimeDelta::milliseconds(1)));
        assert!(window.contains(invoked_at() - TimeDelta::minutes(10)));
        assert!(!window.contains(invoked_at() - TimeDelta::hours(3)));
    }

    #[test]
    fn objects_stamped_after_invocation_are_inside_window() {
        let window = ReplicationWindow::ending_at(invoked_at(), TimeDelta::hours(1));
        assert!(window.contains(invoked_at() + TimeDelta::seconds(5)));
    }
}
