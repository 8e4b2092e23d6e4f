use std::sync::Mutex;

use chrono::NaiveDate;

/// A response cache that holds at most one value, valid for a single UTC
/// day. Keeps paid-API endpoints from being re-invoked on every poll; the
/// value is recomputed on the first request of each day.
#[derive(Debug, Default)]
pub struct DailyCache<T> {
    inner: Mutex<Option<(NaiveDate, T)>>,
}

impl<T: Clone> DailyCache<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// The cached value, if one was stored for `today`.
    pub fn get(&self, today: NaiveDate) -> Option<T> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match &*guard {
            Some((date, value)) if *date == today => Some(value.clone()),
            _ => None,
        }
    }

    /// Replace the cached value, stamping it with `today`.
    pub fn store(&self, today: NaiveDate, value: T) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some((today, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_cache_misses() {
        let cache: DailyCache<String> = DailyCache::new();
        assert!(cache.get(day(2026, 8, 30)).is_none());
    }

    #[test]
    fn same_day_hits() {
        let cache = DailyCache::new();
        cache.store(day(2026, 8, 30), 42u32);
        assert_eq!(cache.get(day(2026, 8, 30)), Some(42));
    }

    #[test]
    fn next_day_misses_and_overwrites() {
        let cache = DailyCache::new();
        cache.store(day(2026, 8, 30), "old".to_string());
        assert!(cache.get(day(2026, 8, 31)).is_none());
        cache.store(day(2026, 8, 31), "new".to_string());
        assert_eq!(cache.get(day(2026, 8, 31)).as_deref(), Some("new"));
        assert!(cache.get(day(2026, 8, 30)).is_none());
    }
}
