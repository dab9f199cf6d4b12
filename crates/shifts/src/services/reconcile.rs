//! Merge of the two read tiers: the authoritative store and the advisory
//! local cache.
//!
//! Every active-shift read goes through [`reconcile`]. A station-wide store
//! observation always rewrites the cache. A per-employee store observation
//! only speaks for that employee, so without a shift it leaves the
//! system-wide entry alone. A cache observation never writes and is only
//! ever produced while offline.

use fuel_station_core::EmployeeId;

use crate::cache::{CacheKey, CachedActiveShift};
use crate::models::Shift;

/// Where an active-shift answer came from.
#[derive(Debug, Clone)]
pub enum Observation {
    /// Result of the station-wide store query.
    Store(Option<Shift>),
    /// Result of the per-employee store query, used when the station-wide
    /// query could not answer.
    Employee(Option<Shift>),
    /// Snapshot read from the local cache while offline.
    Cache(Option<CachedActiveShift>),
}

/// A single cache mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWrite {
    Set(CacheKey, Shift),
    Clear(CacheKey),
}

/// Outcome of merging an observation for one employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The open shift to report, if any.
    pub shift: Option<Shift>,
    /// Whether the answer speaks for the whole station.
    pub authoritative: bool,
    /// Cache mutations to apply, in order.
    pub writes: Vec<CacheWrite>,
}

/// Resolve the active shift as seen by `employee_id`.
///
/// A store answer with an open shift caches it system-wide, and under the
/// employee key only when the employee owns it (otherwise the employee's own
/// entry is stale and cleared). A store answer with no open shift clears
/// both keys. A per-employee answer with an open shift is still the
/// station's one open shift and is cached the same way; without one it only
/// clears the employee key. A cache answer is passed through untouched,
/// dropping anything that is not open.
#[must_use]
pub fn reconcile(employee_id: EmployeeId, observation: Observation) -> Resolution {
    let employee_key = CacheKey::Employee(employee_id);

    match observation {
        Observation::Store(Some(shift)) | Observation::Employee(Some(shift))
            if shift.is_open() =>
        {
            let own = if shift.is_owned_by(employee_id) {
                CacheWrite::Set(employee_key, shift.clone())
            } else {
                CacheWrite::Clear(employee_key)
            };
            Resolution {
                writes: vec![CacheWrite::Set(CacheKey::SystemWide, shift.clone()), own],
                shift: Some(shift),
                authoritative: true,
            }
        }
        Observation::Store(_) => Resolution {
            shift: None,
            authoritative: true,
            writes: vec![
                CacheWrite::Clear(CacheKey::SystemWide),
                CacheWrite::Clear(employee_key),
            ],
        },
        Observation::Employee(_) => Resolution {
            shift: None,
            authoritative: false,
            writes: vec![CacheWrite::Clear(employee_key)],
        },
        Observation::Cache(cached) => Resolution {
            shift: cached.map(|c| c.shift).filter(Shift::is_open),
            authoritative: false,
            writes: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fuel_station_core::{Money, ShiftId, ShiftStatus};

    fn shift(owner: i32, status: ShiftStatus) -> Shift {
        let now = Utc::now();
        Shift {
            id: ShiftId::new(1),
            employee_id: EmployeeId::new(owner),
            status,
            opening_cash: Money::ZERO,
            closing_cash: None,
            sales_total: Money::ZERO,
            staff_ids: vec![EmployeeId::new(owner)],
            start_time: now,
            end_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_own_open_shift_is_cached_under_both_keys() {
        let me = EmployeeId::new(1);
        let open = shift(1, ShiftStatus::Open);
        let resolution = reconcile(me, Observation::Store(Some(open.clone())));

        assert!(resolution.authoritative);
        assert_eq!(resolution.shift, Some(open.clone()));
        assert_eq!(
            resolution.writes,
            vec![
                CacheWrite::Set(CacheKey::SystemWide, open.clone()),
                CacheWrite::Set(CacheKey::Employee(me), open),
            ]
        );
    }

    #[test]
    fn test_other_employees_shift_clears_own_key() {
        let me = EmployeeId::new(1);
        let theirs = shift(2, ShiftStatus::Open);
        let resolution = reconcile(me, Observation::Store(Some(theirs.clone())));

        assert_eq!(resolution.shift, Some(theirs.clone()));
        assert_eq!(
            resolution.writes,
            vec![
                CacheWrite::Set(CacheKey::SystemWide, theirs),
                CacheWrite::Clear(CacheKey::Employee(me)),
            ]
        );
    }

    #[test]
    fn test_no_open_shift_clears_everything() {
        let me = EmployeeId::new(1);
        let resolution = reconcile(me, Observation::Store(None));

        assert!(resolution.shift.is_none());
        assert_eq!(
            resolution.writes,
            vec![
                CacheWrite::Clear(CacheKey::SystemWide),
                CacheWrite::Clear(CacheKey::Employee(me)),
            ]
        );
    }

    #[test]
    fn test_closed_shift_from_store_counts_as_none() {
        let resolution = reconcile(
            EmployeeId::new(1),
            Observation::Store(Some(shift(1, ShiftStatus::Closed))),
        );
        assert!(resolution.shift.is_none());
    }

    #[test]
    fn test_employee_miss_leaves_system_wide_entry() {
        let me = EmployeeId::new(1);
        let resolution = reconcile(me, Observation::Employee(None));

        assert!(!resolution.authoritative);
        assert!(resolution.shift.is_none());
        assert_eq!(
            resolution.writes,
            vec![CacheWrite::Clear(CacheKey::Employee(me))]
        );
    }

    #[test]
    fn test_employee_hit_is_the_station_shift() {
        let me = EmployeeId::new(1);
        let open = shift(1, ShiftStatus::Open);
        let resolution = reconcile(me, Observation::Employee(Some(open.clone())));

        assert!(resolution.authoritative);
        assert_eq!(
            resolution.writes,
            vec![
                CacheWrite::Set(CacheKey::SystemWide, open.clone()),
                CacheWrite::Set(CacheKey::Employee(me), open),
            ]
        );
    }

    #[test]
    fn test_cache_observation_never_writes() {
        let cached = CachedActiveShift::now(shift(1, ShiftStatus::Open));
        let resolution = reconcile(EmployeeId::new(1), Observation::Cache(Some(cached)));

        assert!(!resolution.authoritative);
        assert!(resolution.shift.is_some());
        assert!(resolution.writes.is_empty());
    }

    #[test]
    fn test_stale_closed_snapshot_is_ignored() {
        let cached = CachedActiveShift::now(shift(1, ShiftStatus::Closed));
        let resolution = reconcile(EmployeeId::new(1), Observation::Cache(Some(cached)));
        assert!(resolution.shift.is_none());
    }
}
