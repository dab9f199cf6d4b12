//! Several tills racing on one shared store.
//!
//! Whatever the interleaving, the store never holds more than one open
//! shift, and a refused begin names who holds the open one.

use std::sync::Arc;

use tokio::sync::Barrier;

use fuel_station_core::{EmployeeId, Money, ShiftStatus};
use fuel_station_integration_tests::Station;
use fuel_station_shifts::services::{ShiftError, ShiftOwner};
use fuel_station_shifts::store::StoreOperation;

// =============================================================================
// Concurrent Begin
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_begins_open_exactly_one_shift() {
    let station = Station::new();
    let tills: Vec<_> = (1..=8)
        .map(|id| station.till(id, &format!("Employee {id}")))
        .collect();
    let barrier = Arc::new(Barrier::new(tills.len()));

    let handles: Vec<_> = tills
        .iter()
        .map(|till| {
            let manager = Arc::clone(&till.manager);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                manager.begin(Money::from_minor(10_000), None).await
            })
        })
        .collect();

    let mut opened = Vec::new();
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(shift) => opened.push(shift),
            Err(ShiftError::ActiveShiftExists { .. }) => refused += 1,
            Err(other) => panic!("unexpected begin failure: {other}"),
        }
    }

    assert_eq!(opened.len(), 1);
    assert_eq!(refused, 7);
    assert_eq!(station.store.open_shift_count(), 1);
    assert_eq!(station.store.shifts().len(), 1);
}

#[tokio::test]
async fn test_blind_checks_refuse_begin_without_inserting() {
    let station = Station::new();
    let e1 = station.till(1, "Ana");
    let e2 = station.till(2, "Rui");

    let winner = e1.manager.begin(Money::ZERO, None).await.unwrap();

    // E2's system-wide check and re-check both fail. Finding nothing for E2
    // alone cannot rule out E1's shift, so E2 never reaches the insert.
    station.store.fail_next(StoreOperation::FindOpenShift, 2);
    let err = e2.manager.begin(Money::ZERO, None).await.unwrap_err();

    assert!(matches!(err, ShiftError::ExistenceUnverified(_)));
    assert!(err.is_network());
    assert_eq!(station.store.calls(StoreOperation::InsertShift), 1);
    assert_eq!(station.store.open_shift_count(), 1);
    assert!(e2.manager.active_shift().is_none());

    // Once the store answers again the refusal names the holder.
    let err = e2.manager.begin(Money::ZERO, None).await.unwrap_err();
    assert!(matches!(
        err,
        ShiftError::ActiveShiftExists {
            owner: ShiftOwner::OtherEmployee(owner),
            shift_id: Some(id),
        } if owner == winner.employee_id && id == winner.id
    ));
}

// =============================================================================
// Hand-over Between Employees
// =============================================================================

#[tokio::test]
async fn test_second_employee_waits_for_first_to_close() {
    let station = Station::new();
    let e1 = station.till(1, "Ana");
    let e2 = station.till(2, "Rui");

    let first = e1.manager.begin(Money::from_minor(5_000), None).await.unwrap();

    let err = e2.manager.begin(Money::from_minor(2_000), None).await.unwrap_err();
    assert!(matches!(
        err,
        ShiftError::ActiveShiftExists {
            owner: ShiftOwner::OtherEmployee(owner),
            shift_id: Some(id),
        } if owner == EmployeeId::new(1) && id == first.id
    ));
    assert!(err.user_message().contains("Another employee"));

    let closed = e1.manager.end(Money::from_minor(5_000), None).await.unwrap();
    assert_eq!(closed.status, ShiftStatus::Closed);

    let second = e2.manager.begin(Money::from_minor(2_000), None).await.unwrap();
    assert_eq!(second.employee_id, EmployeeId::new(2));
    assert_ne!(second.id, first.id);
    assert_eq!(station.store.open_shift_count(), 1);
}

#[tokio::test]
async fn test_same_employee_on_two_tills_is_told_it_is_theirs() {
    let station = Station::new();
    let front = station.till(1, "Ana");
    let back = station.till(1, "Ana");

    front.manager.begin(Money::ZERO, None).await.unwrap();
    let err = back.manager.begin(Money::ZERO, None).await.unwrap_err();

    assert!(matches!(
        err,
        ShiftError::ActiveShiftExists {
            owner: ShiftOwner::Caller,
            ..
        }
    ));

    // The second till adopts the shift and may close it.
    back.sync().await;
    assert!(back.manager.active_shift().is_some());
    back.manager.end(Money::ZERO, None).await.unwrap();
    assert_eq!(station.store.open_shift_count(), 0);
}

// =============================================================================
// Interleaved Sequences
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_begin_end_never_opens_two() {
    let station = Station::new();
    let tills: Vec<_> = (1..=3).map(|id| station.till(id, "Staff")).collect();

    let handles: Vec<_> = tills
        .iter()
        .enumerate()
        .map(|(i, till)| {
            let till = till.clone();
            let store = Arc::clone(&station.store);
            tokio::spawn(async move {
                let mut opened = 0;
                for round in 0..25_usize {
                    if (round + i) % 2 == 0 {
                        if till.manager.begin(Money::ZERO, None).await.is_ok() {
                            opened += 1;
                        }
                    } else {
                        till.sync().await;
                        // NoActiveShift when another till holds it.
                        let _ = till.manager.end(Money::ZERO, None).await;
                    }
                    assert!(store.open_shift_count() <= 1);
                    tokio::task::yield_now().await;
                }
                opened
            })
        })
        .collect();

    let mut total_opened = 0;
    for handle in handles {
        total_opened += handle.await.unwrap();
    }

    let shifts = station.store.shifts();
    assert_eq!(shifts.len(), total_opened);
    assert!(shifts.iter().filter(|s| s.is_open()).count() <= 1);
    for shift in shifts.iter().filter(|s| !s.is_open()) {
        assert!(shift.end_time.is_some());
        assert!(shift.closing_cash.is_some());
    }
}

#[tokio::test]
async fn test_closed_shift_stays_closed() {
    let station = Station::new();
    let e1 = station.till(1, "Ana");

    let shift = e1.manager.begin(Money::ZERO, None).await.unwrap();
    e1.manager.end(Money::ZERO, None).await.unwrap();

    // A repeated end has nothing to close.
    assert!(matches!(
        e1.manager.end(Money::ZERO, None).await,
        Err(ShiftError::NoActiveShift)
    ));
    e1.sync().await;
    assert!(e1.manager.active_shift().is_none());

    let stored = station
        .store
        .shifts()
        .into_iter()
        .find(|s| s.id == shift.id)
        .unwrap();
    assert_eq!(stored.status, ShiftStatus::Closed);
    assert_eq!(station.store.calls(StoreOperation::CloseShift), 1);
}
