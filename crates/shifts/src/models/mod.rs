//! Domain models for the shift subsystem.

pub mod employee;
pub mod shift;

pub use employee::{Employee, NewEmployee, OperatorProfile};
pub use shift::{CloseShift, NewShift, PaymentMethodEntry, Shift, ShiftPaymentMethod};
