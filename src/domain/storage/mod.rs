//! Storage domain - Registration records and the unit-of-work capability

mod registration;
mod unit_of_work;

pub use registration::{RecordFilter, Registration, WebHookRegistration};
pub use unit_of_work::{PendingChange, UnitOfWork, UnitOfWorkFactory};

#[cfg(test)]
pub use unit_of_work::mock;
