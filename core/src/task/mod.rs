mod ledger;
mod store;
mod transitions;
mod types;

pub use ledger::NotificationLedger;
pub use store::TaskStore;
pub use transitions::{apply_ci_result, ci_message, CiOutcome, Notification};
pub use types::{
    fields, number_field, text_field, NewTask, Person, Task, TaskStatus, TaskUpdate,
    UnknownStatus,
};
