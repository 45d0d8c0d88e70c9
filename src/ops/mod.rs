pub mod check;
pub mod completion;
pub mod entry_ops;
pub mod grouping;
pub mod overlap;
pub mod period_ops;
pub mod search;
pub mod urgency;
pub mod view;
