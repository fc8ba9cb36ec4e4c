pub mod context;
pub mod grading;
pub mod history;
pub mod quiz;
