pub mod history_view;
pub mod menu;
pub mod modal;
pub mod quiz_view;
