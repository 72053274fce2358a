pub mod carry_over;
pub mod day_sync;
pub mod feedback;
pub mod item_ops;
pub mod optimistic;
pub mod progress;
pub mod reconcile;
pub mod views;
