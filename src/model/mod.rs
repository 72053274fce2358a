pub mod carry_over;
pub mod config;
pub mod line_item;
pub mod record;
pub mod views;

pub use carry_over::*;
pub use config::*;
pub use line_item::*;
pub use record::*;
pub use views::*;
