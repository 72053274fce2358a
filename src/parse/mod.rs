pub mod line_parser;
pub mod line_render;

pub use line_parser::{parse_line, parse_lines};
pub use line_render::{append_line, remove_line, render_buffer, render_line};
