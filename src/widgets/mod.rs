pub mod common;
pub mod theme;
