pub mod project;
pub mod setup;
pub mod symbols;
pub mod ui;
