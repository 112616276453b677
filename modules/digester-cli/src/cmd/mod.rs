pub mod annotate;
pub mod fetch;
pub mod process;
