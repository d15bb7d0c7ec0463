pub mod cli;
pub mod signals;
