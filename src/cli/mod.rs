pub mod join;
pub mod log;
pub mod serve;
