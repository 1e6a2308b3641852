mod aggregator;
mod dispatcher;
mod runner;
mod stats;
mod worker;

pub use runner::run;
