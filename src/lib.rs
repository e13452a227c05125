pub mod cli;
pub mod data;
pub mod optimizer;
pub mod parallel;
pub mod rating;
pub mod report;
pub mod score;
pub mod squad;
