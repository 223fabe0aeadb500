pub mod jobs;
pub mod matches;
