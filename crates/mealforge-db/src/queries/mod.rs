pub mod dead_letters;
pub mod job_events;
pub mod jobs;
