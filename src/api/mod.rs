pub mod attendance;
pub mod course;
pub mod me;
pub mod report;
pub mod student;
