pub mod attendance;
pub mod course;
pub mod report;
pub mod role;
pub mod student;
pub mod user;
