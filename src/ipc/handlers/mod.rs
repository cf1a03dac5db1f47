pub mod chapters;
pub mod core;
pub mod dashboard;
pub mod export;
pub mod quizzes;
pub mod reports;
pub mod session;
pub mod setup;
pub mod submissions;
