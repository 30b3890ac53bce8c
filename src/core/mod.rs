pub mod api_manager;
pub mod orchestrator;
pub mod rate_limiter;
pub mod seeder;
pub mod timeseries;
