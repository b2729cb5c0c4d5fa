mod orchestrator;
mod scheduler;

pub use orchestrator::FetchOrchestrator;
pub use scheduler::Scheduler;
