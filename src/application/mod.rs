pub mod bootstrap;
pub mod gate;
pub mod governor;
pub mod orchestrator;
pub mod scoring;
pub mod simulator;
pub mod tracker;
