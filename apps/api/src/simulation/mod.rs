// Mock interview simulation: planning, problem generation, validation,
// persistence, and the per-round session state machine.
// All LLM calls go through llm_client via the ProblemSource seam.

pub mod error;
pub mod generator;
pub mod handlers;
pub mod locks;
pub mod orchestrator;
pub mod persistence;
pub mod planner;
pub mod prompts;
pub mod session;
pub mod transformer;
pub mod validator;
