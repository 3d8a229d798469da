//! Analysis pipeline.
//!
//! The orchestrator fans a deal out to every provider, the parser and the
//! fallback policy turn each outcome into a `ProviderResult`, and the
//! aggregator combines them.

pub mod aggregator;
pub mod fallback;
pub mod orchestrator;
pub mod parser;

pub use orchestrator::AnalysisOrchestrator;
