//! callgate: human approval gateway for voice meeting assistants.
//!
//! The AI model proposes actions (calendar events) through a tool call that
//! returns at once. In the background the coordinator dedups repeated
//! proposals, queues them so one approval dialog shows at a time, asks the
//! right participant over RPC, and injects the outcome back into the
//! conversation as a new turn.

pub mod approval;
pub mod audit;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod gateway;
pub mod participants;
