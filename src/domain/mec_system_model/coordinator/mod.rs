pub mod coordinator;
pub mod job_state;
pub mod replay;
pub mod runtime;
