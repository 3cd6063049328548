//! Remote completion services.

pub mod openai;
