//! Output formatting for discussions and transcripts

pub mod console;
