//! Manual diagnostic probes for an OpenAI-compatible service.
//!
//! `chat-probe` exercises chat completions in blocking and streamed form;
//! `embed-probe` exercises the embeddings endpoint. Both print what they get
//! and let any failure abort the run.

pub mod chat;
pub mod embed;
