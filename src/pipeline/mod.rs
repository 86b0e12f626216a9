//! Pipeline stages of a grading request.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own. The orchestrator in [`crate::grade`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ extract ──▶ prompt ──▶ model ──▶ parse
//! (scratch)  (pdf/docx)  (prompts)  (model)   (json)
//! ```
//!
//! 1. [`upload`]  — persist the uploaded bytes to a request-owned scratch
//!    file that deletes itself on drop
//! 2. [`extract`] — decode the scratch file by extension; runs in
//!    `spawn_blocking` because both decoders are CPU-bound
//! 3. [`crate::prompts`] — build the two-message conversation
//! 4. [`crate::model`] — one chat-completion call; the only network I/O
//! 5. [`parse`]   — cut the JSON object out of the reply and validate it

pub mod extract;
pub mod parse;
pub mod upload;
