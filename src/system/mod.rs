//! # System Interaction Layer
//!
//! The boundary between the engines in `core` and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: spawns commands through the platform shell (`sh -c` or `cmd /C`) and
//!   tracks them in a `ProcessGroup`, which owns their termination.
//! - **`env`**: computes the environment layered on top of a child's inherited one, and
//!   loads `.env` style files.

pub mod env;
/// Shell command spawning and process group supervision.
pub mod executor;
