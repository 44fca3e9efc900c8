// Kontrog - fire-safety compliance tracking core
//
// This crate provides the domain core behind the Kontrog client: account
// session and phone verification, the fire-safety registry (organizations,
// buildings, extinguishers, work logs), profile assembly, and the assistant
// chat transcript. External services (auth provider, document store, chat
// completions) sit behind trait seams in `kernel` and are wired through a
// single composition root, `kernel::AppDeps`.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod telemetry;

pub use config::*;
