//! HLS manifest resolution and segment decryption
//!
//! Two self-contained collaborators of the task runner:
//! - [`resolver`] — fetches a manifest, distinguishes master from media
//!   playlists, picks the best variant, and resolves segment URIs
//! - [`decrypt`] — AES-128-CBC segment decryption, offloaded to the
//!   blocking thread pool so the orchestration loop never stalls on it

pub mod decrypt;
pub mod resolver;

pub use resolver::{ResolvedManifest, resolve_manifest};
