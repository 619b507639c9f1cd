//! # memkit - Fixed-Budget Memory Allocators
//!
//! This crate provides a small family of allocators for programs that carve
//! their whole memory budget up-front and manage it themselves: a **linear
//! allocator** with strict LIFO free, a **freelist allocator** with
//! first-fit search and eager coalescing, a header-less **arena**, and an
//! RAII **scratch region** over an arena.
//!
//! ## Overview
//!
//! The typical setup is one big OS-backed linear allocator per subsystem,
//! with children carved out of it:
//!
//! ```text
//!   ┌─────────────────────────────────────────────────────────────────┐
//!   │                LinearAllocator "engine" (OS-backed)             │
//!   │                                                                 │
//!   │   ┌────────────────────┬──────────────────┬──────────────────┐  │
//!   │   │ FreelistAllocator  │      Arena       │    Free Space    │  │
//!   │   │    "resources"     │   "per-frame"    │                  │  │
//!   │   └────────────────────┴──────────────────┴──────────────────┘  │
//!   │                                           ▲                     │
//!   │                                           │                     │
//!   │                                        Cursor                   │
//!   └─────────────────────────────────────────────────────────────────┘
//!
//!   Children are destroyed in reverse creation order, each handing its
//!   range back to the parent in one step.
//! ```
//!
//! The linear and freelist allocators share a frame layout. Every
//! allocation is a self-describing frame; the word right before the
//! payload points back at the header, so `free` recovers the header from
//! the payload pointer in O(1):
//!
//! ```text
//!   Single Frame:
//!   ┌─────────┬──────────────┬─────────┬──────────────┬─────────────┐
//!   │ padding │  AllocHeader │ padding │ back-pointer │   payload   │
//!   │         │   48 bytes   │         │    8 bytes   │             │
//!   └─────────┴──────────────┴─────────┴──────────────┴─────────────┘
//!   ▲                                                 ▲
//!   └── marker (frame start)                          └── pointer
//!                                                         returned to
//!                                                         the caller
//! ```
//!
//! Arenas skip all of this: a push is a cursor bump with no header and no
//! back-pointer, and reclamation is popping the cursor back to a marker.
//!
//! ## Crate Structure
//!
//! ```text
//!   memkit
//!   ├── align      - Alignment helpers and size constants (kb!, mb-style fns)
//!   ├── error      - AllocError and the crate Result alias
//!   ├── linear     - LinearAllocator, the Carve trait
//!   ├── freelist   - FreelistAllocator
//!   ├── arena      - Arena, ArenaMarker
//!   ├── scratch    - ScratchRegion
//!   └── stats      - AllocatorStats accounting
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use memkit::{Arena, LinearAllocator, ScratchRegion, align::kb};
//!
//! fn main() -> memkit::Result<()> {
//!   let mut root = LinearAllocator::new("engine", kb(64))?;
//!   let mut frame = Arena::with_capacity(&mut root, kb(16))?;
//!
//!   let vertices = frame.push_slice_uninit::<[f32; 3]>(128)?;
//!   let _ = vertices;
//!
//!   {
//!     let mut scratch = ScratchRegion::begin(&mut frame);
//!     scratch.push(kb(4))?; // discarded when scratch drops
//!   }
//!
//!   frame.reset(); // end of frame, O(1)
//!   root.destroy_child(frame)?;
//!   Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Explicit budgets**: every allocator owns a fixed range; exhaustion
//!   is a typed [`AllocError::OutOfMemory`], never a silent grow
//! - **Checked discipline**: out-of-order linear frees and foreign
//!   pointers are rejected with typed errors in every build profile
//! - **Composition**: freelists and arenas carve their ranges out of a
//!   parent linear allocator and return them with `destroy_child`
//! - **`fill` feature**: stamps freed memory with `0xfe` and zeroes fresh
//!   freelist payloads for debugging
//!
//! ## Limitations
//!
//! - **Single-threaded**: allocators take `&mut self`; wrap one in a lock
//!   if it must be shared
//! - **Unix-only OS backing**: `LinearAllocator::new` uses `mmap`;
//!   placement constructors work anywhere
//!
//! ## Safety
//!
//! Allocation returns raw `NonNull<u8>`/`NonNull<T>` pointers and never
//! runs destructors. Reading what you were handed requires `unsafe`, and
//! keeping a pointer alive past its allocator (or past an arena pop that
//! covers it) is undefined behavior.

pub mod align;
mod arena;
mod error;
mod fill;
mod freelist;
mod header;
mod linear;
mod os;
mod scratch;
mod stats;

pub use arena::{Arena, ArenaMarker};
pub use error::{AllocError, Result};
pub use freelist::FreelistAllocator;
pub use linear::{Carve, LinearAllocator};
pub use scratch::ScratchRegion;
pub use stats::AllocatorStats;
