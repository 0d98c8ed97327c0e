//! Nuvo Amplifier Simulation Library
//!
//! This crate provides a virtual amplifier for exercising the link without
//! physical hardware. It includes:
//!
//! - **VirtualAmplifier**: per-zone state machine answering wire commands
//! - **run_virtual_amp_task**: drives a `VirtualAmplifier` over any async stream
//! - **spawn_virtual_amp**: in-memory duplex pair with a control handle
//!
//! # Example
//!
//! ```rust
//! use nuvo_sim::VirtualAmplifier;
//!
//! let mut amp = VirtualAmplifier::new("test", 6);
//! assert_eq!(amp.process_command("*Z2ON").as_deref(), Some("#Z2,ON,SRC1,VOL40,DND0,LOCK0"));
//! assert_eq!(amp.process_command("*Z2OFF").as_deref(), Some("#Z2,OFF"));
//! ```

pub mod amplifier;
pub mod amplifier_task;

pub use amplifier::{Fault, VirtualAmplifier, VirtualZone};
pub use amplifier_task::{
    run_virtual_amp_task, spawn_virtual_amp, VirtualAmpCommand, VirtualAmpEvent,
    VirtualAmpHandle,
};
