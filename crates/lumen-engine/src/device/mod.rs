//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - translating engine load parameters into adapter requirements
//!
//! Render targets are always off-screen textures; presentation is not handled
//! here.

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;
