//! Application layer: the render pipeline and the editor session around it.

pub mod controls;
pub mod debounce;
pub mod editor;
pub mod live;
pub mod render;
