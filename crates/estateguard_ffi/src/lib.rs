//! Flutter-facing FFI surface for the EstateGuard core.

pub mod api;
