//! note-hub server library: the HTTP transport over the folder hierarchy
//! core.

pub mod api;
