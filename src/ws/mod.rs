//! WebSocket transport: wire types, codec and the socket handler

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
