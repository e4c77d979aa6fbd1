mod client;
pub(crate) mod wire;

pub(crate) use client::SessionClient;
