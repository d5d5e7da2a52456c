// Command handlers: one invocation, one image

pub mod pull;
pub mod push;
pub mod repository;
