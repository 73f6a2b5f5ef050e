// Library exports for feedline-server
// The admin CLI and the integration tests drive the pipeline through these

pub mod api;
pub mod config;
pub mod feeds;
pub mod hashtag;
pub mod pipeline;
pub mod state;
