//! End-to-end tests driving the public crate API with in-memory services.

mod mock_services;
mod pipeline;
mod poller;
