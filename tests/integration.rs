//! Integration test entry point.

#[path = "integration/mock_connector.rs"]
mod mock_connector;
#[path = "integration/pipeline.rs"]
mod pipeline;
