//! Cross-crate integration tests for the effects engine

#[cfg(test)]
mod pipeline_integration;

#[cfg(test)]
mod streaming_integration;
