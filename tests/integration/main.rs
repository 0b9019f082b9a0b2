//! Integration tests: the full discovery and odds pipeline against a
//! scripted network.

mod mock_fetcher;
mod pipeline;
