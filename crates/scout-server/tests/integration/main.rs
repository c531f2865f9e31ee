mod api_tests;
mod common;
mod stream_tests;
