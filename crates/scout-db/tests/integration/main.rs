mod common;
mod item_tests;
mod status_tests;
