// Shared fixtures for the integration tests.
#![allow(dead_code)]

#[path = "../../demos/people_data.rs"]
mod people_data;

pub use people_data::{people, PEOPLE_OBJECTS, PEOPLE_VARIABLES};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
