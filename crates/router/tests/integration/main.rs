mod common;
mod execute_tests;
mod registry_tests;
