mod codec_tests;
mod common;
mod container_tests;
mod directory_tests;
mod schema_tests;
mod service_tests;
