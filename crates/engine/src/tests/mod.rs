mod helpers;

mod worker_tests;
mod write_tests;
