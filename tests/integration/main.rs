mod common;
mod job_tests;
