mod fakes;
mod recovery_tests;
