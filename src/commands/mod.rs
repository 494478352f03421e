pub mod benchmark;
pub mod check_expected;
pub mod compare;
pub mod load;
pub mod search;
pub mod status;
