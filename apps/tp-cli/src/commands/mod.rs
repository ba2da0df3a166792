pub mod check;
pub mod dry_run;
pub mod parallel;
pub mod run;
pub mod sessions;
