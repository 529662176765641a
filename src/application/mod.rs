pub mod cancel;
pub mod compare;
pub mod diff;
pub mod monitoring;
