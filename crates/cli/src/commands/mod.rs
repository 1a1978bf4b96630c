pub mod agents;
pub mod onboard;
pub mod providers;
pub mod review;
pub mod run;
pub mod status;
