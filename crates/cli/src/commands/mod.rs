pub mod alerts;
pub mod control;
pub mod recommendations;
pub mod status;
