pub mod admission;
pub mod consult;
pub mod launcher;
pub mod lifecycle;
pub mod patient;
pub mod reconcile;
pub mod refresh;
pub mod server_clock;
