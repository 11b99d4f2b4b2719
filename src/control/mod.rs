// Control: plant model, classical PID/MPC laws and the mode-dispatching controller.
// `native` is an alternate backend behind the same step-level trait.
pub mod engine;
pub mod hybrid;
pub mod mpc;
pub mod native;
pub mod pid;
pub mod plant;
