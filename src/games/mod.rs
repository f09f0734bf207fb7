pub mod zoondo;
