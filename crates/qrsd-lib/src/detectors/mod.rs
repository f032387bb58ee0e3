pub mod peaks;
pub mod qrs;
