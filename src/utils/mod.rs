pub mod mvn;
pub mod state;
