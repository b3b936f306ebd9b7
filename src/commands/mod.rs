pub mod cli;
pub mod click;
