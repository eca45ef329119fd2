pub mod check;
pub mod render;
pub mod run;
