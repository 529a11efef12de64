pub mod data;
pub mod linear_model;
pub mod report;
