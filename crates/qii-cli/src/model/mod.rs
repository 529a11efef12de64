pub mod linear_model;
