pub mod grid;
pub mod input;
pub mod mode;
pub mod pad;
pub mod view;
