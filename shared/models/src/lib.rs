pub mod change;
pub mod drive;
pub mod publish;
